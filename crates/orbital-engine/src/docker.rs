//! `ResourceProvider` backed by the local Docker Engine via bollard.
//!
//! Every call is bounded by a single timeout and mapped into the
//! `ProviderError` taxonomy at this boundary; nothing above it ever sees a
//! bollard error. A 304 from stop/restart means the container was already
//! in the requested state and is reported as success.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use bollard::container::{
    KillContainerOptions, ListContainersOptions, PruneContainersOptions, RemoveContainerOptions,
    RestartContainerOptions, StatsOptions, StopContainerOptions,
};
use bollard::image::{CreateImageOptions, ListImagesOptions, PruneImagesOptions, RemoveImageOptions};
use bollard::network::{ListNetworksOptions, PruneNetworksOptions};
use bollard::system::EventsOptions;
use bollard::volume::{ListVolumesOptions, PruneVolumesOptions, RemoveVolumeOptions};
use bollard::Docker;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::instrument;

use orbital_common::{
    ContainerAction, ContainerRecord, EngineConfig, ImageRecord, NetworkRecord, ProviderError,
    ResourceKind, Result, StatsSample, SystemSummary, VolumeRecord,
};

use crate::mapper;
use crate::provider::{EventStream, ResourceProvider};

pub struct DockerProvider {
    docker: Docker,
    timeout: Duration,
    stop_timeout_secs: i64,
}

impl DockerProvider {
    /// Connect using the platform's default daemon endpoint (unix socket
    /// or named pipe).
    pub fn connect(config: &EngineConfig) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| ProviderError::Transient(format!("daemon connect failed: {e}")))?;
        Ok(Self::new(docker, config))
    }

    pub fn new(docker: Docker, config: &EngineConfig) -> Self {
        Self {
            docker,
            timeout: config.provider_timeout,
            stop_timeout_secs: config.stop_timeout_secs,
        }
    }

    /// Bound a daemon call by the configured timeout. An elapsed timeout
    /// is a transient fault like any other connectivity problem.
    async fn bounded<T, F>(&self, kind: ResourceKind, id: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, bollard::errors::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(|e| map_error(kind, id, e)),
            Err(_) => Err(ProviderError::Transient(format!(
                "daemon call timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

fn map_error(kind: ResourceKind, id: &str, error: bollard::errors::Error) -> ProviderError {
    use bollard::errors::Error;
    match error {
        Error::DockerResponseServerError {
            status_code: 404, ..
        } => ProviderError::NotFound {
            kind,
            id: id.to_string(),
        },
        Error::DockerResponseServerError {
            status_code: 409,
            message,
        } => ProviderError::Conflict {
            kind,
            id: id.to_string(),
            reason: message,
        },
        Error::DockerResponseServerError {
            status_code,
            message,
        } if status_code >= 500 => ProviderError::Transient(message),
        Error::DockerResponseServerError {
            status_code,
            message,
        } => ProviderError::Unexpected(format!("daemon returned {status_code}: {message}")),
        // Everything else is connectivity or protocol trouble; the engine
        // keeps its last-good cache for these.
        other => ProviderError::Transient(other.to_string()),
    }
}

/// Already-in-state responses from stop/restart are a success for an
/// engine that only cares about the end state.
fn ignore_not_modified(result: Result<()>) -> Result<()> {
    match result {
        Err(ProviderError::Unexpected(ref message)) if message.contains("304") => Ok(()),
        other => other,
    }
}

#[async_trait::async_trait]
impl ResourceProvider for DockerProvider {
    #[instrument(skip(self))]
    async fn list_containers(&self) -> Result<Vec<ContainerRecord>> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let summaries = self
            .bounded(
                ResourceKind::Container,
                "*",
                self.docker.list_containers(Some(options)),
            )
            .await?;
        Ok(summaries
            .into_iter()
            .map(mapper::container_from_summary)
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_images(&self) -> Result<Vec<ImageRecord>> {
        let options = ListImagesOptions::<String>::default();
        let images = self
            .bounded(ResourceKind::Image, "*", self.docker.list_images(Some(options)))
            .await?;
        Ok(images.into_iter().map(mapper::image_from_summary).collect())
    }

    #[instrument(skip(self))]
    async fn list_volumes(&self) -> Result<Vec<VolumeRecord>> {
        let response = self
            .bounded(
                ResourceKind::Volume,
                "*",
                self.docker.list_volumes(None::<ListVolumesOptions<String>>),
            )
            .await?;
        Ok(response
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(mapper::volume_from_response)
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_networks(&self) -> Result<Vec<NetworkRecord>> {
        let networks = self
            .bounded(
                ResourceKind::Network,
                "*",
                self.docker.list_networks(None::<ListNetworksOptions<String>>),
            )
            .await?;
        Ok(networks
            .into_iter()
            .map(mapper::network_from_response)
            .collect())
    }

    #[instrument(skip(self))]
    async fn inspect_container(&self, id: &str) -> Result<ContainerRecord> {
        let inspect = self
            .bounded(
                ResourceKind::Container,
                id,
                self.docker.inspect_container(id, None),
            )
            .await?;
        Ok(mapper::container_from_inspect(inspect))
    }

    #[instrument(skip(self))]
    async fn container_action(&self, id: &str, action: ContainerAction) -> Result<()> {
        let kind = ResourceKind::Container;
        match action {
            ContainerAction::Start => {
                self.bounded(kind, id, self.docker.start_container::<String>(id, None))
                    .await
            }
            ContainerAction::Stop => ignore_not_modified(
                self.bounded(
                    kind,
                    id,
                    self.docker.stop_container(
                        id,
                        Some(StopContainerOptions {
                            t: self.stop_timeout_secs,
                        }),
                    ),
                )
                .await,
            ),
            ContainerAction::Restart => ignore_not_modified(
                self.bounded(
                    kind,
                    id,
                    self.docker.restart_container(
                        id,
                        Some(RestartContainerOptions {
                            t: self.stop_timeout_secs as isize,
                        }),
                    ),
                )
                .await,
            ),
            ContainerAction::Pause => {
                self.bounded(kind, id, self.docker.pause_container(id)).await
            }
            ContainerAction::Unpause => {
                self.bounded(kind, id, self.docker.unpause_container(id))
                    .await
            }
            ContainerAction::Kill => {
                self.bounded(
                    kind,
                    id,
                    self.docker
                        .kill_container(id, None::<KillContainerOptions<String>>),
                )
                .await
            }
            ContainerAction::Remove { force } => {
                self.bounded(
                    kind,
                    id,
                    self.docker.remove_container(
                        id,
                        Some(RemoveContainerOptions {
                            force,
                            ..Default::default()
                        }),
                    ),
                )
                .await
            }
        }
    }

    #[instrument(skip(self))]
    async fn pull_image(&self, reference: &str) -> Result<()> {
        let options = CreateImageOptions {
            from_image: reference.to_string(),
            ..Default::default()
        };
        // Pulls stream layer progress; draining without a per-call timeout
        // since large images legitimately take a while.
        let mut progress = Box::pin(self.docker.create_image(Some(options), None, None));
        while let Some(step) = progress.next().await {
            step.map_err(|e| map_error(ResourceKind::Image, reference, e))?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_image(&self, id: &str, force: bool) -> Result<()> {
        self.bounded(
            ResourceKind::Image,
            id,
            self.docker.remove_image(
                id,
                Some(RemoveImageOptions {
                    force,
                    ..Default::default()
                }),
                None,
            ),
        )
        .await
        .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn remove_volume(&self, name: &str, force: bool) -> Result<()> {
        self.bounded(
            ResourceKind::Volume,
            name,
            self.docker
                .remove_volume(name, Some(RemoveVolumeOptions { force })),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn remove_network(&self, id: &str) -> Result<()> {
        self.bounded(ResourceKind::Network, id, self.docker.remove_network(id))
            .await
    }

    #[instrument(skip(self))]
    async fn prune_containers(&self) -> Result<()> {
        self.bounded(
            ResourceKind::Container,
            "*",
            self.docker
                .prune_containers(None::<PruneContainersOptions<String>>),
        )
        .await
        .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn prune_images(&self) -> Result<()> {
        self.bounded(
            ResourceKind::Image,
            "*",
            self.docker.prune_images(None::<PruneImagesOptions<String>>),
        )
        .await
        .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn prune_volumes(&self) -> Result<()> {
        self.bounded(
            ResourceKind::Volume,
            "*",
            self.docker.prune_volumes(None::<PruneVolumesOptions<String>>),
        )
        .await
        .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn prune_networks(&self) -> Result<()> {
        self.bounded(
            ResourceKind::Network,
            "*",
            self.docker.prune_networks(None::<PruneNetworksOptions<String>>),
        )
        .await
        .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn system_info(&self) -> Result<SystemSummary> {
        let info = self
            .bounded(ResourceKind::Container, "*", self.docker.info())
            .await?;
        Ok(mapper::summary_from_info(info))
    }

    #[instrument(skip(self))]
    async fn stats_once(&self, id: &str) -> Result<StatsSample> {
        // stream=false yields a single sample that still carries precpu
        // counters, which the cpu percentage needs.
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };
        let mut samples = Box::pin(self.docker.stats(id, Some(options)));
        match tokio::time::timeout(self.timeout, samples.next()).await {
            Ok(Some(result)) => result
                .map(mapper::sample_from_stats)
                .map_err(|e| map_error(ResourceKind::Container, id, e)),
            Ok(None) => Err(ProviderError::NotFound {
                kind: ResourceKind::Container,
                id: id.to_string(),
            }),
            Err(_) => Err(ProviderError::Transient(format!(
                "stats sample timed out after {:?}",
                self.timeout
            ))),
        }
    }

    fn events(&self) -> EventStream {
        let docker = self.docker.clone();
        let (tx, rx) = mpsc::channel(64);

        // The bollard stream borrows its client, so it lives inside a
        // forwarding task and the engine consumes a channel-backed stream.
        tokio::spawn(async move {
            let mut filters = HashMap::new();
            filters.insert("type".to_string(), vec!["container".to_string()]);
            let options = EventsOptions::<String> {
                filters,
                ..Default::default()
            };
            let mut stream = Box::pin(docker.events(Some(options)));
            while let Some(item) = stream.next().await {
                let forwarded = match item {
                    Ok(message) => match mapper::event_from_message(message) {
                        Some(event) => Ok(event),
                        None => continue,
                    },
                    Err(e) => Err(map_error(ResourceKind::Container, "*", e)),
                };
                let failed = forwarded.is_err();
                if tx.send(forwarded).await.is_err() || failed {
                    return;
                }
            }
        });

        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed()
    }
}
