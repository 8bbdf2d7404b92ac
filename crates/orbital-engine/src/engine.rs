//! The reconciliation engine.
//!
//! Owns one identity-keyed cache per resource kind and serializes refreshes
//! through a per-kind busy gate: a refresh that finds another one in flight
//! for the same kind is dropped, never queued, while different kinds refresh
//! concurrently. Refreshes are triggered by fixed polling intervals and by
//! debounced daemon events; both paths converge on the same diff-and-publish
//! pass. Action methods are thin provider calls followed by an immediate
//! refresh, so the published state always comes from the daemon rather than
//! from an optimistic local edit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use orbital_common::{
    ContainerAction, EngineConfig, ProviderError, ResourceEvent, ResourceKind, Result,
    SystemSummary,
};

use crate::cache::ResourceCache;
use crate::entity::{ContainerEntity, ImageEntity, NetworkEntity, ViewEntity, VolumeEntity};
use crate::events::EventMonitor;
use crate::provider::ResourceProvider;
use crate::sink::{Delta, PresentationSink};
use crate::stacks::group_by_stack;
use crate::stats;

struct KindState<E: ViewEntity> {
    /// Busy gate. Held across the provider fetch so a second trigger for
    /// the same kind skips instead of piling up.
    gate: Mutex<()>,
    cache: Mutex<ResourceCache<E>>,
}

impl<E: ViewEntity> Default for KindState<E> {
    fn default() -> Self {
        Self {
            gate: Mutex::new(()),
            cache: Mutex::new(ResourceCache::new()),
        }
    }
}

struct EngineInner {
    provider: Arc<dyn ResourceProvider>,
    sink: Arc<dyn PresentationSink>,
    config: EngineConfig,
    containers: KindState<ContainerEntity>,
    images: KindState<ImageEntity>,
    volumes: KindState<VolumeEntity>,
    networks: KindState<NetworkEntity>,
    stats_tasks: DashMap<String, JoinHandle<()>>,
    started: AtomicBool,
    shutdown: watch::Sender<bool>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
    monitor: StdMutex<Option<EventMonitor>>,
}

#[derive(Clone)]
pub struct ReconciliationEngine {
    inner: Arc<EngineInner>,
}

impl ReconciliationEngine {
    pub fn new(
        provider: Arc<dyn ResourceProvider>,
        sink: Arc<dyn PresentationSink>,
        config: EngineConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(EngineInner {
                provider,
                sink,
                config,
                containers: KindState::default(),
                images: KindState::default(),
                volumes: KindState::default(),
                networks: KindState::default(),
                stats_tasks: DashMap::new(),
                started: AtomicBool::new(false),
                shutdown,
                tasks: StdMutex::new(Vec::new()),
                monitor: StdMutex::new(None),
            }),
        }
    }

    /// Start polling loops, the event monitor and the debounce loop.
    /// Calling it twice is a no-op.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("starting reconciliation engine");

        let (event_tx, event_rx) = mpsc::channel::<ResourceEvent>(256);
        let monitor = EventMonitor::start(
            Arc::clone(&self.inner.provider),
            event_tx,
            self.inner.config.event_retry_delay,
        );
        *lock(&self.inner.monitor) = Some(monitor);

        let mut tasks = vec![
            self.spawn_debounce_loop(event_rx),
            self.spawn_poll_loop(ResourceKind::Container, self.inner.config.container_interval),
            self.spawn_poll_loop(ResourceKind::Image, self.inner.config.image_interval),
            self.spawn_poll_loop(ResourceKind::Volume, self.inner.config.volume_interval),
            self.spawn_poll_loop(ResourceKind::Network, self.inner.config.network_interval),
        ];
        lock(&self.inner.tasks).append(&mut tasks);
    }

    /// Stop everything the engine spawned. Safe to call more than once.
    pub fn shutdown(&self) {
        info!("shutting down reconciliation engine");
        let _ = self.inner.shutdown.send(true);
        if let Some(monitor) = lock(&self.inner.monitor).take() {
            monitor.stop();
        }
        for task in lock(&self.inner.tasks).drain(..) {
            task.abort();
        }
        for entry in self.inner.stats_tasks.iter() {
            entry.value().abort();
        }
        self.inner.stats_tasks.clear();
    }

    /// Refresh one resource kind now, skipping if one is already running.
    /// Returns whether a pass actually executed and succeeded.
    pub async fn refresh(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::Container => self.inner.refresh_containers().await,
            ResourceKind::Image => self.inner.refresh_images().await,
            ResourceKind::Volume => self.inner.refresh_volumes().await,
            ResourceKind::Network => self.inner.refresh_networks().await,
        }
    }

    pub async fn refresh_all(&self) {
        tokio::join!(
            self.inner.refresh_containers(),
            self.inner.refresh_images(),
            self.inner.refresh_volumes(),
            self.inner.refresh_networks(),
        );
    }

    pub async fn containers(&self) -> Vec<Arc<ContainerEntity>> {
        self.inner.containers.cache.lock().await.entities()
    }

    pub async fn images(&self) -> Vec<Arc<ImageEntity>> {
        self.inner.images.cache.lock().await.entities()
    }

    pub async fn volumes(&self) -> Vec<Arc<VolumeEntity>> {
        self.inner.volumes.cache.lock().await.entities()
    }

    pub async fn networks(&self) -> Vec<Arc<NetworkEntity>> {
        self.inner.networks.cache.lock().await.entities()
    }

    /// Run a lifecycle action against one container and refresh.
    ///
    /// A vanished target counts as success for teardown actions; stopping
    /// or removing something already gone is the requested end state.
    pub async fn container_action(&self, id: &str, action: ContainerAction) -> Result<()> {
        let name = self
            .inner
            .containers
            .cache
            .lock()
            .await
            .get(id)
            .map(|e| e.name())
            .unwrap_or_else(|| short_id(id).to_string());

        match self.inner.provider.container_action(id, action).await {
            Ok(()) => {}
            Err(error) if error.is_not_found() && action.is_idempotent_teardown() => {
                debug!(container = id, verb = action.verb(), "target already gone");
            }
            Err(error) => {
                warn!(container = id, verb = action.verb(), %error, "action failed");
                self.inner.sink.status(format!("Error: {error}"));
                return Err(error);
            }
        }

        self.inner.sink.status(format!("{} {name}", past_tense(action)));
        self.inner.refresh_containers().await;
        Ok(())
    }

    /// Flip a container's expanded flag, starting or stopping its stats
    /// task to match. Returns the new state.
    pub async fn toggle_expanded(&self, id: &str) -> Result<bool> {
        let entity = self
            .inner
            .containers
            .cache
            .lock()
            .await
            .get(id)
            .ok_or_else(|| ProviderError::NotFound {
                kind: ResourceKind::Container,
                id: id.to_string(),
            })?;

        let expanded = entity.toggle_expanded();
        if expanded {
            let handle = stats::spawn_monitor(
                Arc::clone(&self.inner.provider),
                Arc::clone(&self.inner.sink),
                Arc::clone(&entity),
                self.inner.config.stats_interval,
                self.inner.config.stats_error_delay,
            );
            if let Some(previous) = self.inner.stats_tasks.insert(id.to_string(), handle) {
                previous.abort();
            }
        } else {
            self.inner.stop_stats(id);
            entity.clear_stats();
        }
        Ok(expanded)
    }

    pub async fn pull_image(&self, reference: &str) -> Result<()> {
        self.inner.sink.status(format!("Pulling {reference}..."));
        match self.inner.provider.pull_image(reference).await {
            Ok(()) => {
                self.inner.sink.status(format!("Pulled {reference}"));
                self.inner.refresh_images().await;
                Ok(())
            }
            Err(error) => {
                self.inner.sink.status(format!("Error: {error}"));
                Err(error)
            }
        }
    }

    pub async fn remove_image(&self, id: &str, force: bool) -> Result<()> {
        let result = self.inner.provider.remove_image(id, force).await;
        self.inner
            .finish_removal(ResourceKind::Image, short_id(id), result)
            .await
    }

    pub async fn remove_volume(&self, name: &str, force: bool) -> Result<()> {
        let result = self.inner.provider.remove_volume(name, force).await;
        self.inner
            .finish_removal(ResourceKind::Volume, name, result)
            .await
    }

    /// Remove a network, refusing the daemon's builtin ones outright
    /// rather than bouncing the error off the daemon.
    pub async fn remove_network(&self, id: &str) -> Result<()> {
        let builtin = self
            .inner
            .networks
            .cache
            .lock()
            .await
            .get(id)
            .map(|n| n.is_builtin())
            .unwrap_or(false);
        if builtin {
            let error = ProviderError::Conflict {
                kind: ResourceKind::Network,
                id: id.to_string(),
                reason: "builtin networks cannot be removed".to_string(),
            };
            self.inner.sink.status(format!("Error: {error}"));
            return Err(error);
        }
        let result = self.inner.provider.remove_network(id).await;
        self.inner
            .finish_removal(ResourceKind::Network, short_id(id), result)
            .await
    }

    /// Prune unused resources of one kind, then refresh that kind.
    pub async fn prune(&self, kind: ResourceKind) -> Result<()> {
        let result = match kind {
            ResourceKind::Container => self.inner.provider.prune_containers().await,
            ResourceKind::Image => self.inner.provider.prune_images().await,
            ResourceKind::Volume => self.inner.provider.prune_volumes().await,
            ResourceKind::Network => self.inner.provider.prune_networks().await,
        };
        match result {
            Ok(()) => {
                self.inner.sink.status(format!("Pruned unused {kind}s"));
                self.refresh(kind).await;
                Ok(())
            }
            Err(error) => {
                self.inner.sink.status(format!("Error: {error}"));
                Err(error)
            }
        }
    }

    pub async fn system_info(&self) -> Result<SystemSummary> {
        self.inner.provider.system_info().await
    }

    /// Fresh inspect of one container, bypassing the cache. Detail panes
    /// want daemon truth, not the last snapshot.
    pub async fn container_details(&self, id: &str) -> Result<orbital_common::ContainerRecord> {
        self.inner.provider.inspect_container(id).await
    }

    fn spawn_poll_loop(&self, kind: ResourceKind, interval: Duration) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match kind {
                            ResourceKind::Container => inner.refresh_containers().await,
                            ResourceKind::Image => inner.refresh_images().await,
                            ResourceKind::Volume => inner.refresh_volumes().await,
                            ResourceKind::Network => inner.refresh_networks().await,
                        };
                    }
                    _ = shutdown.changed() => return,
                }
            }
        })
    }

    /// Collapse bursts of daemon events into a single container refresh:
    /// the first event opens a quiet window, each further event extends it,
    /// and the refresh runs once the window elapses with no new events.
    fn spawn_debounce_loop(&self, mut rx: mpsc::Receiver<ResourceEvent>) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let window = self.inner.config.event_debounce;
        tokio::spawn(async move {
            loop {
                let Some(event) = rx.recv().await else { return };
                debug!(container = event.id, action = event.action, "daemon event");
                loop {
                    match tokio::time::timeout(window, rx.recv()).await {
                        Ok(Some(_)) => continue,
                        Ok(None) => return,
                        Err(_) => break,
                    }
                }
                inner.refresh_containers().await;
            }
        })
    }
}

impl EngineInner {
    async fn refresh_containers(&self) -> bool {
        let Ok(_guard) = self.containers.gate.try_lock() else {
            debug!("container refresh in flight, skipping");
            return false;
        };
        match self.provider.list_containers().await {
            Ok(records) => {
                let (deltas, entities) = {
                    let mut cache = self.containers.cache.lock().await;
                    let deltas = cache.reconcile(records);
                    (deltas, cache.entities())
                };
                for delta in &deltas {
                    if let Delta::Removed(id) = delta {
                        self.stop_stats(id);
                    }
                }
                if !deltas.is_empty() {
                    self.sink.containers_changed(deltas);
                }
                self.sink.stacks_changed(group_by_stack(&entities));
                true
            }
            Err(error) => self.report_refresh_failure(ResourceKind::Container, error),
        }
    }

    async fn refresh_images(&self) -> bool {
        let Ok(_guard) = self.images.gate.try_lock() else {
            debug!("image refresh in flight, skipping");
            return false;
        };
        match self.provider.list_images().await {
            Ok(records) => {
                let deltas = self.images.cache.lock().await.reconcile(records);
                if !deltas.is_empty() {
                    self.sink.images_changed(deltas);
                }
                true
            }
            Err(error) => self.report_refresh_failure(ResourceKind::Image, error),
        }
    }

    async fn refresh_volumes(&self) -> bool {
        let Ok(_guard) = self.volumes.gate.try_lock() else {
            debug!("volume refresh in flight, skipping");
            return false;
        };
        match self.provider.list_volumes().await {
            Ok(records) => {
                let deltas = self.volumes.cache.lock().await.reconcile(records);
                if !deltas.is_empty() {
                    self.sink.volumes_changed(deltas);
                }
                true
            }
            Err(error) => self.report_refresh_failure(ResourceKind::Volume, error),
        }
    }

    async fn refresh_networks(&self) -> bool {
        let Ok(_guard) = self.networks.gate.try_lock() else {
            debug!("network refresh in flight, skipping");
            return false;
        };
        match self.provider.list_networks().await {
            Ok(records) => {
                let deltas = self.networks.cache.lock().await.reconcile(records);
                if !deltas.is_empty() {
                    self.sink.networks_changed(deltas);
                }
                true
            }
            Err(error) => self.report_refresh_failure(ResourceKind::Network, error),
        }
    }

    /// A failed fetch leaves the last good cache untouched and only
    /// surfaces a status line.
    fn report_refresh_failure(&self, kind: ResourceKind, error: ProviderError) -> bool {
        warn!(%kind, %error, "refresh failed, keeping last known state");
        self.sink.status(format!("Error: {error}"));
        false
    }

    async fn finish_removal(
        &self,
        kind: ResourceKind,
        label: &str,
        result: Result<()>,
    ) -> Result<()> {
        match result {
            Ok(()) => {}
            Err(error) if error.is_not_found() => {
                debug!(%kind, id = label, "target already gone");
            }
            Err(error) => {
                self.sink.status(format!("Error: {error}"));
                return Err(error);
            }
        }
        self.sink.status(format!("Removed {kind} {label}"));
        match kind {
            ResourceKind::Container => self.refresh_containers().await,
            ResourceKind::Image => self.refresh_images().await,
            ResourceKind::Volume => self.refresh_volumes().await,
            ResourceKind::Network => self.refresh_networks().await,
        };
        Ok(())
    }

    fn stop_stats(&self, id: &str) {
        if let Some((_, handle)) = self.stats_tasks.remove(id) {
            handle.abort();
        }
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
        for entry in self.stats_tasks.iter() {
            entry.value().abort();
        }
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn past_tense(action: ContainerAction) -> &'static str {
    match action {
        ContainerAction::Start => "Started",
        ContainerAction::Stop => "Stopped",
        ContainerAction::Restart => "Restarted",
        ContainerAction::Pause => "Paused",
        ContainerAction::Unpause => "Unpaused",
        ContainerAction::Kill => "Killed",
        ContainerAction::Remove { .. } => "Removed",
    }
}

/// Docker ids are long hashes; status lines use the usual 12-char prefix.
fn short_id(id: &str) -> &str {
    if id.len() > 12 && id.chars().all(|c| c.is_ascii_hexdigit()) {
        &id[..12]
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        assert_eq!(
            short_id("0123456789abcdef0123456789abcdef"),
            "0123456789ab"
        );
        assert_eq!(short_id("webapp-db-1"), "webapp-db-1");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_past_tense() {
        assert_eq!(past_tense(ContainerAction::Start), "Started");
        assert_eq!(past_tense(ContainerAction::Remove { force: true }), "Removed");
    }
}
