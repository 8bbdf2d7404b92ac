//! Collaborator contract with the resource provider (the Docker Engine).
//!
//! Everything the engine knows about the daemon goes through this trait, so
//! tests can script a provider and the bollard client stays swappable. All
//! calls fail fast with the `ProviderError` taxonomy; the event stream is
//! the only part of the system with a retry policy (see `events`).

use async_trait::async_trait;
use futures::stream::BoxStream;
use orbital_common::{
    ContainerAction, ContainerRecord, ImageRecord, NetworkRecord, ResourceEvent, Result,
    StatsSample, SystemSummary, VolumeRecord,
};

/// Live daemon events; the stream may terminate unexpectedly.
pub type EventStream = BoxStream<'static, Result<ResourceEvent>>;

#[async_trait]
pub trait ResourceProvider: Send + Sync + 'static {
    async fn list_containers(&self) -> Result<Vec<ContainerRecord>>;
    async fn list_images(&self) -> Result<Vec<ImageRecord>>;
    async fn list_volumes(&self) -> Result<Vec<VolumeRecord>>;
    async fn list_networks(&self) -> Result<Vec<NetworkRecord>>;

    async fn inspect_container(&self, id: &str) -> Result<ContainerRecord>;
    async fn container_action(&self, id: &str, action: ContainerAction) -> Result<()>;

    async fn pull_image(&self, reference: &str) -> Result<()>;
    async fn remove_image(&self, id: &str, force: bool) -> Result<()>;
    async fn remove_volume(&self, name: &str, force: bool) -> Result<()>;
    async fn remove_network(&self, id: &str) -> Result<()>;

    async fn prune_containers(&self) -> Result<()>;
    async fn prune_images(&self) -> Result<()>;
    async fn prune_volumes(&self) -> Result<()>;
    async fn prune_networks(&self) -> Result<()>;

    async fn system_info(&self) -> Result<SystemSummary>;

    /// One-shot stats sample for a single container.
    async fn stats_once(&self, id: &str) -> Result<StatsSample>;

    /// Subscribe to live container events from the daemon.
    fn events(&self) -> EventStream;
}
