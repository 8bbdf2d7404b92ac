//! Live-state reconciliation engine for a local Docker daemon.
//!
//! The engine mirrors containers, images, volumes and networks into
//! identity-keyed caches of long-lived view entities, diffing every fetched
//! snapshot against the last known set and publishing add/update/remove
//! deltas to a presentation sink. Daemon events are debounced and merged
//! with periodic polling into a single serialized refresh per resource
//! kind; a refresh that finds another one in flight is skipped, not queued.

// Re-export dependencies potentially needed by consumers (like a GUI host)
pub use bollard;
pub use orbital_common as common;

pub mod cache;
pub mod docker;
pub mod engine;
pub mod entity;
pub mod events;
pub mod mapper;
pub mod provider;
pub mod sink;
pub mod stacks;
pub mod stats;

pub use docker::DockerProvider;
pub use engine::ReconciliationEngine;
pub use entity::{ContainerEntity, ImageEntity, NetworkEntity, ViewEntity, VolumeEntity};
pub use events::EventMonitor;
pub use provider::{EventStream, ResourceProvider};
pub use sink::{Delta, PresentationSink};
pub use stacks::{group_by_stack, Stack, StackState, StackView};
pub use stats::StatsStrings;
