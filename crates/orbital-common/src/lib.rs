// Re-export dependencies used in public interfaces of common types

pub use chrono;
pub use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

mod config;
mod records;

pub use config::EngineConfig;
pub use records::{
    ContainerRecord, ContainerState, ImageRecord, NetworkRecord, PortMapping, ResourceEvent,
    StatsSample, SystemSummary, VolumeRecord,
};

/// Compose project label carried by containers started through a stack.
pub const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";
/// Compose service label identifying a container's role within its stack.
pub const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";

/// Failure taxonomy for every provider-facing call.
///
/// `NotFound` and `Conflict` carry enough context to build a status line;
/// `Transient` means the daemon was unreachable or slow and the last good
/// cache should stay visible; `Unexpected` is anything the taxonomy cannot
/// classify and is reported, never retried.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{kind} '{id}' was not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("Conflict on {kind} '{id}': {reason}")]
    Conflict {
        kind: ResourceKind,
        id: String,
        reason: String,
    },

    #[error("Docker daemon is not responding: {0}")]
    Transient(String),

    #[error("Unexpected provider error: {0}")]
    Unexpected(String),
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

// Define the primary Result type for provider and engine operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// The four resource kinds the engine reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Container,
    Image,
    Volume,
    Network,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceKind::Container => "container",
            ResourceKind::Image => "image",
            ResourceKind::Volume => "volume",
            ResourceKind::Network => "network",
        };
        write!(f, "{name}")
    }
}

/// Lifecycle operations accepted for a single container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerAction {
    Start,
    Stop,
    Restart,
    Pause,
    Unpause,
    Kill,
    Remove { force: bool },
}

impl ContainerAction {
    /// Teardown actions treat a vanished target as already satisfied.
    pub fn is_idempotent_teardown(&self) -> bool {
        matches!(
            self,
            ContainerAction::Stop | ContainerAction::Remove { .. } | ContainerAction::Kill
        )
    }

    pub fn verb(&self) -> &'static str {
        match self {
            ContainerAction::Start => "start",
            ContainerAction::Stop => "stop",
            ContainerAction::Restart => "restart",
            ContainerAction::Pause => "pause",
            ContainerAction::Unpause => "unpause",
            ContainerAction::Kill => "kill",
            ContainerAction::Remove { .. } => "remove",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ProviderError::NotFound {
            kind: ResourceKind::Container,
            id: "abc123".into(),
        };
        assert_eq!(err.to_string(), "container 'abc123' was not found");
        assert!(err.is_not_found());
        assert!(!err.is_transient());

        let err = ProviderError::Transient("connection refused".into());
        assert!(err.is_transient());
    }

    #[test]
    fn test_teardown_idempotency() {
        assert!(ContainerAction::Stop.is_idempotent_teardown());
        assert!(ContainerAction::Remove { force: true }.is_idempotent_teardown());
        assert!(!ContainerAction::Start.is_idempotent_teardown());
        assert!(!ContainerAction::Pause.is_idempotent_teardown());
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ResourceKind::Container).unwrap();
        assert_eq!(json, "\"container\"");
        assert_eq!(ResourceKind::Volume.to_string(), "volume");
    }
}
