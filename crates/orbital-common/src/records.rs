//! Immutable resource snapshots fetched from the provider.
//!
//! Records are value types keyed by a provider-assigned opaque id that is
//! stable across refreshes. They carry no behavior beyond cheap derived
//! accessors; all mutation happens on the view entities that wrap them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{COMPOSE_PROJECT_LABEL, COMPOSE_SERVICE_LABEL};

/// Closed set of container lifecycle states reported by the daemon.
///
/// Parsing is total: a state string outside this set maps to `Exited` so a
/// single odd item can never reject a whole refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Running,
    Paused,
    Exited,
    Created,
    Restarting,
    Dead,
    Removing,
}

impl ContainerState {
    pub fn parse(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "exited" => ContainerState::Exited,
            "created" => ContainerState::Created,
            "restarting" => ContainerState::Restarting,
            "dead" => ContainerState::Dead,
            "removing" => ContainerState::Removing,
            _ => ContainerState::Exited,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ContainerState::Running)
    }

    /// Terminal-stopped states that count toward a stack being "all stopped".
    pub fn is_stopped(&self) -> bool {
        matches!(self, ContainerState::Exited | ContainerState::Created)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub private_port: u16,
    pub public_port: Option<u16>,
    pub protocol: String,
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    /// Raw human-readable status line from the daemon ("Up 2 hours", ...).
    pub status: String,
    pub created: DateTime<Utc>,
    pub labels: HashMap<String, String>,
    pub ports: Vec<PortMapping>,
}

impl ContainerRecord {
    pub fn stack_name(&self) -> Option<&str> {
        self.labels
            .get(COMPOSE_PROJECT_LABEL)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn service_name(&self) -> Option<&str> {
        self.labels
            .get(COMPOSE_SERVICE_LABEL)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub repository: String,
    pub tag: String,
    pub size: i64,
    pub created: DateTime<Utc>,
    pub repo_tags: Vec<String>,
    pub labels: HashMap<String, String>,
}

impl ImageRecord {
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeRecord {
    /// Volume names are their identity; the daemon assigns no separate id.
    pub name: String,
    pub driver: String,
    pub mountpoint: String,
    pub created: DateTime<Utc>,
    pub labels: HashMap<String, String>,
    pub options: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub id: String,
    pub name: String,
    pub driver: String,
    pub scope: String,
    pub internal: bool,
    pub attachable: bool,
    pub created: DateTime<Utc>,
    pub labels: HashMap<String, String>,
    pub options: HashMap<String, String>,
}

impl NetworkRecord {
    /// The daemon's default networks cannot be removed.
    pub fn is_builtin(&self) -> bool {
        matches!(self.name.as_str(), "bridge" | "host" | "none")
    }
}

/// Normalized daemon event republished by the event monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub id: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

/// One-shot stats counters for a single container.
///
/// Network and block totals are already summed across interfaces/devices;
/// percentage math is left to the consumer because it needs the pre-sample
/// deltas kept here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSample {
    pub cpu_total: u64,
    pub precpu_total: u64,
    pub system_usage: u64,
    pub presystem_usage: u64,
    pub online_cpus: u64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub network_rx: u64,
    pub network_tx: u64,
    pub block_read: u64,
    pub block_write: u64,
}

impl StatsSample {
    /// CPU usage in percent, normalized by the number of online CPUs.
    pub fn cpu_percent(&self) -> f64 {
        let cpu_delta = self.cpu_total.saturating_sub(self.precpu_total) as f64;
        let system_delta = self.system_usage.saturating_sub(self.presystem_usage) as f64;
        if system_delta <= 0.0 {
            return 0.0;
        }
        let cpus = if self.online_cpus > 0 {
            self.online_cpus as f64
        } else {
            1.0
        };
        (cpu_delta / system_delta) * cpus * 100.0
    }

    pub fn memory_percent(&self) -> f64 {
        if self.memory_limit == 0 {
            return 0.0;
        }
        (self.memory_usage as f64 / self.memory_limit as f64) * 100.0
    }
}

/// Daemon-wide summary used for the host's status line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSummary {
    pub server_version: String,
    pub os: String,
    pub architecture: String,
    pub containers: i64,
    pub containers_running: i64,
    pub containers_paused: i64,
    pub containers_stopped: i64,
    pub images: i64,
    pub memory_total: i64,
    pub driver: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_parse_known() {
        assert_eq!(ContainerState::parse("running"), ContainerState::Running);
        assert_eq!(ContainerState::parse("Paused"), ContainerState::Paused);
        assert_eq!(ContainerState::parse("DEAD"), ContainerState::Dead);
        assert_eq!(ContainerState::parse("removing"), ContainerState::Removing);
    }

    #[test]
    fn test_state_parse_unknown_falls_back_to_exited() {
        assert_eq!(ContainerState::parse("levitating"), ContainerState::Exited);
        assert_eq!(ContainerState::parse(""), ContainerState::Exited);
    }

    #[test]
    fn test_stack_labels() {
        let mut labels = HashMap::new();
        labels.insert(COMPOSE_PROJECT_LABEL.to_string(), "webapp".to_string());
        labels.insert(COMPOSE_SERVICE_LABEL.to_string(), "db".to_string());

        let record = ContainerRecord {
            id: "c1".into(),
            name: "webapp-db-1".into(),
            image: "postgres:16".into(),
            state: ContainerState::Running,
            status: "Up 5 minutes".into(),
            created: Utc::now(),
            labels,
            ports: vec![],
        };
        assert_eq!(record.stack_name(), Some("webapp"));
        assert_eq!(record.service_name(), Some("db"));

        let standalone = ContainerRecord {
            labels: HashMap::new(),
            ..record
        };
        assert_eq!(standalone.stack_name(), None);
    }

    #[test]
    fn test_cpu_percent() {
        let sample = StatsSample {
            cpu_total: 400,
            precpu_total: 200,
            system_usage: 2000,
            presystem_usage: 1000,
            online_cpus: 4,
            ..Default::default()
        };
        // 200/1000 * 4 cpus * 100
        assert!((sample.cpu_percent() - 80.0).abs() < f64::EPSILON);

        // Zero system delta never divides by zero.
        let idle = StatsSample::default();
        assert_eq!(idle.cpu_percent(), 0.0);
    }

    #[test]
    fn test_builtin_networks() {
        let net = NetworkRecord {
            id: "n1".into(),
            name: "bridge".into(),
            driver: "bridge".into(),
            scope: "local".into(),
            internal: false,
            attachable: false,
            created: Utc::now(),
            labels: HashMap::new(),
            options: HashMap::new(),
        };
        assert!(net.is_builtin());
    }
}
