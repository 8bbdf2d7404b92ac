//! Pure translation from bollard wire models into resource records.
//!
//! Mapping is total: absent optional fields become documented defaults
//! (empty labels/ports, `<none>` repository/tag, epoch timestamps) and
//! unrecognized state strings fall back to `Exited`. Nothing in here can
//! fail, so a single malformed item never aborts a list-wide refresh.

use bollard::container::Stats;
use bollard::models::{
    ContainerInspectResponse, ContainerSummary, EventMessage, ImageSummary, Network, Port,
    SystemInfo, Volume,
};
use chrono::{DateTime, TimeZone, Utc};
use orbital_common::{
    ContainerRecord, ContainerState, ImageRecord, NetworkRecord, PortMapping, ResourceEvent,
    StatsSample, SystemSummary, VolumeRecord,
};

fn from_epoch_secs(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn from_rfc3339(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

pub fn container_from_summary(summary: ContainerSummary) -> ContainerRecord {
    let name = summary
        .names
        .unwrap_or_default()
        .first()
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_default();

    ContainerRecord {
        id: summary.id.unwrap_or_default(),
        name,
        image: summary.image.unwrap_or_default(),
        state: ContainerState::parse(summary.state.as_deref().unwrap_or_default()),
        status: summary.status.unwrap_or_default(),
        created: from_epoch_secs(summary.created.unwrap_or_default()),
        labels: summary.labels.unwrap_or_default(),
        ports: summary
            .ports
            .unwrap_or_default()
            .into_iter()
            .map(port_mapping)
            .collect(),
    }
}

pub fn container_from_inspect(inspect: ContainerInspectResponse) -> ContainerRecord {
    let status = inspect
        .state
        .as_ref()
        .and_then(|s| s.status.as_ref())
        .map(|s| s.to_string())
        .unwrap_or_default();
    let config = inspect.config;

    ContainerRecord {
        id: inspect.id.unwrap_or_default(),
        name: inspect
            .name
            .unwrap_or_default()
            .trim_start_matches('/')
            .to_string(),
        image: config
            .as_ref()
            .and_then(|c| c.image.clone())
            .unwrap_or_default(),
        state: ContainerState::parse(&status),
        status,
        created: inspect
            .created
            .as_deref()
            .map(from_rfc3339)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        labels: config.and_then(|c| c.labels).unwrap_or_default(),
        // Inspect responses carry ports in a different shape; the engine
        // only diffs against list snapshots, which do include them.
        ports: Vec::new(),
    }
}

fn port_mapping(port: Port) -> PortMapping {
    PortMapping {
        private_port: port.private_port as u16,
        public_port: port.public_port.map(|p| p as u16),
        protocol: port
            .typ
            .map(|t| t.to_string())
            .unwrap_or_else(|| "tcp".to_string()),
        ip: port.ip.unwrap_or_default(),
    }
}

pub fn image_from_summary(image: ImageSummary) -> ImageRecord {
    let reference = image.repo_tags.first().cloned().unwrap_or_default();
    let (repository, tag) = split_reference(&reference);

    ImageRecord {
        id: image.id,
        repository,
        tag,
        size: image.size,
        created: from_epoch_secs(image.created),
        repo_tags: image.repo_tags,
        labels: image.labels,
    }
}

/// Split `repo:tag` into its parts, keeping registry ports intact
/// (`localhost:5000/app` is a repository, not a tagged image).
fn split_reference(reference: &str) -> (String, String) {
    if reference.is_empty() || reference == "<none>:<none>" {
        return ("<none>".to_string(), "<none>".to_string());
    }
    match reference.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo.to_string(), tag.to_string()),
        _ => (reference.to_string(), "latest".to_string()),
    }
}

pub fn volume_from_response(volume: Volume) -> VolumeRecord {
    VolumeRecord {
        name: volume.name,
        driver: volume.driver,
        mountpoint: volume.mountpoint,
        created: volume
            .created_at
            .as_deref()
            .map(from_rfc3339)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        labels: volume.labels,
        options: volume.options,
    }
}

pub fn network_from_response(network: Network) -> NetworkRecord {
    NetworkRecord {
        id: network.id.unwrap_or_default(),
        name: network.name.unwrap_or_default(),
        driver: network.driver.unwrap_or_default(),
        scope: network.scope.unwrap_or_default(),
        internal: network.internal.unwrap_or_default(),
        attachable: network.attachable.unwrap_or_default(),
        created: network
            .created
            .as_deref()
            .map(from_rfc3339)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        labels: network.labels.unwrap_or_default(),
        options: network.options.unwrap_or_default(),
    }
}

pub fn summary_from_info(info: SystemInfo) -> SystemSummary {
    SystemSummary {
        server_version: info.server_version.unwrap_or_default(),
        os: info.operating_system.unwrap_or_default(),
        architecture: info.architecture.unwrap_or_default(),
        containers: info.containers.unwrap_or_default(),
        containers_running: info.containers_running.unwrap_or_default(),
        containers_paused: info.containers_paused.unwrap_or_default(),
        containers_stopped: info.containers_stopped.unwrap_or_default(),
        images: info.images.unwrap_or_default(),
        memory_total: info.mem_total.unwrap_or_default(),
        driver: info.driver.unwrap_or_default(),
    }
}

pub fn sample_from_stats(stats: Stats) -> StatsSample {
    let (network_rx, network_tx) = stats
        .networks
        .map(|nets| {
            nets.values()
                .fold((0, 0), |(rx, tx), n| (rx + n.rx_bytes, tx + n.tx_bytes))
        })
        .unwrap_or((0, 0));

    let (block_read, block_write) = stats
        .blkio_stats
        .io_service_bytes_recursive
        .map(|entries| {
            entries
                .iter()
                .fold((0, 0), |(read, write), entry| {
                    match entry.op.to_ascii_lowercase().as_str() {
                        "read" => (read + entry.value, write),
                        "write" => (read, write + entry.value),
                        _ => (read, write),
                    }
                })
        })
        .unwrap_or((0, 0));

    StatsSample {
        cpu_total: stats.cpu_stats.cpu_usage.total_usage,
        precpu_total: stats.precpu_stats.cpu_usage.total_usage,
        system_usage: stats.cpu_stats.system_cpu_usage.unwrap_or_default(),
        presystem_usage: stats.precpu_stats.system_cpu_usage.unwrap_or_default(),
        online_cpus: stats.cpu_stats.online_cpus.unwrap_or_default(),
        memory_usage: stats.memory_stats.usage.unwrap_or_default(),
        memory_limit: stats.memory_stats.limit.unwrap_or_default(),
        network_rx,
        network_tx,
        block_read,
        block_write,
    }
}

/// Normalize a daemon event; events without an actor id carry nothing the
/// engine can act on and are dropped.
pub fn event_from_message(message: EventMessage) -> Option<ResourceEvent> {
    let id = message.actor.and_then(|actor| actor.id)?;
    Some(ResourceEvent {
        id,
        action: message.action.unwrap_or_default(),
        timestamp: message
            .time
            .map(from_epoch_secs)
            .unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_defaults_for_missing_fields() {
        let record = container_from_summary(ContainerSummary::default());
        assert_eq!(record.id, "");
        assert_eq!(record.name, "");
        assert_eq!(record.state, ContainerState::Exited);
        assert!(record.labels.is_empty());
        assert!(record.ports.is_empty());
        assert_eq!(record.created, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_container_name_strips_leading_slash() {
        let summary = ContainerSummary {
            id: Some("abc123".to_string()),
            names: Some(vec!["/webapp-db-1".to_string()]),
            state: Some("running".to_string()),
            ..Default::default()
        };
        let record = container_from_summary(summary);
        assert_eq!(record.name, "webapp-db-1");
        assert_eq!(record.state, ContainerState::Running);
    }

    #[test]
    fn test_unknown_state_maps_to_exited() {
        let summary = ContainerSummary {
            state: Some("defenestrated".to_string()),
            ..Default::default()
        };
        assert_eq!(
            container_from_summary(summary).state,
            ContainerState::Exited
        );
    }

    #[test]
    fn test_split_reference() {
        assert_eq!(
            split_reference("nginx:1.25"),
            ("nginx".to_string(), "1.25".to_string())
        );
        assert_eq!(
            split_reference(""),
            ("<none>".to_string(), "<none>".to_string())
        );
        assert_eq!(
            split_reference("<none>:<none>"),
            ("<none>".to_string(), "<none>".to_string())
        );
        // A registry port is not a tag.
        assert_eq!(
            split_reference("localhost:5000/app"),
            ("localhost:5000/app".to_string(), "latest".to_string())
        );
    }

    #[test]
    fn test_untagged_image() {
        let image = ImageSummary {
            id: "sha256:deadbeef".to_string(),
            ..Default::default()
        };
        let record = image_from_summary(image);
        assert_eq!(record.repository, "<none>");
        assert_eq!(record.tag, "<none>");
    }

    #[test]
    fn test_event_without_actor_is_dropped() {
        assert!(event_from_message(EventMessage::default()).is_none());
    }

    #[test]
    fn test_event_mapping() {
        let message = EventMessage {
            action: Some("die".to_string()),
            actor: Some(bollard::models::EventActor {
                id: Some("abc123".to_string()),
                ..Default::default()
            }),
            time: Some(1_700_000_000),
            ..Default::default()
        };
        let event = event_from_message(message).unwrap();
        assert_eq!(event.id, "abc123");
        assert_eq!(event.action, "die");
        assert_eq!(event.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_volume_bad_timestamp_defaults_to_epoch() {
        let volume = Volume {
            name: "data".to_string(),
            driver: "local".to_string(),
            mountpoint: "/var/lib/docker/volumes/data".to_string(),
            created_at: Some("not-a-date".to_string()),
            ..Default::default()
        };
        let record = volume_from_response(volume);
        assert_eq!(record.name, "data");
        assert_eq!(record.created, DateTime::<Utc>::UNIX_EPOCH);
    }
}
