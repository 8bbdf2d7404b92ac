//! Live per-container resource usage.
//!
//! One detached task per expanded container polls one-shot stats on a
//! fixed cadence, formats the counters into display strings and stores
//! them on the entity. A failed sample shows placeholders and backs off;
//! the task itself only dies when the engine aborts it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use orbital_common::StatsSample;

use crate::entity::{ContainerEntity, ViewEntity};
use crate::provider::ResourceProvider;
use crate::sink::{Delta, PresentationSink};

/// Pre-formatted stats for direct display. `--` means no sample yet or
/// the last one failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsStrings {
    pub cpu: String,
    pub memory: String,
    pub network: String,
    pub disk: String,
}

impl Default for StatsStrings {
    fn default() -> Self {
        Self {
            cpu: "--".to_string(),
            memory: "--".to_string(),
            network: "--".to_string(),
            disk: "--".to_string(),
        }
    }
}

pub fn format_sample(sample: &StatsSample) -> StatsStrings {
    StatsStrings {
        cpu: format!("{:.1}%", sample.cpu_percent()),
        memory: format!(
            "{} / {} ({:.1}%)",
            format_bytes(sample.memory_usage),
            format_bytes(sample.memory_limit),
            sample.memory_percent()
        ),
        network: format!(
            "▼ {} / ▲ {}",
            format_bytes(sample.network_rx),
            format_bytes(sample.network_tx)
        ),
        disk: format!(
            "R {} / W {}",
            format_bytes(sample.block_read),
            format_bytes(sample.block_write)
        ),
    }
}

const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Spawn the polling task for one container. The caller owns the handle
/// and aborts it when the container collapses or disappears.
pub fn spawn_monitor(
    provider: Arc<dyn ResourceProvider>,
    sink: Arc<dyn PresentationSink>,
    entity: Arc<ContainerEntity>,
    interval: Duration,
    error_delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let delay = match provider.stats_once(entity.id()).await {
                Ok(sample) => {
                    entity.set_stats(format_sample(&sample));
                    sink.containers_changed(vec![Delta::Updated(Arc::clone(&entity))]);
                    interval
                }
                Err(error) => {
                    debug!(container = entity.id(), %error, "stats sample failed");
                    entity.clear_stats();
                    sink.containers_changed(vec![Delta::Updated(Arc::clone(&entity))]);
                    error_delay
                }
            };
            tokio::time::sleep(delay).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.0 KiB");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }

    #[test]
    fn test_format_sample() {
        let sample = StatsSample {
            cpu_total: 400,
            precpu_total: 200,
            system_usage: 2000,
            presystem_usage: 1000,
            online_cpus: 2,
            memory_usage: 512 * 1024 * 1024,
            memory_limit: 2 * 1024 * 1024 * 1024,
            network_rx: 1024,
            network_tx: 2048,
            block_read: 0,
            block_write: 4096,
        };
        let strings = format_sample(&sample);
        assert_eq!(strings.cpu, "40.0%");
        assert_eq!(strings.memory, "512.0 MiB / 2.0 GiB (25.0%)");
        assert_eq!(strings.network, "▼ 1.0 KiB / ▲ 2.0 KiB");
        assert_eq!(strings.disk, "R 0 B / W 4.0 KiB");
    }

    #[test]
    fn test_default_is_placeholders() {
        let strings = StatsStrings::default();
        assert_eq!(strings.cpu, "--");
        assert_eq!(strings.memory, "--");
    }
}
