//! Event stream supervision.
//!
//! The monitor owns a single background task that subscribes to the
//! provider's event stream and forwards normalized events into a channel
//! the engine debounces. When the stream ends or yields an error the task
//! sleeps a fixed delay and resubscribes; it retries forever and only
//! stops when explicitly told to. No other part of the system retries.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use orbital_common::ResourceEvent;

use crate::provider::ResourceProvider;

pub struct EventMonitor {
    handle: JoinHandle<()>,
}

impl EventMonitor {
    /// Start forwarding daemon events into `tx`. Dropping the receiver
    /// stops the task on the next event.
    pub fn start(
        provider: Arc<dyn ResourceProvider>,
        tx: mpsc::Sender<ResourceEvent>,
        retry_delay: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                let mut stream = provider.events();
                debug!("subscribed to daemon events");
                loop {
                    match stream.next().await {
                        Some(Ok(event)) => {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                        Some(Err(error)) => {
                            warn!(%error, "event stream failed");
                            break;
                        }
                        None => {
                            warn!("event stream ended");
                            break;
                        }
                    }
                }
                tokio::time::sleep(retry_delay).await;
            }
        });
        Self { handle }
    }

    /// Stop the monitor. Unlike a stream failure this is final; no
    /// resubscription happens afterwards.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for EventMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
