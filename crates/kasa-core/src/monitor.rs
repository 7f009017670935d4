// ── Reachability monitor ──
//
// Background task that re-probes offline devices on start and then once per
// interval. Stop is observed through a `CancellationToken`, both between
// ticks and while a sweep is in flight: an interrupted probe is dropped,
// which releases the handle lock and closes its socket.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::registry::{DeviceRegistry, ProbeOutcome};

/// Periodic re-probe of offline devices.
#[derive(Debug, Clone)]
pub struct Monitor {
    registry: Arc<DeviceRegistry>,
    interval: Duration,
    cancel: CancellationToken,
}

impl Monitor {
    /// Uses the registry's configured interval.
    pub fn new(registry: Arc<DeviceRegistry>, cancel: CancellationToken) -> Self {
        let interval = registry.config().monitor_interval;
        Self {
            registry,
            interval,
            cancel,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the loop. `on_outcome` sees every probe result, e.g. to
    /// persist devices that came back.
    pub fn spawn<F>(self, on_outcome: F) -> JoinHandle<()>
    where
        F: FnMut(&ProbeOutcome) + Send + 'static,
    {
        tokio::spawn(self.run(on_outcome))
    }

    /// Run until the token is cancelled. The first sweep starts at once.
    pub async fn run<F>(self, mut on_outcome: F)
    where
        F: FnMut(&ProbeOutcome) + Send,
    {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = self.interval.as_secs(), "monitor started");
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                _ = interval.tick() => {
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => break,
                        outcomes = self.registry.probe_offline() => {
                            let recovered = outcomes.iter().filter(|o| o.is_success()).count();
                            debug!(probed = outcomes.len(), recovered, "monitor sweep finished");
                            outcomes.iter().for_each(&mut on_outcome);
                        }
                    }
                }
            }
        }
        info!("monitor stopped");
    }
}
