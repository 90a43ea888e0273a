//! Dashboard poller
//!
//! Periodically pulls `health`, `status` and `cron.list` through the shared
//! gateway client and publishes the derived [`DashboardSnapshot`].

use super::view::DashboardSnapshot;
use crate::gateway::GatewayRegistry;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Keeps the latest dashboard snapshot up to date
#[derive(Debug)]
pub struct DashboardPoller {
    registry: Arc<GatewayRegistry>,
    idle_threshold: Duration,
    snapshot: watch::Sender<DashboardSnapshot>,
}

impl DashboardPoller {
    /// Create a poller reading through `registry`
    pub fn new(registry: Arc<GatewayRegistry>, idle_threshold: Duration) -> Self {
        let (snapshot, _) = watch::channel(DashboardSnapshot::default());
        Self {
            registry,
            idle_threshold,
            snapshot,
        }
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch for new snapshots
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshot.subscribe()
    }

    /// Poll the gateway once and publish the result
    ///
    /// On failure the previous agents and jobs are kept and the error is
    /// recorded on the snapshot.
    pub async fn refresh(&self) -> DashboardSnapshot {
        self.snapshot.send_modify(|s| s.connecting = !s.connected);

        let client = self.registry.get();
        let result = tokio::try_join!(
            client.fetch_health(),
            client.fetch_status(),
            client.fetch_crons()
        );

        match result {
            Ok((health, status, crons)) => {
                let next = DashboardSnapshot::from_responses(
                    &health,
                    &status,
                    &crons,
                    Utc::now().timestamp_millis(),
                    self.idle_threshold,
                );
                debug!(
                    agents = next.agents.len(),
                    crons = next.crons.len(),
                    "Dashboard refreshed"
                );
                self.snapshot.send_replace(next.clone());
                next
            }
            Err(e) => {
                warn!(error = %e, "Dashboard refresh failed");
                self.snapshot.send_modify(|s| s.record_failure(e.to_string()));
                self.snapshot()
            }
        }
    }

    /// Handle a settings change: rebuild the shared client, then poll
    pub async fn reconnect(&self) -> DashboardSnapshot {
        if let Err(e) = self.registry.invalidate_and_reconnect().await {
            debug!(error = %e, "Reconnect after settings change failed");
        }
        self.refresh().await
    }

    /// Poll every `interval` and whenever the gateway settings change
    ///
    /// Runs until the task is aborted.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut settings = self.registry.subscribe();
        let mut watching = true;

        info!(interval_secs = interval.as_secs(), "Dashboard poller started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh().await;
                }
                changed = settings.changed(), if watching => {
                    if changed.is_err() {
                        watching = false;
                        continue;
                    }
                    let url = settings.borrow_and_update().url.clone();
                    info!(url = %url, "Gateway settings changed, reconnecting");
                    self.reconnect().await;
                    ticker.reset();
                }
            }
        }
    }
}
