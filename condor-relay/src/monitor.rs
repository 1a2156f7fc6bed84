//! Background status monitor
//!
//! Polls the bridge once per second. Warns when the data flow stalls after
//! traffic had started and logs a status summary every thirty seconds.

use crate::bridge::{Bridge, BridgeState};
use crate::stats::Statistics;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const CHECK_INTERVAL: Duration = Duration::from_secs(1);
const SUMMARY_INTERVAL: Duration = Duration::from_secs(30);

/// Silence after which a stall is reported
pub const STALL_THRESHOLD: Duration = Duration::from_secs(10);

/// Data-flow transition worth logging
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlowEvent {
    Stalled { silent_secs: f64 },
    Resumed,
}

/// Tracks whether the current run's data flow is stalled
#[derive(Debug, Default)]
pub struct FlowWatch {
    run: Option<DateTime<Utc>>,
    stalled: bool,
}

impl FlowWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a snapshot; returns an event when the flow changes state
    pub fn observe(&mut self, stats: &Statistics) -> Option<FlowEvent> {
        // A new run has fresh counters.
        if self.run != Some(stats.started_at) {
            self.run = Some(stats.started_at);
            self.stalled = false;
        }

        let age = stats.last_packet_age_secs?;
        let silent = age >= STALL_THRESHOLD.as_secs_f64();

        match (self.stalled, silent) {
            (false, true) => {
                self.stalled = true;
                Some(FlowEvent::Stalled { silent_secs: age })
            }
            (true, false) => {
                self.stalled = false;
                Some(FlowEvent::Resumed)
            }
            _ => None,
        }
    }
}

/// Run until `cancel` fires
pub async fn run(bridge: Bridge, cancel: CancellationToken) {
    let mut check = tokio::time::interval(CHECK_INTERVAL);
    let mut summary = tokio::time::interval(SUMMARY_INTERVAL);
    // Both intervals fire immediately; skip the initial summary.
    summary.tick().await;

    let mut flow = FlowWatch::new();
    let mut faulted_reported = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = check.tick() => {
                let state = bridge.state();
                match state {
                    BridgeState::Running => {
                        faulted_reported = false;
                        match flow.observe(&bridge.statistics()) {
                            Some(FlowEvent::Stalled { silent_secs }) => {
                                warn!("No data received for {:.1} seconds", silent_secs);
                            }
                            Some(FlowEvent::Resumed) => info!("Data flow resumed"),
                            None => {}
                        }
                    }
                    BridgeState::Faulted if !faulted_reported => {
                        faulted_reported = true;
                        warn!("Relay is faulted; start it again to resume");
                    }
                    _ => {}
                }
            }
            _ = summary.tick() => {
                if bridge.state() == BridgeState::Running {
                    log_summary(&bridge.statistics());
                }
            }
        }
    }
}

fn log_summary(stats: &Statistics) {
    info!(
        uptime_secs = stats.uptime_secs as u64,
        received = stats.packets_received,
        forwarded = stats.packets_forwarded,
        converted = stats.packets_converted,
        dropped = stats.packets_dropped,
        data_active = stats.data_active,
        "Relay status"
    );
}
