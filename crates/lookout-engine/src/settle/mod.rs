//! DOM settle.
//!
//! "Settled" means no in-flight network request for at least one
//! sampling interval, bounded by a hard timeout. The tracker rides the
//! lifecycle-pooled session so request bursts caused by actions never
//! interleave with DOM traversal traffic.

use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, instrument, trace};

use lookout_cdp::protocol::network::{
    LoadingFailedEvent, LoadingFinishedEvent, RequestId, RequestWillBeSentEvent,
};
use lookout_cdp::{CdpEvent, SessionKind};

use crate::config::EngineConfig;
use crate::driver::Page;
use crate::error::ActionError;

/// Why a settle wait returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettleReason {
    /// The in-flight set was empty at a sample.
    Quiet,
    /// The hard ceiling elapsed with requests still in flight.
    Timeout,
}

/// In-flight request bookkeeping.
///
/// Pure state so the add/remove/quiet logic is testable; the waiter
/// below feeds it CDP events.
#[derive(Debug, Default)]
pub(crate) struct SettleTracker {
    in_flight: HashSet<RequestId>,
}

impl SettleTracker {
    /// Apply one network event; unrelated events are ignored.
    pub(crate) fn observe(&mut self, event: &CdpEvent) {
        match event.method.as_str() {
            "Network.requestWillBeSent" => {
                if let Some(sent) = event.parse_params::<RequestWillBeSentEvent>() {
                    self.in_flight.insert(sent.request_id);
                }
            }
            "Network.loadingFinished" => {
                if let Some(finished) = event.parse_params::<LoadingFinishedEvent>() {
                    self.in_flight.remove(&finished.request_id);
                }
            }
            "Network.loadingFailed" => {
                if let Some(failed) = event.parse_params::<LoadingFailedEvent>() {
                    self.in_flight.remove(&failed.request_id);
                }
            }
            _ => {}
        }
    }

    /// Whether the page is quiet at this sample.
    pub(crate) fn is_quiet(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub(crate) fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

/// Wait for the DOM to settle.
///
/// Enables Network events on the lifecycle-pooled session, tracks
/// in-flight request ids, polls every `settle_poll_interval`, and
/// returns [`SettleReason::Quiet`] at the first empty sample or
/// [`SettleReason::Timeout`] once `settle_timeout` elapses.
///
/// # Errors
///
/// Returns an error when the lifecycle session cannot be acquired or
/// Network events cannot be enabled.
#[instrument(level = "debug", skip_all, fields(target_id = %page.target_id()))]
pub async fn wait_for_settled_dom(
    page: &Page,
    config: &EngineConfig,
) -> Result<SettleReason, ActionError> {
    let session = page.session_pool().pooled(SessionKind::Lifecycle).await?;
    let mut events = session.subscribe_events();
    session
        .send_command::<(), serde_json::Value>("Network.enable", None)
        .await?;

    let mut tracker = SettleTracker::default();
    let started = Instant::now();
    // First sample lands one full interval out; events get a chance to
    // arrive before quiet can be declared.
    let mut interval = tokio::time::interval_at(
        tokio::time::Instant::now() + config.settle_poll_interval,
        config.settle_poll_interval,
    );
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) if event.is_from_session(session.id()) => {
                        tracker.observe(&event);
                    }
                    Ok(_) => {}
                    // Lagged or closed: resync pessimistically by
                    // sampling on the timer alone.
                    Err(_) => {}
                }
            }
            _ = interval.tick() => {
                if tracker.is_quiet() {
                    debug!(elapsed_ms = started.elapsed().as_millis(), "DOM settled");
                    return Ok(SettleReason::Quiet);
                }
                trace!(in_flight = tracker.in_flight_count(), "still loading");
                if started.elapsed() >= config.settle_timeout {
                    debug!(in_flight = tracker.in_flight_count(), "settle timed out");
                    return Ok(SettleReason::Timeout);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
