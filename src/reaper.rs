//! Background sweep that expires overdue tentative holds.
//!
//! Expiry is only bookkeeping: an overdue hold already stopped occupying
//! inventory at its expiry instant, and the write paths sweep on touch. The
//! reaper keeps statuses tidy for listings and makes the expiry durable in
//! the WAL.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::engine::{Engine, EngineError};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub fn spawn(engine: Arc<Engine>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep(&engine).await;
        }
    })
}

/// One pass over all room types. Each expiry is its own WAL commit; a hold
/// that was converted or cancelled between collection and expiry is skipped.
pub async fn sweep(engine: &Engine) -> usize {
    let now = Utc::now();
    let overdue = engine.collect_expired_holds(now).await;
    if overdue.is_empty() {
        return 0;
    }

    let mut expired = 0;
    for (room_type_id, reservation_id) in overdue {
        match engine.expire_hold(reservation_id, now).await {
            Ok(_) => {
                debug!(%room_type_id, %reservation_id, "expired tentative hold");
                expired += 1;
            }
            // Lost the race to a convert/cancel; nothing to do
            Err(EngineError::NotTentative { .. }) | Err(EngineError::NotFound(_)) => {}
            Err(e) => warn!(%reservation_id, "failed to expire hold: {e}"),
        }
    }
    expired
}
