//! Tentative hold lifecycle: convert, cancel, expire. A hold stops occupying
//! inventory at its expiry instant; the status flip to Expired is bookkeeping
//! and happens either here (sweep-on-touch) or in the background reaper.

use chrono::{DateTime, Utc};
use tracing::info;
use ulid::Ulid;

use crate::model::*;

use super::Engine;
use super::error::EngineError;

impl Engine {
    /// Convert a live tentative hold into a Confirmed reservation. An overdue
    /// hold is swept to Expired first and the conversion rejected, so callers
    /// see the same outcome whether or not the reaper got there first.
    pub async fn convert_hold(
        &self,
        reservation_id: Ulid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, EngineError> {
        let (type_id, mut guard) = self.resolve_entity_write(&reservation_id).await?;
        let reservation = guard
            .reservation(reservation_id)
            .ok_or(EngineError::NotFound(reservation_id))?
            .clone();

        if reservation.status != ReservationStatus::Tentative {
            return Err(EngineError::NotTentative {
                id: reservation_id,
                status: reservation.status,
            });
        }

        if hold_is_overdue(&reservation, now) {
            let event = Event::ReservationStatusChanged {
                id: reservation_id,
                room_type_id: type_id,
                status: ReservationStatus::Expired,
            };
            self.persist_and_apply(type_id, &mut guard, &event).await?;
            metrics::counter!(crate::observability::HOLDS_EXPIRED_TOTAL).increment(1);
            return Err(EngineError::NotTentative {
                id: reservation_id,
                status: ReservationStatus::Expired,
            });
        }

        // The hold itself held the inventory, so no re-check of the pool is
        // needed: nothing else could have taken its slot while it was live.
        let event = Event::ReservationStatusChanged {
            id: reservation_id,
            room_type_id: type_id,
            status: ReservationStatus::Confirmed,
        };
        self.persist_and_apply(type_id, &mut guard, &event).await?;

        metrics::counter!(crate::observability::HOLDS_CONVERTED_TOTAL).increment(1);
        info!("converted hold {} to confirmed", reservation.reference);
        Ok(guard
            .reservation(reservation_id)
            .cloned()
            .ok_or(EngineError::NotFound(reservation_id))?)
    }

    /// Cancel a live tentative hold. Overdue holds are swept to Expired and
    /// the cancel rejected, mirroring conversion.
    pub async fn cancel_hold(
        &self,
        reservation_id: Ulid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, EngineError> {
        let (type_id, mut guard) = self.resolve_entity_write(&reservation_id).await?;
        let reservation = guard
            .reservation(reservation_id)
            .ok_or(EngineError::NotFound(reservation_id))?
            .clone();

        if reservation.status != ReservationStatus::Tentative {
            return Err(EngineError::NotTentative {
                id: reservation_id,
                status: reservation.status,
            });
        }

        if hold_is_overdue(&reservation, now) {
            let event = Event::ReservationStatusChanged {
                id: reservation_id,
                room_type_id: type_id,
                status: ReservationStatus::Expired,
            };
            self.persist_and_apply(type_id, &mut guard, &event).await?;
            metrics::counter!(crate::observability::HOLDS_EXPIRED_TOTAL).increment(1);
            return Err(EngineError::NotTentative {
                id: reservation_id,
                status: ReservationStatus::Expired,
            });
        }

        let event = Event::ReservationStatusChanged {
            id: reservation_id,
            room_type_id: type_id,
            status: ReservationStatus::Cancelled,
        };
        self.persist_and_apply(type_id, &mut guard, &event).await?;

        metrics::counter!(crate::observability::HOLDS_CANCELLED_TOTAL).increment(1);
        info!("cancelled hold {}", reservation.reference);
        Ok(guard
            .reservation(reservation_id)
            .cloned()
            .ok_or(EngineError::NotFound(reservation_id))?)
    }

    /// Flip an overdue tentative hold to Expired. Idempotent: a hold that is
    /// already Expired returns it unchanged; a hold still inside its window
    /// is an error, as is any non-tentative status.
    pub async fn expire_hold(
        &self,
        reservation_id: Ulid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, EngineError> {
        let (type_id, mut guard) = self.resolve_entity_write(&reservation_id).await?;
        let reservation = guard
            .reservation(reservation_id)
            .ok_or(EngineError::NotFound(reservation_id))?
            .clone();

        match reservation.status {
            ReservationStatus::Expired => return Ok(reservation),
            ReservationStatus::Tentative => {}
            status => {
                return Err(EngineError::NotTentative {
                    id: reservation_id,
                    status,
                });
            }
        }

        if !hold_is_overdue(&reservation, now) {
            // Expiry instant, or None which should not occur for Tentative
            let expires_at = reservation.tentative_expires_at.unwrap_or(now);
            return Err(EngineError::HoldStillActive {
                id: reservation_id,
                expires_at,
            });
        }

        let event = Event::ReservationStatusChanged {
            id: reservation_id,
            room_type_id: type_id,
            status: ReservationStatus::Expired,
        };
        self.persist_and_apply(type_id, &mut guard, &event).await?;

        metrics::counter!(crate::observability::HOLDS_EXPIRED_TOTAL).increment(1);
        Ok(guard
            .reservation(reservation_id)
            .cloned()
            .ok_or(EngineError::NotFound(reservation_id))?)
    }

    /// Scan every room type for overdue tentative holds. Returns (room type
    /// id, reservation id) pairs; the reaper expires each one through
    /// [`Engine::expire_hold`] so the status flip goes through the WAL.
    pub async fn collect_expired_holds(&self, now: DateTime<Utc>) -> Vec<(Ulid, Ulid)> {
        let mut overdue = Vec::new();
        let type_ids: Vec<Ulid> = self.state.iter().map(|e| *e.key()).collect();
        for type_id in type_ids {
            let Some(rs) = self.get_room_type(&type_id) else { continue };
            let guard = rs.read().await;
            for r in &guard.reservations {
                if r.status == ReservationStatus::Tentative && hold_is_overdue(r, now) {
                    overdue.push((type_id, r.id));
                }
            }
        }
        overdue
    }
}

fn hold_is_overdue(reservation: &Reservation, now: DateTime<Utc>) -> bool {
    reservation
        .tentative_expires_at
        .is_none_or(|expires| expires <= now)
}
