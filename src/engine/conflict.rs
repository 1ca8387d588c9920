//! Reservation conflict checker: orchestrates the blocker registry and the
//! capacity resolver into one availability verdict.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use ulid::Ulid;

use crate::config::EngineConfig;
use crate::model::*;

use super::blocks::{self, BlockReason};
use super::capacity;
use super::error::{EngineError, ValidationError};

/// The availability verdict. Unavailability always carries enough structure
/// to explain the specific cause: the overlapping reservations and/or every
/// intersecting calendar blocker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub available: bool,
    pub conflicts: Vec<ConflictDetail>,
    pub block_reasons: Vec<BlockReason>,
    pub max_guests: u32,
    pub nights: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictDetail {
    pub reservation_id: Ulid,
    pub reference: String,
    pub guest_name: String,
    pub range: StayRange,
    pub status: ReservationStatus,
}

impl ConflictDetail {
    pub(super) fn from_reservation(r: &Reservation) -> Self {
        Self {
            reservation_id: r.id,
            reference: r.reference.clone(),
            guest_name: r.guest_name.clone(),
            range: r.range,
            status: r.status,
        }
    }
}

/// Range validation: today ≤ check_in ≤ today + max_advance_days,
/// check_out > check_in, stay ≤ max_stay_nights.
pub(super) fn validate_range(
    range: &StayRange,
    today: NaiveDate,
    config: &EngineConfig,
) -> Result<(), ValidationError> {
    if range.check_out <= range.check_in {
        return Err(ValidationError::CheckOutNotAfterCheckIn);
    }
    if range.check_in < today {
        return Err(ValidationError::CheckInPast);
    }
    if (range.check_in - today).num_days() > config.max_advance_days {
        return Err(ValidationError::CheckInTooFarAhead {
            max_days: config.max_advance_days,
        });
    }
    if range.nights() > config.max_stay_nights {
        return Err(ValidationError::StayTooLong {
            max_nights: config.max_stay_nights,
        });
    }
    Ok(())
}

/// Full availability check against one RoomType's state. Pure read — the
/// writer runs the same routine under the write guard so a verdict and the
/// insert it authorizes are atomic.
///
/// Validation failures (bad dates, room/type mismatch, out-of-service room,
/// guest overflow) are errors, distinct from an unavailable verdict.
pub(super) fn check_request(
    state: &RoomTypeState,
    global_blocks: &[DateBlock],
    target: &ReservationTarget,
    range: &StayRange,
    guests: GuestCounts,
    exclude: Option<Ulid>,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<Verdict, EngineError> {
    validate_range(range, now.date_naive(), config)?;

    let room = match target {
        ReservationTarget::RoomType(_) => None,
        ReservationTarget::Room { room_type_id, room_id } => {
            let room = state.rooms.get(room_id).ok_or(EngineError::Validation(
                ValidationError::RoomNotInType {
                    room_id: *room_id,
                    room_type_id: *room_type_id,
                },
            ))?;
            if room.status == RoomStatus::OutOfService {
                return Err(ValidationError::RoomOutOfService(*room_id).into());
            }
            Some(room)
        }
    };

    let nights = range.nights();
    let max_guests = state.record.max_guests;

    // Any calendar blocker hit short-circuits with the full reason list.
    let block_reasons = blocks::block_reasons(state, global_blocks, room.map(|r| r.id), range);
    if !block_reasons.is_empty() {
        return Ok(Verdict {
            available: false,
            conflicts: Vec::new(),
            block_reasons,
            max_guests,
            nights,
        });
    }

    // Exclusivity on an explicit room, then the pooled inventory count.
    let mut conflicting = match room {
        Some(r) => capacity::room_conflicts(state, r.id, range, now, exclude),
        None => Vec::new(),
    };
    if conflicting.is_empty() && !capacity::pooled_has_space(state, range, now, exclude) {
        conflicting = capacity::overlapping_counting(state, range, now, exclude);
    }
    if !conflicting.is_empty() {
        return Ok(Verdict {
            available: false,
            conflicts: conflicting
                .iter()
                .map(|r| ConflictDetail::from_reservation(r))
                .collect(),
            block_reasons: Vec::new(),
            max_guests,
            nights,
        });
    }

    // Guest overflow is a capacity-validation failure, reported separately
    // from date conflicts.
    if guests.total() > max_guests {
        return Err(ValidationError::TooManyGuests {
            guests: guests.total(),
            max: max_guests,
        }
        .into());
    }

    Ok(Verdict {
        available: true,
        conflicts: Vec::new(),
        block_reasons: Vec::new(),
        max_guests,
        nights,
    })
}
