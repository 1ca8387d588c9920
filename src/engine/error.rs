use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::model::{OccupancyType, ReservationStatus};

use super::conflict::Verdict;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Bad input — field-level detail, never worth retrying unchanged.
    Validation(ValidationError),
    /// The requested dates are taken; carries the itemized verdict.
    Unavailable(Box<Verdict>),
    /// Hold operation on a reservation that is not a live tentative hold.
    NotTentative { id: Ulid, status: ReservationStatus },
    /// Explicit expiry requested before the hold's expiry instant.
    HoldStillActive { id: Ulid, expires_at: DateTime<Utc> },
    InvalidTransition {
        id: Ulid,
        from: ReservationStatus,
        to: ReservationStatus,
    },
    /// Inventory shrink below the peak committed reservation load.
    InventoryBelowCommitted { committed: u32, requested: u32 },
    /// The bounded retry-until-unique reference loop ran out of attempts.
    ReferenceExhausted { attempts: u32 },
    LimitExceeded(&'static str),
    /// WAL append/compact failure — the mutation was rolled back and may be
    /// retried wholesale.
    Wal(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Validation(v) => write!(f, "validation failed: {v}"),
            EngineError::Unavailable(verdict) => {
                write!(
                    f,
                    "dates unavailable: {} conflicting reservation(s), {} calendar block(s)",
                    verdict.conflicts.len(),
                    verdict.block_reasons.len()
                )
            }
            EngineError::NotTentative { id, status } => {
                write!(f, "reservation {id} is {status}, not a live tentative hold")
            }
            EngineError::HoldStillActive { id, expires_at } => {
                write!(f, "hold {id} is still active until {expires_at}")
            }
            EngineError::InvalidTransition { id, from, to } => {
                write!(f, "reservation {id} cannot move from {from} to {to}")
            }
            EngineError::InventoryBelowCommitted { committed, requested } => {
                write!(
                    f,
                    "cannot shrink inventory to {requested}: {committed} overlapping reservation(s) already committed"
                )
            }
            EngineError::ReferenceExhausted { attempts } => {
                write!(f, "could not generate a unique reference in {attempts} attempts")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ValidationError> for EngineError {
    fn from(v: ValidationError) -> Self {
        EngineError::Validation(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    CheckOutNotAfterCheckIn,
    CheckInPast,
    CheckInTooFarAhead { max_days: i64 },
    StayTooLong { max_nights: i64 },
    /// The explicit room does not belong to the stated room type — distinct
    /// from an availability failure.
    RoomNotInType { room_id: Ulid, room_type_id: Ulid },
    RoomOutOfService(Ulid),
    TooManyGuests { guests: u32, max: u32 },
    OccupancyDisabled(OccupancyType),
    ChildrenNotAllowed,
    NoAdults,
    /// The price computation would overflow i64.
    PriceOverflow,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::CheckOutNotAfterCheckIn => {
                write!(f, "check_out must be after check_in")
            }
            ValidationError::CheckInPast => write!(f, "check_in is in the past"),
            ValidationError::CheckInTooFarAhead { max_days } => {
                write!(f, "check_in is more than {max_days} days ahead")
            }
            ValidationError::StayTooLong { max_nights } => {
                write!(f, "stay exceeds {max_nights} nights")
            }
            ValidationError::RoomNotInType { room_id, room_type_id } => {
                write!(f, "room {room_id} does not belong to room type {room_type_id}")
            }
            ValidationError::RoomOutOfService(id) => write!(f, "room {id} is out of service"),
            ValidationError::TooManyGuests { guests, max } => {
                write!(f, "{guests} guests exceed the unit maximum of {max}")
            }
            ValidationError::OccupancyDisabled(occ) => {
                write!(f, "{occ} occupancy is not offered on this unit")
            }
            ValidationError::ChildrenNotAllowed => {
                write!(f, "children are not allowed on this unit")
            }
            ValidationError::NoAdults => {
                write!(f, "at least one adult is required")
            }
            ValidationError::PriceOverflow => {
                write!(f, "price computation out of range")
            }
        }
    }
}

impl std::error::Error for ValidationError {}
