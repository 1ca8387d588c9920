//! innkeep — a room reservation & availability engine.
//!
//! State lives in memory behind per-room-type locks and is made durable by an
//! append-only event WAL. The engine decides whether a reservation request can
//! be granted, at what price, and how it interacts with date blocks,
//! maintenance windows, housekeeping holds and other bookings — across pooled
//! room-type inventory and individually numbered rooms.

pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod reaper;
pub mod wal;

pub use config::EngineConfig;
pub use engine::{Engine, EngineError, ValidationError, Verdict};
pub use model::{
    BlockScope, DateBlock, Event, GuestCounts, HousekeepingHold, HousekeepingStatus,
    IndividualRoomRecord, MaintenanceStatus, MaintenanceWindow, OccupancyType, PriceBreakdown,
    Reservation, ReservationRequest, ReservationStatus, ReservationTarget, RoomStatus,
    RoomTypeRecord, StayRange,
};
