use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open stay range `[check_in, check_out)` — the check-out day is not
/// occupied, so back-to-back stays never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "check_in must precede check_out");
        Self { check_in, check_out }
    }

    /// A one-night range covering exactly `day`.
    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            check_in: day,
            check_out: day.succ_opt().unwrap_or(NaiveDate::MAX),
        }
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &StayRange) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.check_in <= day && day < self.check_out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OccupancyType {
    Single,
    Double,
    Triple,
}

impl OccupancyType {
    /// Minimum `max_guests` a unit needs to offer this tier.
    pub fn required_guests(&self) -> u32 {
        match self {
            OccupancyType::Single => 1,
            OccupancyType::Double => 2,
            OccupancyType::Triple => 3,
        }
    }
}

impl std::fmt::Display for OccupancyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OccupancyType::Single => write!(f, "single"),
            OccupancyType::Double => write!(f, "double"),
            OccupancyType::Triple => write!(f, "triple"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCounts {
    pub adults: u32,
    pub children: u32,
}

impl GuestCounts {
    pub fn new(adults: u32, children: u32) -> Self {
        Self { adults, children }
    }

    pub fn total(&self) -> u32 {
        self.adults + self.children
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
    Tentative,
    Expired,
}

impl ReservationStatus {
    /// Statuses that occupy inventory unconditionally. Tentative holds also
    /// occupy inventory, but only until their expiry instant — see
    /// `capacity::counts_toward_capacity`.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Pending | ReservationStatus::Confirmed | ReservationStatus::CheckedIn
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::CheckedOut | ReservationStatus::Cancelled | ReservationStatus::Expired
        )
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::CheckedIn => "checked-in",
            ReservationStatus::CheckedOut => "checked-out",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Tentative => "tentative",
            ReservationStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

// ── Inventory records ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomTypeRecord {
    pub id: Ulid,
    pub name: String,
    /// Pooled capacity shared across indistinguishable rooms of this type.
    pub total_inventory: u32,
    pub max_guests: u32,
    /// Nightly rate in minor currency units, used when no tier rate applies.
    pub base_rate: i64,
    pub single_rate: Option<i64>,
    pub double_rate: Option<i64>,
    pub triple_rate: Option<i64>,
    pub single_enabled: bool,
    pub double_enabled: bool,
    pub triple_enabled: bool,
    pub children_allowed: bool,
    /// Child supplement percentage; `None` falls back to the config default.
    pub child_multiplier: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Active,
    OutOfService,
}

/// An individually numbered room. Policy fields are tri-state: `None`
/// inherits from the parent RoomType.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndividualRoomRecord {
    pub id: Ulid,
    pub room_type_id: Ulid,
    pub number: String,
    pub status: RoomStatus,
    /// Per-room nightly rate; honored only when positive.
    pub rate_override: Option<i64>,
    pub single_override: Option<bool>,
    pub double_override: Option<bool>,
    pub triple_override: Option<bool>,
    pub children_allowed_override: Option<bool>,
    pub child_multiplier_override: Option<u32>,
}

// ── Calendar blockers ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockScope {
    Global,
    RoomType(Ulid),
    Room { room_type_id: Ulid, room_id: Ulid },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBlock {
    pub id: Ulid,
    pub scope: BlockScope,
    pub range: StayRange,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaintenanceStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl std::fmt::Display for MaintenanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MaintenanceStatus::Planned => "planned",
            MaintenanceStatus::InProgress => "in-progress",
            MaintenanceStatus::Completed => "completed",
            MaintenanceStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub id: Ulid,
    pub room_type_id: Ulid,
    pub room_id: Ulid,
    pub range: StayRange,
    pub blocking: bool,
    pub status: MaintenanceStatus,
}

impl MaintenanceWindow {
    /// Only blocking windows that are planned or underway keep a room out of
    /// the calendar.
    pub fn participates(&self) -> bool {
        self.blocking
            && matches!(
                self.status,
                MaintenanceStatus::Planned | MaintenanceStatus::InProgress
            )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HousekeepingStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
    Verified,
}

impl std::fmt::Display for HousekeepingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HousekeepingStatus::Pending => "pending",
            HousekeepingStatus::InProgress => "in-progress",
            HousekeepingStatus::Completed => "completed",
            HousekeepingStatus::Blocked => "blocked",
            HousekeepingStatus::Verified => "verified",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HousekeepingHold {
    pub id: Ulid,
    pub room_type_id: Ulid,
    pub room_id: Ulid,
    /// Housekeeping is due-date scoped: it blocks exactly `[due, due+1)`.
    pub due: NaiveDate,
    pub status: HousekeepingStatus,
}

impl HousekeepingHold {
    pub fn participates(&self) -> bool {
        matches!(
            self.status,
            HousekeepingStatus::Pending | HousekeepingStatus::InProgress | HousekeepingStatus::Blocked
        )
    }
}

// ── Reservations ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub nightly_rate: i64,
    pub nights: i64,
    pub room_total: i64,
    pub child_supplement: i64,
    pub total: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    /// Unique human-readable reference, e.g. `BK-3F0QJ2M8`.
    pub reference: String,
    pub room_type_id: Ulid,
    /// Assigned room, if any; pooled reservations leave this unset.
    pub room_id: Option<Ulid>,
    pub guest_name: String,
    pub range: StayRange,
    pub guests: GuestCounts,
    pub occupancy: OccupancyType,
    pub status: ReservationStatus,
    pub tentative_expires_at: Option<DateTime<Utc>>,
    pub price: PriceBreakdown,
}

/// Which unit a request targets. An explicit room must belong to the stated
/// room type; the checker treats a mismatch as a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationTarget {
    RoomType(Ulid),
    Room { room_type_id: Ulid, room_id: Ulid },
}

impl ReservationTarget {
    pub fn room_type_id(&self) -> Ulid {
        match self {
            ReservationTarget::RoomType(id) => *id,
            ReservationTarget::Room { room_type_id, .. } => *room_type_id,
        }
    }

    pub fn room_id(&self) -> Option<Ulid> {
        match self {
            ReservationTarget::RoomType(_) => None,
            ReservationTarget::Room { room_id, .. } => Some(*room_id),
        }
    }
}

/// Input to `Engine::create_reservation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub target: ReservationTarget,
    pub guest_name: String,
    pub range: StayRange,
    pub guests: GuestCounts,
    pub occupancy: OccupancyType,
    /// When true the reservation is created as a tentative hold that expires
    /// unless converted.
    pub tentative: bool,
}

// ── In-memory state per RoomType ─────────────────────────────────

/// All state for one RoomType: the record, its rooms, its calendar blockers
/// and every reservation targeting the type (pooled or room-assigned).
/// Reservations stay sorted by `check_in` so overlap scans can bound the
/// search with `partition_point`.
#[derive(Debug, Clone)]
pub struct RoomTypeState {
    pub record: RoomTypeRecord,
    pub rooms: std::collections::HashMap<Ulid, IndividualRoomRecord>,
    pub blocks: Vec<DateBlock>,
    pub maintenance: Vec<MaintenanceWindow>,
    pub housekeeping: Vec<HousekeepingHold>,
    pub reservations: Vec<Reservation>,
}

impl RoomTypeState {
    pub fn new(record: RoomTypeRecord) -> Self {
        Self {
            record,
            rooms: std::collections::HashMap::new(),
            blocks: Vec::new(),
            maintenance: Vec::new(),
            housekeeping: Vec::new(),
            reservations: Vec::new(),
        }
    }

    /// Insert a reservation keeping the vector sorted by `check_in`.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.range.check_in, |r| r.range.check_in)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    pub fn reservation(&self, id: Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == id)
    }

    pub fn reservation_mut(&mut self, id: Ulid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == id)
    }

    /// Reservations whose range overlaps `query`, regardless of status.
    /// Everything at index >= the partition point checks in at or after
    /// `query.check_out` and cannot overlap.
    pub fn overlapping(&self, query: &StayRange) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.range.check_in < query.check_out);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.range.check_out > query.check_in)
    }
}

// ── WAL events ───────────────────────────────────────────────────

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomTypeCreated { record: RoomTypeRecord },
    RoomTypeUpdated { record: RoomTypeRecord },
    RoomCreated { record: IndividualRoomRecord },
    RoomUpdated { record: IndividualRoomRecord },
    DateBlockAdded { block: DateBlock },
    DateBlockRemoved { id: Ulid, scope: BlockScope },
    MaintenanceScheduled { window: MaintenanceWindow },
    MaintenanceStatusChanged {
        id: Ulid,
        room_type_id: Ulid,
        status: MaintenanceStatus,
    },
    HousekeepingLogged { hold: HousekeepingHold },
    HousekeepingStatusChanged {
        id: Ulid,
        room_type_id: Ulid,
        status: HousekeepingStatus,
    },
    ReservationCreated { reservation: Reservation },
    ReservationStatusChanged {
        id: Ulid,
        room_type_id: Ulid,
        status: ReservationStatus,
    },
    RoomAssigned {
        reservation_id: Ulid,
        room_type_id: Ulid,
        room_id: Ulid,
        price: PriceBreakdown,
    },
}
