//! Capacity resolver: pooled room-type inventory vs. per-room exclusivity.

use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::model::*;

/// Whether a reservation currently occupies inventory. Pending, confirmed and
/// checked-in always do. A tentative hold occupies inventory only until its
/// expiry instant — an expired-but-unswept hold stops counting immediately;
/// the sweep is bookkeeping. Terminal statuses never count.
pub fn counts_toward_capacity(reservation: &Reservation, now: DateTime<Utc>) -> bool {
    if reservation.status.is_active() {
        return true;
    }
    if reservation.status == ReservationStatus::Tentative {
        return reservation
            .tentative_expires_at
            .is_some_and(|expires| expires > now);
    }
    false
}

/// All inventory-occupying reservations on the type overlapping `range`,
/// optionally excluding one reservation (used when re-checking an existing
/// reservation's own dates).
pub fn overlapping_counting<'a>(
    state: &'a RoomTypeState,
    range: &StayRange,
    now: DateTime<Utc>,
    exclude: Option<Ulid>,
) -> Vec<&'a Reservation> {
    state
        .overlapping(range)
        .filter(|r| Some(r.id) != exclude && counts_toward_capacity(r, now))
        .collect()
}

/// Overlapping occupying reservations assigned to one specific room.
/// Exclusivity: a single hit makes the room unavailable, independent of the
/// pooled count.
pub fn room_conflicts<'a>(
    state: &'a RoomTypeState,
    room_id: Ulid,
    range: &StayRange,
    now: DateTime<Utc>,
    exclude: Option<Ulid>,
) -> Vec<&'a Reservation> {
    state
        .overlapping(range)
        .filter(|r| {
            r.room_id == Some(room_id) && Some(r.id) != exclude && counts_toward_capacity(r, now)
        })
        .collect()
}

/// Pooled check: one more overlapping reservation must still fit under
/// `total_inventory`.
pub fn pooled_has_space(
    state: &RoomTypeState,
    range: &StayRange,
    now: DateTime<Utc>,
    exclude: Option<Ulid>,
) -> bool {
    (overlapping_counting(state, range, now, exclude).len() as u32) < state.record.total_inventory
}

/// Peak number of simultaneously counting reservations across all dates,
/// via a sweep over check-in/check-out edges. At equal dates the check-out
/// edge is processed first, so back-to-back stays never stack. Inventory
/// shrinks are validated against this value.
pub fn peak_concurrent(state: &RoomTypeState, now: DateTime<Utc>) -> u32 {
    let mut edges: Vec<(chrono::NaiveDate, i32)> = Vec::new();
    for r in &state.reservations {
        if counts_toward_capacity(r, now) {
            edges.push((r.range.check_in, 1));
            edges.push((r.range.check_out, -1));
        }
    }
    edges.sort();

    let mut load = 0i32;
    let mut peak = 0i32;
    for (_, delta) in edges {
        load += delta;
        peak = peak.max(load);
    }
    peak as u32
}
