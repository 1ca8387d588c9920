//! Occupancy pricing resolver: nightly rate, tier enablement and the child
//! supplement, with the room → room type → default override hierarchy.

use crate::config::EngineConfig;
use crate::model::*;

use super::error::ValidationError;

fn tier_rate(rt: &RoomTypeRecord, occupancy: OccupancyType) -> Option<i64> {
    match occupancy {
        OccupancyType::Single => rt.single_rate,
        OccupancyType::Double => rt.double_rate,
        OccupancyType::Triple => rt.triple_rate,
    }
}

fn tier_flag(rt: &RoomTypeRecord, occupancy: OccupancyType) -> bool {
    match occupancy {
        OccupancyType::Single => rt.single_enabled,
        OccupancyType::Double => rt.double_enabled,
        OccupancyType::Triple => rt.triple_enabled,
    }
}

fn tier_override(room: &IndividualRoomRecord, occupancy: OccupancyType) -> Option<bool> {
    match occupancy {
        OccupancyType::Single => room.single_override,
        OccupancyType::Double => room.double_override,
        OccupancyType::Triple => room.triple_override,
    }
}

/// Effective enablement of an occupancy tier. Three layers merge:
/// capacity (the unit must physically sleep that many guests), the tier
/// price (a missing or non-positive double/triple rate on the RoomType
/// force-disables the tier regardless of any flag or override), and the
/// flag hierarchy (room tri-state override, else the RoomType flag).
pub fn effective_occupancy_enabled(
    rt: &RoomTypeRecord,
    room: Option<&IndividualRoomRecord>,
    occupancy: OccupancyType,
) -> bool {
    if rt.max_guests < occupancy.required_guests() {
        return false;
    }
    if matches!(occupancy, OccupancyType::Double | OccupancyType::Triple)
        && tier_rate(rt, occupancy).is_none_or(|r| r <= 0)
    {
        return false;
    }
    room.and_then(|r| tier_override(r, occupancy))
        .unwrap_or_else(|| tier_flag(rt, occupancy))
}

/// Nightly rate resolution: room override (only if positive) → RoomType
/// per-occupancy rate (if positive) → RoomType base rate.
pub fn effective_nightly_rate(
    rt: &RoomTypeRecord,
    room: Option<&IndividualRoomRecord>,
    occupancy: OccupancyType,
) -> Result<i64, ValidationError> {
    if !effective_occupancy_enabled(rt, room, occupancy) {
        return Err(ValidationError::OccupancyDisabled(occupancy));
    }
    if let Some(rate) = room.and_then(|r| r.rate_override)
        && rate > 0
    {
        return Ok(rate);
    }
    if let Some(rate) = tier_rate(rt, occupancy)
        && rate > 0
    {
        return Ok(rate);
    }
    Ok(rt.base_rate)
}

pub fn effective_children_allowed(
    rt: &RoomTypeRecord,
    room: Option<&IndividualRoomRecord>,
) -> bool {
    room.and_then(|r| r.children_allowed_override)
        .unwrap_or(rt.children_allowed)
}

/// Child supplement percentage: room override → RoomType value → config
/// default.
pub fn effective_child_multiplier(
    rt: &RoomTypeRecord,
    room: Option<&IndividualRoomRecord>,
    config: &EngineConfig,
) -> u32 {
    room.and_then(|r| r.child_multiplier_override)
        .or(rt.child_multiplier)
        .unwrap_or(config.default_child_multiplier)
}

/// Price a stay. Validates guest composition against the effective policy and
/// returns the full breakdown:
/// `total = rate × nights + rate × (multiplier/100) × children × nights`.
pub fn quote(
    rt: &RoomTypeRecord,
    room: Option<&IndividualRoomRecord>,
    occupancy: OccupancyType,
    guests: GuestCounts,
    nights: i64,
    config: &EngineConfig,
) -> Result<PriceBreakdown, ValidationError> {
    if guests.adults == 0 {
        return Err(ValidationError::NoAdults);
    }
    if guests.children > 0 && !effective_children_allowed(rt, room) {
        return Err(ValidationError::ChildrenNotAllowed);
    }

    let nightly_rate = effective_nightly_rate(rt, room, occupancy)?;
    let multiplier = effective_child_multiplier(rt, room, config) as i64;

    // Inputs are bounded at mutation entry, but quote is also a public read
    // on arbitrary guest counts, so the arithmetic stays checked.
    let room_total = nightly_rate
        .checked_mul(nights)
        .ok_or(ValidationError::PriceOverflow)?;
    let child_supplement = nightly_rate
        .checked_mul(multiplier)
        .and_then(|v| v.checked_mul(guests.children as i64))
        .and_then(|v| v.checked_mul(nights))
        .ok_or(ValidationError::PriceOverflow)?
        / 100;
    let total = room_total
        .checked_add(child_supplement)
        .ok_or(ValidationError::PriceOverflow)?;

    Ok(PriceBreakdown {
        nightly_rate,
        nights,
        room_total,
        child_supplement,
        total,
        currency: config.currency.clone(),
    })
}
