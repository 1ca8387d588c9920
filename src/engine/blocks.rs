//! Calendar blocker registry: date blocks, maintenance windows and
//! housekeeping holds unified into one "is this unit blocked" predicate.

use chrono::NaiveDate;
use serde::Serialize;
use ulid::Ulid;

use crate::model::*;

/// One concrete reason a unit is blocked on a range. The registry returns
/// every matching reason, not just the first, so callers can render a full
/// explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BlockReason {
    DateBlock {
        id: Ulid,
        scope: BlockScope,
        range: StayRange,
        reason: String,
    },
    Maintenance {
        id: Ulid,
        room_id: Ulid,
        range: StayRange,
        status: MaintenanceStatus,
    },
    Housekeeping {
        id: Ulid,
        room_id: Ulid,
        due: NaiveDate,
        status: HousekeepingStatus,
    },
}

fn scope_applies(scope: &BlockScope, type_id: Ulid, room: Option<Ulid>) -> bool {
    match scope {
        BlockScope::Global => true,
        BlockScope::RoomType(id) => *id == type_id,
        BlockScope::Room { room_id, .. } => Some(*room_id) == room,
    }
}

/// Collect every blocker intersecting `range` for the pooled type (`room`
/// None) or one specific room. Maintenance and housekeeping are room-scoped
/// and never block the pool as a whole. Pure read, no side effects.
pub fn block_reasons(
    state: &RoomTypeState,
    global_blocks: &[DateBlock],
    room: Option<Ulid>,
    range: &StayRange,
) -> Vec<BlockReason> {
    let type_id = state.record.id;
    let mut reasons = Vec::new();

    for block in global_blocks.iter().chain(state.blocks.iter()) {
        if scope_applies(&block.scope, type_id, room) && block.range.overlaps(range) {
            reasons.push(BlockReason::DateBlock {
                id: block.id,
                scope: block.scope,
                range: block.range,
                reason: block.reason.clone(),
            });
        }
    }

    if let Some(room_id) = room {
        for window in &state.maintenance {
            if window.room_id == room_id && window.participates() && window.range.overlaps(range) {
                reasons.push(BlockReason::Maintenance {
                    id: window.id,
                    room_id,
                    range: window.range,
                    status: window.status,
                });
            }
        }
        for hold in &state.housekeeping {
            if hold.room_id == room_id
                && hold.participates()
                && StayRange::single_day(hold.due).overlaps(range)
            {
                reasons.push(BlockReason::Housekeeping {
                    id: hold.id,
                    room_id,
                    due: hold.due,
                    status: hold.status,
                });
            }
        }
    }

    reasons
}

/// Convenience predicate over `block_reasons`.
pub fn is_blocked(
    state: &RoomTypeState,
    global_blocks: &[DateBlock],
    room: Option<Ulid>,
    range: &StayRange,
) -> bool {
    !block_reasons(state, global_blocks, room, range).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn range(a: (i32, u32, u32), b: (i32, u32, u32)) -> StayRange {
        StayRange::new(d(a.0, a.1, a.2), d(b.0, b.1, b.2))
    }

    fn state() -> RoomTypeState {
        RoomTypeState::new(RoomTypeRecord {
            id: Ulid::new(),
            name: "Suite".into(),
            total_inventory: 2,
            max_guests: 3,
            base_rate: 20_000,
            single_rate: None,
            double_rate: Some(20_000),
            triple_rate: Some(25_000),
            single_enabled: true,
            double_enabled: true,
            triple_enabled: true,
            children_allowed: true,
            child_multiplier: None,
        })
    }

    fn date_block(scope: BlockScope, r: StayRange) -> DateBlock {
        DateBlock {
            id: Ulid::new(),
            scope,
            range: r,
            reason: "blocked".into(),
        }
    }

    #[test]
    fn type_scoped_block_hits_pool_and_room() {
        let mut s = state();
        let type_id = s.record.id;
        let room_id = Ulid::new();
        s.blocks.push(date_block(
            BlockScope::RoomType(type_id),
            range((2026, 6, 1), (2026, 6, 5)),
        ));

        let query = range((2026, 6, 3), (2026, 6, 7));
        assert!(is_blocked(&s, &[], None, &query));
        assert!(is_blocked(&s, &[], Some(room_id), &query));

        // Touching ranges don't intersect
        let adjacent = range((2026, 6, 5), (2026, 6, 8));
        assert!(!is_blocked(&s, &[], None, &adjacent));
    }

    #[test]
    fn global_block_applies_everywhere() {
        let s = state();
        let global = vec![date_block(BlockScope::Global, range((2026, 12, 24), (2026, 12, 27)))];
        let query = range((2026, 12, 26), (2026, 12, 30));
        assert!(is_blocked(&s, &global, None, &query));
        assert!(is_blocked(&s, &global, Some(Ulid::new()), &query));
    }

    #[test]
    fn room_scoped_block_does_not_hit_pool() {
        let mut s = state();
        let type_id = s.record.id;
        let room_id = Ulid::new();
        s.blocks.push(date_block(
            BlockScope::Room {
                room_type_id: type_id,
                room_id,
            },
            range((2026, 6, 1), (2026, 6, 5)),
        ));

        let query = range((2026, 6, 2), (2026, 6, 4));
        assert!(!is_blocked(&s, &[], None, &query));
        assert!(is_blocked(&s, &[], Some(room_id), &query));
        assert!(!is_blocked(&s, &[], Some(Ulid::new()), &query));
    }

    #[test]
    fn maintenance_blocks_only_when_participating() {
        let mut s = state();
        let room_id = Ulid::new();
        s.maintenance.push(MaintenanceWindow {
            id: Ulid::new(),
            room_type_id: s.record.id,
            room_id,
            range: range((2026, 4, 1), (2026, 4, 10)),
            blocking: true,
            status: MaintenanceStatus::Planned,
        });

        let query = range((2026, 4, 5), (2026, 4, 8));
        assert!(is_blocked(&s, &[], Some(room_id), &query));
        // The pool is not affected by per-room maintenance
        assert!(!is_blocked(&s, &[], None, &query));

        s.maintenance[0].status = MaintenanceStatus::Cancelled;
        assert!(!is_blocked(&s, &[], Some(room_id), &query));

        s.maintenance[0].status = MaintenanceStatus::InProgress;
        s.maintenance[0].blocking = false;
        assert!(!is_blocked(&s, &[], Some(room_id), &query));
    }

    #[test]
    fn housekeeping_blocks_its_due_date() {
        let mut s = state();
        let room_id = Ulid::new();
        s.housekeeping.push(HousekeepingHold {
            id: Ulid::new(),
            room_type_id: s.record.id,
            room_id,
            due: d(2026, 5, 10),
            status: HousekeepingStatus::Pending,
        });

        assert!(is_blocked(&s, &[], Some(room_id), &range((2026, 5, 10), (2026, 5, 12))));
        // Due date is the night of the 10th only; a stay starting on the 11th is clear
        assert!(!is_blocked(&s, &[], Some(room_id), &range((2026, 5, 11), (2026, 5, 13))));

        s.housekeeping[0].status = HousekeepingStatus::Verified;
        assert!(!is_blocked(&s, &[], Some(room_id), &range((2026, 5, 10), (2026, 5, 12))));
    }

    #[test]
    fn all_matching_reasons_are_reported() {
        let mut s = state();
        let type_id = s.record.id;
        let room_id = Ulid::new();
        s.blocks.push(date_block(
            BlockScope::RoomType(type_id),
            range((2026, 6, 1), (2026, 6, 5)),
        ));
        s.maintenance.push(MaintenanceWindow {
            id: Ulid::new(),
            room_type_id: type_id,
            room_id,
            range: range((2026, 6, 2), (2026, 6, 6)),
            blocking: true,
            status: MaintenanceStatus::InProgress,
        });
        s.housekeeping.push(HousekeepingHold {
            id: Ulid::new(),
            room_type_id: type_id,
            room_id,
            due: d(2026, 6, 3),
            status: HousekeepingStatus::Blocked,
        });

        let reasons = block_reasons(&s, &[], Some(room_id), &range((2026, 6, 2), (2026, 6, 4)));
        assert_eq!(reasons.len(), 3);
    }
}
