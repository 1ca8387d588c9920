//! Read-side API: availability checks, lookups and listings. Everything here
//! takes read locks only.

use chrono::{DateTime, NaiveDate, Utc};
use ulid::Ulid;

use crate::model::*;
use crate::observability;

use super::error::EngineError;
use super::{Engine, blocks, capacity, conflict};

impl Engine {
    /// Availability pre-check: the same routine the writer runs, minus the
    /// commit. A positive verdict is advisory — the writer re-checks under
    /// the write lock. `exclude` skips one reservation, for re-checking an
    /// existing booking's own dates.
    pub async fn check_availability(
        &self,
        target: &ReservationTarget,
        range: &StayRange,
        guests: GuestCounts,
        exclude: Option<Ulid>,
        now: DateTime<Utc>,
    ) -> Result<conflict::Verdict, EngineError> {
        metrics::counter!(observability::AVAILABILITY_CHECKS_TOTAL).increment(1);

        let type_id = target.room_type_id();
        let rs = self
            .get_room_type(&type_id)
            .ok_or(EngineError::NotFound(type_id))?;
        let guard = rs.read().await;
        let global = self.global_blocks.read().await;
        conflict::check_request(&guard, &global, target, range, guests, exclude, now, &self.config)
    }

    /// Price a prospective stay without creating anything.
    pub async fn quote_stay(
        &self,
        target: &ReservationTarget,
        range: &StayRange,
        guests: GuestCounts,
        occupancy: OccupancyType,
    ) -> Result<PriceBreakdown, EngineError> {
        let type_id = target.room_type_id();
        let rs = self
            .get_room_type(&type_id)
            .ok_or(EngineError::NotFound(type_id))?;
        let guard = rs.read().await;
        let room = target.room_id().and_then(|id| guard.rooms.get(&id));
        Ok(super::pricing::quote(
            &guard.record,
            room,
            occupancy,
            guests,
            range.nights(),
            &self.config,
        )?)
    }

    pub async fn get_reservation(&self, id: Ulid) -> Option<Reservation> {
        let type_id = self.room_type_for_entity(&id)?;
        let rs = self.get_room_type(&type_id)?;
        let guard = rs.read().await;
        guard.reservation(id).cloned()
    }

    pub async fn find_by_reference(&self, reference: &str) -> Option<Reservation> {
        let id = *self.references.get(reference)?.value();
        self.get_reservation(id).await
    }

    pub async fn list_room_types(&self) -> Vec<RoomTypeRecord> {
        let mut records = Vec::with_capacity(self.state.len());
        let type_ids: Vec<Ulid> = self.state.iter().map(|e| *e.key()).collect();
        for id in type_ids {
            if let Some(rs) = self.get_room_type(&id) {
                records.push(rs.read().await.record.clone());
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    pub async fn get_room_type_record(&self, id: Ulid) -> Option<RoomTypeRecord> {
        let rs = self.get_room_type(&id)?;
        let guard = rs.read().await;
        Some(guard.record.clone())
    }

    pub async fn list_rooms(&self, room_type_id: Ulid) -> Result<Vec<IndividualRoomRecord>, EngineError> {
        let rs = self
            .get_room_type(&room_type_id)
            .ok_or(EngineError::NotFound(room_type_id))?;
        let guard = rs.read().await;
        let mut rooms: Vec<_> = guard.rooms.values().cloned().collect();
        rooms.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(rooms)
    }

    /// Reservations on a type, sorted by check-in date. An optional range
    /// narrows to overlapping stays only.
    pub async fn list_reservations(
        &self,
        room_type_id: Ulid,
        range: Option<&StayRange>,
    ) -> Result<Vec<Reservation>, EngineError> {
        let rs = self
            .get_room_type(&room_type_id)
            .ok_or(EngineError::NotFound(room_type_id))?;
        let guard = rs.read().await;
        Ok(match range {
            Some(range) => guard.overlapping(range).cloned().collect(),
            None => guard.reservations.clone(),
        })
    }

    pub async fn list_blocks(&self, room_type_id: Ulid) -> Result<Vec<DateBlock>, EngineError> {
        let rs = self
            .get_room_type(&room_type_id)
            .ok_or(EngineError::NotFound(room_type_id))?;
        let guard = rs.read().await;
        Ok(guard.blocks.clone())
    }

    pub async fn list_global_blocks(&self) -> Vec<DateBlock> {
        self.global_blocks.read().await.clone()
    }

    pub async fn list_maintenance(
        &self,
        room_type_id: Ulid,
    ) -> Result<Vec<MaintenanceWindow>, EngineError> {
        let rs = self
            .get_room_type(&room_type_id)
            .ok_or(EngineError::NotFound(room_type_id))?;
        let guard = rs.read().await;
        Ok(guard.maintenance.clone())
    }

    pub async fn list_housekeeping(
        &self,
        room_type_id: Ulid,
    ) -> Result<Vec<HousekeepingHold>, EngineError> {
        let rs = self
            .get_room_type(&room_type_id)
            .ok_or(EngineError::NotFound(room_type_id))?;
        let guard = rs.read().await;
        Ok(guard.housekeeping.clone())
    }

    /// All blocker reasons intersecting a range, for calendar display.
    pub async fn blockers_for_range(
        &self,
        room_type_id: Ulid,
        room_id: Option<Ulid>,
        range: &StayRange,
    ) -> Result<Vec<blocks::BlockReason>, EngineError> {
        let rs = self
            .get_room_type(&room_type_id)
            .ok_or(EngineError::NotFound(room_type_id))?;
        let guard = rs.read().await;
        let global = self.global_blocks.read().await;
        Ok(blocks::block_reasons(&guard, &global, room_id, range))
    }

    /// Per-day occupancy over a date range: (date, occupied, total_inventory)
    /// for each night in `[from, to)`.
    pub async fn occupancy_for_range(
        &self,
        room_type_id: Ulid,
        range: &StayRange,
        now: DateTime<Utc>,
    ) -> Result<Vec<(NaiveDate, u32, u32)>, EngineError> {
        let rs = self
            .get_room_type(&room_type_id)
            .ok_or(EngineError::NotFound(room_type_id))?;
        let guard = rs.read().await;
        let total = guard.record.total_inventory;

        let overlapping = capacity::overlapping_counting(&guard, range, now, None);
        let mut out = Vec::with_capacity(range.nights().max(0) as usize);
        let mut day = range.check_in;
        while day < range.check_out {
            let occupied = overlapping
                .iter()
                .filter(|r| r.range.contains_day(day))
                .count() as u32;
            out.push((day, occupied, total));
            let Some(next) = day.succ_opt() else { break };
            day = next;
        }
        Ok(out)
    }
}
