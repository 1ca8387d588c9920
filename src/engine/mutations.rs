use chrono::{DateTime, Duration, Utc};
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{self, ConflictDetail, Verdict};
use super::error::{EngineError, ValidationError};
use super::{Engine, blocks, capacity, pricing};

/// Shared input checks for room type create/update. Rates are bounded so the
/// pricing arithmetic stays far from i64 overflow; non-positive tier rates
/// are legal (they force-disable the tier) but `base_rate` must be a real
/// price.
fn validate_room_type_record(record: &RoomTypeRecord) -> Result<(), EngineError> {
    if record.name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("room type name too long"));
    }
    if record.total_inventory == 0 {
        return Err(EngineError::LimitExceeded("total_inventory must be positive"));
    }
    if record.base_rate <= 0 || record.base_rate > MAX_RATE {
        return Err(EngineError::LimitExceeded("base_rate out of range"));
    }
    for rate in [record.single_rate, record.double_rate, record.triple_rate]
        .into_iter()
        .flatten()
    {
        if rate > MAX_RATE {
            return Err(EngineError::LimitExceeded("occupancy rate above maximum"));
        }
    }
    if record.child_multiplier.is_some_and(|m| m > MAX_CHILD_MULTIPLIER) {
        return Err(EngineError::LimitExceeded("child_multiplier above maximum"));
    }
    Ok(())
}

fn validate_room_record(record: &IndividualRoomRecord) -> Result<(), EngineError> {
    if record.number.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("room number too long"));
    }
    if record.rate_override.is_some_and(|r| r > MAX_RATE) {
        return Err(EngineError::LimitExceeded("rate_override above maximum"));
    }
    if record
        .child_multiplier_override
        .is_some_and(|m| m > MAX_CHILD_MULTIPLIER)
    {
        return Err(EngineError::LimitExceeded("child_multiplier above maximum"));
    }
    Ok(())
}

impl Engine {
    // ── Inventory ────────────────────────────────────────

    pub async fn create_room_type(&self, record: RoomTypeRecord) -> Result<(), EngineError> {
        if self.state.len() >= MAX_ROOM_TYPES {
            return Err(EngineError::LimitExceeded("too many room types"));
        }
        validate_room_type_record(&record)?;

        // Claim the slot atomically; the entry guard must not be held across
        // the WAL await, so the claim is rolled back if the append fails.
        match self.state.entry(record.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(EngineError::AlreadyExists(record.id));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(std::sync::Arc::new(tokio::sync::RwLock::new(
                    RoomTypeState::new(record.clone()),
                )));
            }
        }

        let event = Event::RoomTypeCreated { record: record.clone() };
        if let Err(e) = self.wal_append(&event).await {
            self.state.remove(&record.id);
            return Err(e);
        }
        self.notify.send(record.id, &event);
        Ok(())
    }

    /// Shrinking `total_inventory` is refused below the peak committed
    /// reservation load, so the pooled-capacity invariant survives updates.
    pub async fn update_room_type(
        &self,
        record: RoomTypeRecord,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        validate_room_type_record(&record)?;
        let rs = self
            .get_room_type(&record.id)
            .ok_or(EngineError::NotFound(record.id))?;
        let mut guard = rs.write().await;

        if record.total_inventory < guard.record.total_inventory {
            let committed = capacity::peak_concurrent(&guard, now);
            if record.total_inventory < committed {
                return Err(EngineError::InventoryBelowCommitted {
                    committed,
                    requested: record.total_inventory,
                });
            }
        }

        let event = Event::RoomTypeUpdated { record };
        self.persist_and_apply(guard.record.id, &mut guard, &event).await
    }

    pub async fn create_room(&self, record: IndividualRoomRecord) -> Result<(), EngineError> {
        validate_room_record(&record)?;
        if self.entity_to_type.contains_key(&record.id) {
            return Err(EngineError::AlreadyExists(record.id));
        }
        let rs = self
            .get_room_type(&record.room_type_id)
            .ok_or(EngineError::NotFound(record.room_type_id))?;
        let mut guard = rs.write().await;
        if guard.rooms.len() >= MAX_ROOMS_PER_TYPE {
            return Err(EngineError::LimitExceeded("too many rooms on room type"));
        }

        let event = Event::RoomCreated { record };
        self.persist_and_apply(guard.record.id, &mut guard, &event).await
    }

    pub async fn update_room(&self, record: IndividualRoomRecord) -> Result<(), EngineError> {
        validate_room_record(&record)?;
        let (type_id, mut guard) = self.resolve_entity_write(&record.id).await?;
        // Rooms never move between types
        if type_id != record.room_type_id || !guard.rooms.contains_key(&record.id) {
            return Err(ValidationError::RoomNotInType {
                room_id: record.id,
                room_type_id: record.room_type_id,
            }
            .into());
        }

        let event = Event::RoomUpdated { record };
        self.persist_and_apply(type_id, &mut guard, &event).await
    }

    // ── Calendar blockers ────────────────────────────────

    pub async fn add_date_block(&self, block: DateBlock) -> Result<(), EngineError> {
        if block.range.nights() <= 0 {
            return Err(ValidationError::CheckOutNotAfterCheckIn.into());
        }
        if block.reason.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("block reason too long"));
        }

        match block.scope {
            BlockScope::Global => {
                let mut global = self.global_blocks.write().await;
                if global.len() >= MAX_BLOCKS_PER_TYPE {
                    return Err(EngineError::LimitExceeded("too many global blocks"));
                }
                let event = Event::DateBlockAdded { block: block.clone() };
                self.wal_append(&event).await?;
                global.push(block);
                Ok(())
            }
            BlockScope::RoomType(type_id) | BlockScope::Room { room_type_id: type_id, .. } => {
                let rs = self
                    .get_room_type(&type_id)
                    .ok_or(EngineError::NotFound(type_id))?;
                let mut guard = rs.write().await;
                if guard.blocks.len() >= MAX_BLOCKS_PER_TYPE {
                    return Err(EngineError::LimitExceeded("too many blocks on room type"));
                }
                if let BlockScope::Room { room_id, .. } = block.scope
                    && !guard.rooms.contains_key(&room_id)
                {
                    return Err(ValidationError::RoomNotInType {
                        room_id,
                        room_type_id: type_id,
                    }
                    .into());
                }

                let event = Event::DateBlockAdded { block };
                self.persist_and_apply(type_id, &mut guard, &event).await
            }
        }
    }

    pub async fn remove_date_block(&self, id: Ulid) -> Result<(), EngineError> {
        if let Some(type_id) = self.room_type_for_entity(&id) {
            let rs = self
                .get_room_type(&type_id)
                .ok_or(EngineError::NotFound(type_id))?;
            let mut guard = rs.write().await;
            let block = guard
                .blocks
                .iter()
                .find(|b| b.id == id)
                .ok_or(EngineError::NotFound(id))?;
            let event = Event::DateBlockRemoved { id, scope: block.scope };
            return self.persist_and_apply(type_id, &mut guard, &event).await;
        }

        // Not unit-scoped; try the global list
        let mut global = self.global_blocks.write().await;
        if !global.iter().any(|b| b.id == id) {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::DateBlockRemoved {
            id,
            scope: BlockScope::Global,
        };
        self.wal_append(&event).await?;
        global.retain(|b| b.id != id);
        Ok(())
    }

    pub async fn schedule_maintenance(&self, window: MaintenanceWindow) -> Result<(), EngineError> {
        if window.range.nights() <= 0 {
            return Err(ValidationError::CheckOutNotAfterCheckIn.into());
        }
        let rs = self
            .get_room_type(&window.room_type_id)
            .ok_or(EngineError::NotFound(window.room_type_id))?;
        let mut guard = rs.write().await;
        if !guard.rooms.contains_key(&window.room_id) {
            return Err(ValidationError::RoomNotInType {
                room_id: window.room_id,
                room_type_id: window.room_type_id,
            }
            .into());
        }

        let type_id = window.room_type_id;
        let event = Event::MaintenanceScheduled { window };
        self.persist_and_apply(type_id, &mut guard, &event).await
    }

    pub async fn set_maintenance_status(
        &self,
        id: Ulid,
        status: MaintenanceStatus,
    ) -> Result<(), EngineError> {
        let (type_id, mut guard) = self.resolve_entity_write(&id).await?;
        if !guard.maintenance.iter().any(|w| w.id == id) {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::MaintenanceStatusChanged {
            id,
            room_type_id: type_id,
            status,
        };
        self.persist_and_apply(type_id, &mut guard, &event).await
    }

    pub async fn log_housekeeping(&self, hold: HousekeepingHold) -> Result<(), EngineError> {
        let rs = self
            .get_room_type(&hold.room_type_id)
            .ok_or(EngineError::NotFound(hold.room_type_id))?;
        let mut guard = rs.write().await;
        if !guard.rooms.contains_key(&hold.room_id) {
            return Err(ValidationError::RoomNotInType {
                room_id: hold.room_id,
                room_type_id: hold.room_type_id,
            }
            .into());
        }

        let type_id = hold.room_type_id;
        let event = Event::HousekeepingLogged { hold };
        self.persist_and_apply(type_id, &mut guard, &event).await
    }

    pub async fn set_housekeeping_status(
        &self,
        id: Ulid,
        status: HousekeepingStatus,
    ) -> Result<(), EngineError> {
        let (type_id, mut guard) = self.resolve_entity_write(&id).await?;
        if !guard.housekeeping.iter().any(|h| h.id == id) {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::HousekeepingStatusChanged {
            id,
            room_type_id: type_id,
            status,
        };
        self.persist_and_apply(type_id, &mut guard, &event).await
    }

    // ── Reservations ─────────────────────────────────────

    /// Create a reservation (or a tentative hold). The write guard on the
    /// room type is held from the conflict check through the WAL commit, so
    /// two concurrent requests can never both observe "available" and both
    /// commit.
    pub async fn create_reservation(
        &self,
        request: ReservationRequest,
        now: DateTime<Utc>,
    ) -> Result<Reservation, EngineError> {
        if request.guest_name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("guest name too long"));
        }
        let type_id = request.target.room_type_id();
        let rs = self
            .get_room_type(&type_id)
            .ok_or(EngineError::NotFound(type_id))?;
        let mut guard = rs.write().await;
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_TYPE {
            return Err(EngineError::LimitExceeded("too many reservations on room type"));
        }

        let global = self.global_blocks.read().await.clone();
        let verdict = conflict::check_request(
            &guard,
            &global,
            &request.target,
            &request.range,
            request.guests,
            None,
            now,
            &self.config,
        )?;
        if !verdict.available {
            metrics::counter!(crate::observability::RESERVATIONS_CONFLICTED_TOTAL).increment(1);
            return Err(EngineError::Unavailable(Box::new(verdict)));
        }

        let room = request.target.room_id().and_then(|id| guard.rooms.get(&id));
        let price = pricing::quote(
            &guard.record,
            room,
            request.occupancy,
            request.guests,
            request.range.nights(),
            &self.config,
        )?;

        let id = Ulid::new();
        let reference = self.claim_reference(id)?;
        let (status, tentative_expires_at) = if request.tentative {
            (
                ReservationStatus::Tentative,
                Some(now + Duration::hours(self.config.tentative_hold_hours)),
            )
        } else {
            (ReservationStatus::Pending, None)
        };

        let reservation = Reservation {
            id,
            reference: reference.clone(),
            room_type_id: type_id,
            room_id: request.target.room_id(),
            guest_name: request.guest_name,
            range: request.range,
            guests: request.guests,
            occupancy: request.occupancy,
            status,
            tentative_expires_at,
            price,
        };

        let event = Event::ReservationCreated {
            reservation: reservation.clone(),
        };
        if let Err(e) = self.persist_and_apply(type_id, &mut guard, &event).await {
            // Release the claimed reference; nothing was committed.
            self.references.remove(&reference);
            return Err(e);
        }

        let kind = if request.tentative { "tentative" } else { "pending" };
        metrics::counter!(crate::observability::RESERVATIONS_CREATED_TOTAL, "kind" => kind)
            .increment(1);
        info!(
            "created {kind} reservation {reference} for {} nights",
            reservation.range.nights()
        );
        Ok(reservation)
    }

    /// Bounded check-then-create loop for the human-readable reference.
    /// Claims the reference in the index immediately so a concurrent create
    /// cannot pick the same one; the caller releases it on commit failure.
    fn claim_reference(&self, reservation_id: Ulid) -> Result<String, EngineError> {
        for _ in 0..self.config.reference_attempts {
            // Last 8 chars of a fresh ULID: the random tail, Crockford base32.
            let ulid = Ulid::new().to_string();
            let candidate = format!("BK-{}", &ulid[18..26]);
            match self.references.entry(candidate.clone()) {
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(reservation_id);
                    return Ok(candidate);
                }
            }
        }
        Err(EngineError::ReferenceExhausted {
            attempts: self.config.reference_attempts,
        })
    }

    /// Move a reservation to a specific room, re-validating the room's
    /// availability for the existing date range and recomputing the price
    /// with the room's overrides. Assignment and reprice commit as one event.
    pub async fn assign_individual_room(
        &self,
        reservation_id: Ulid,
        room_id: Ulid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, EngineError> {
        let (type_id, mut guard) = self.resolve_entity_write(&reservation_id).await?;
        let reservation = guard
            .reservation(reservation_id)
            .ok_or(EngineError::NotFound(reservation_id))?
            .clone();
        if reservation.status.is_terminal() {
            return Err(EngineError::InvalidTransition {
                id: reservation_id,
                from: reservation.status,
                to: reservation.status,
            });
        }

        let room = guard.rooms.get(&room_id).ok_or(EngineError::Validation(
            ValidationError::RoomNotInType {
                room_id,
                room_type_id: type_id,
            },
        ))?;
        if room.status == RoomStatus::OutOfService {
            return Err(ValidationError::RoomOutOfService(room_id).into());
        }

        let global = self.global_blocks.read().await.clone();
        let block_reasons = blocks::block_reasons(&guard, &global, Some(room_id), &reservation.range);
        let conflicting =
            capacity::room_conflicts(&guard, room_id, &reservation.range, now, Some(reservation_id));
        if !block_reasons.is_empty() || !conflicting.is_empty() {
            metrics::counter!(crate::observability::RESERVATIONS_CONFLICTED_TOTAL).increment(1);
            return Err(EngineError::Unavailable(Box::new(Verdict {
                available: false,
                conflicts: conflicting
                    .iter()
                    .map(|r| ConflictDetail::from_reservation(r))
                    .collect(),
                block_reasons,
                max_guests: guard.record.max_guests,
                nights: reservation.range.nights(),
            })));
        }

        let price = pricing::quote(
            &guard.record,
            guard.rooms.get(&room_id),
            reservation.occupancy,
            reservation.guests,
            reservation.range.nights(),
            &self.config,
        )?;

        let event = Event::RoomAssigned {
            reservation_id,
            room_type_id: type_id,
            room_id,
            price,
        };
        self.persist_and_apply(type_id, &mut guard, &event).await?;

        metrics::counter!(crate::observability::ROOMS_ASSIGNED_TOTAL).increment(1);
        info!("assigned room to reservation {}", reservation.reference);
        Ok(guard
            .reservation(reservation_id)
            .cloned()
            .ok_or(EngineError::NotFound(reservation_id))?)
    }

    /// Guarded lifecycle transitions for non-tentative reservations.
    /// Tentative holds move only through the hold operations.
    pub async fn update_reservation_status(
        &self,
        reservation_id: Ulid,
        to: ReservationStatus,
    ) -> Result<Reservation, EngineError> {
        let (type_id, mut guard) = self.resolve_entity_write(&reservation_id).await?;
        let from = guard
            .reservation(reservation_id)
            .ok_or(EngineError::NotFound(reservation_id))?
            .status;

        use ReservationStatus::*;
        let allowed = matches!(
            (from, to),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, CheckedIn)
                | (Confirmed, Cancelled)
                | (CheckedIn, CheckedOut)
        );
        if !allowed {
            return Err(EngineError::InvalidTransition {
                id: reservation_id,
                from,
                to,
            });
        }

        let event = Event::ReservationStatusChanged {
            id: reservation_id,
            room_type_id: type_id,
            status: to,
        };
        self.persist_and_apply(type_id, &mut guard, &event).await?;
        Ok(guard
            .reservation(reservation_id)
            .cloned()
            .ok_or(EngineError::NotFound(reservation_id))?)
    }
}
