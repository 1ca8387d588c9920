mod blocks;
mod capacity;
mod conflict;
mod error;
mod holds;
mod mutations;
mod pricing;
mod queries;

pub use blocks::{BlockReason, block_reasons, is_blocked};
pub use capacity::counts_toward_capacity;
pub use conflict::{ConflictDetail, Verdict};
pub use error::{EngineError, ValidationError};
pub use pricing::{
    effective_child_multiplier, effective_children_allowed, effective_nightly_rate,
    effective_occupancy_enabled, quote,
};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::config::EngineConfig;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedRoomTypeState = Arc<RwLock<RoomTypeState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

// ── Engine ───────────────────────────────────────────────

pub struct Engine {
    pub state: DashMap<Ulid, SharedRoomTypeState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    /// Reverse lookup: entity (room/block/window/hold/reservation) id →
    /// room type id.
    pub(super) entity_to_type: DashMap<Ulid, Ulid>,
    /// Reservation references, kept unique by check-then-create.
    pub(super) references: DashMap<String, Ulid>,
    /// Property-wide date blocks, outside any one room type's lock.
    pub(super) global_blocks: RwLock<Vec<DateBlock>>,
    pub(super) config: EngineConfig,
}

/// Apply an event directly to a RoomTypeState (no locking — caller holds the
/// lock). Global-scope and RoomTypeCreated events are handled at the Engine
/// level, not here.
fn apply_to_state(
    state: &mut RoomTypeState,
    event: &Event,
    entity_map: &DashMap<Ulid, Ulid>,
    references: &DashMap<String, Ulid>,
) {
    match event {
        Event::RoomTypeUpdated { record } => {
            state.record = record.clone();
        }
        Event::RoomCreated { record } | Event::RoomUpdated { record } => {
            entity_map.insert(record.id, record.room_type_id);
            state.rooms.insert(record.id, record.clone());
        }
        Event::DateBlockAdded { block } => {
            entity_map.insert(block.id, state.record.id);
            state.blocks.push(block.clone());
        }
        Event::DateBlockRemoved { id, .. } => {
            state.blocks.retain(|b| b.id != *id);
            entity_map.remove(id);
        }
        Event::MaintenanceScheduled { window } => {
            entity_map.insert(window.id, window.room_type_id);
            state.maintenance.push(window.clone());
        }
        Event::MaintenanceStatusChanged { id, status, .. } => {
            if let Some(w) = state.maintenance.iter_mut().find(|w| w.id == *id) {
                w.status = *status;
            }
        }
        Event::HousekeepingLogged { hold } => {
            entity_map.insert(hold.id, hold.room_type_id);
            state.housekeeping.push(hold.clone());
        }
        Event::HousekeepingStatusChanged { id, status, .. } => {
            if let Some(h) = state.housekeeping.iter_mut().find(|h| h.id == *id) {
                h.status = *status;
            }
        }
        Event::ReservationCreated { reservation } => {
            entity_map.insert(reservation.id, reservation.room_type_id);
            references.insert(reservation.reference.clone(), reservation.id);
            state.insert_reservation(reservation.clone());
        }
        Event::ReservationStatusChanged { id, status, .. } => {
            if let Some(r) = state.reservation_mut(*id) {
                r.status = *status;
            }
        }
        Event::RoomAssigned {
            reservation_id,
            room_id,
            price,
            ..
        } => {
            if let Some(r) = state.reservation_mut(*reservation_id) {
                r.room_id = Some(*room_id);
                r.price = price.clone();
            }
        }
        // Handled at the DashMap / global-block level
        Event::RoomTypeCreated { .. } => {}
    }
}

/// Extract the routing room_type_id from an event. None means the event is
/// handled at the Engine level (type creation, global blocks).
fn event_room_type_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::RoomTypeCreated { .. } => None,
        Event::RoomTypeUpdated { record } => Some(record.id),
        Event::RoomCreated { record } | Event::RoomUpdated { record } => Some(record.room_type_id),
        Event::DateBlockAdded { block } => match block.scope {
            BlockScope::Global => None,
            BlockScope::RoomType(id) => Some(id),
            BlockScope::Room { room_type_id, .. } => Some(room_type_id),
        },
        Event::DateBlockRemoved { scope, .. } => match scope {
            BlockScope::Global => None,
            BlockScope::RoomType(id) => Some(*id),
            BlockScope::Room { room_type_id, .. } => Some(*room_type_id),
        },
        Event::MaintenanceScheduled { window } => Some(window.room_type_id),
        Event::MaintenanceStatusChanged { room_type_id, .. } => Some(*room_type_id),
        Event::HousekeepingLogged { hold } => Some(hold.room_type_id),
        Event::HousekeepingStatusChanged { room_type_id, .. } => Some(*room_type_id),
        Event::ReservationCreated { reservation } => Some(reservation.room_type_id),
        Event::ReservationStatusChanged { room_type_id, .. } => Some(*room_type_id),
        Event::RoomAssigned { room_type_id, .. } => Some(*room_type_id),
    }
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        notify: Arc<NotifyHub>,
        config: EngineConfig,
    ) -> std::io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            state: DashMap::new(),
            wal_tx,
            notify,
            entity_to_type: DashMap::new(),
            references: DashMap::new(),
            global_blocks: RwLock::new(Vec::new()),
            config,
        };

        // Replay events — we're the sole owner of these Arcs, so try_read/
        // try_write always succeed instantly (no contention). Never use
        // blocking_read/blocking_write here because this may run inside an
        // async context.
        for event in &events {
            match event {
                Event::RoomTypeCreated { record } => {
                    engine
                        .state
                        .insert(record.id, Arc::new(RwLock::new(RoomTypeState::new(record.clone()))));
                }
                Event::DateBlockAdded { block } if block.scope == BlockScope::Global => {
                    engine
                        .global_blocks
                        .try_write()
                        .expect("replay: uncontended write")
                        .push(block.clone());
                }
                Event::DateBlockRemoved {
                    id,
                    scope: BlockScope::Global,
                } => {
                    engine
                        .global_blocks
                        .try_write()
                        .expect("replay: uncontended write")
                        .retain(|b| b.id != *id);
                }
                other => {
                    if let Some(type_id) = event_room_type_id(other)
                        && let Some(entry) = engine.state.get(&type_id)
                    {
                        let rs_arc = entry.clone();
                        let mut guard = rs_arc.try_write().expect("replay: uncontended write");
                        apply_to_state(&mut guard, other, &engine.entity_to_type, &engine.references);
                    }
                }
            }
        }

        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
    }

    pub fn get_room_type(&self, id: &Ulid) -> Option<SharedRoomTypeState> {
        self.state.get(id).map(|e| e.value().clone())
    }

    pub fn room_type_for_entity(&self, entity_id: &Ulid) -> Option<Ulid> {
        self.entity_to_type.get(entity_id).map(|e| *e.value())
    }

    /// WAL-append + apply + notify in one call. The append is the commit
    /// point: if it fails, in-memory state is untouched.
    pub(super) async fn persist_and_apply(
        &self,
        room_type_id: Ulid,
        state: &mut RoomTypeState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_state(state, event, &self.entity_to_type, &self.references);
        self.notify.send(room_type_id, event);
        Ok(())
    }

    /// Lookup entity → room type, get its state, acquire the write lock.
    pub(super) async fn resolve_entity_write(
        &self,
        entity_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<RoomTypeState>), EngineError> {
        let type_id = self
            .room_type_for_entity(entity_id)
            .ok_or(EngineError::NotFound(*entity_id))?;
        let rs = self
            .get_room_type(&type_id)
            .ok_or(EngineError::NotFound(type_id))?;
        let guard = rs.write_owned().await;
        Ok((type_id, guard))
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        for block in self.global_blocks.read().await.iter() {
            events.push(Event::DateBlockAdded { block: block.clone() });
        }

        let type_ids: Vec<Ulid> = self.state.iter().map(|e| *e.key()).collect();
        for id in type_ids {
            let Some(entry) = self.state.get(&id) else { continue };
            let rs = entry.value().clone();
            drop(entry);
            let guard = rs.read().await;

            events.push(Event::RoomTypeCreated {
                record: guard.record.clone(),
            });
            for room in guard.rooms.values() {
                events.push(Event::RoomCreated { record: room.clone() });
            }
            for block in &guard.blocks {
                events.push(Event::DateBlockAdded { block: block.clone() });
            }
            for window in &guard.maintenance {
                events.push(Event::MaintenanceScheduled { window: window.clone() });
            }
            for hold in &guard.housekeeping {
                events.push(Event::HousekeepingLogged { hold: hold.clone() });
            }
            for reservation in &guard.reservations {
                events.push(Event::ReservationCreated {
                    reservation: reservation.clone(),
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
