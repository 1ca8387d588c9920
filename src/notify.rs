use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for committed events, one channel per room type. Collaborator
/// surfaces (notification delivery, dashboards) subscribe here; the engine
/// publishes after every commit and never waits on consumers.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to events for a room type. Creates the channel if needed.
    pub fn subscribe(&self, room_type_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(room_type_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Publish a committed event. No-op if nobody is listening.
    pub fn send(&self, room_type_id: Ulid, event: &Event) {
        if let Some(sender) = self.channels.get(&room_type_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Remove a channel (e.g. when a room type is retired).
    pub fn remove(&self, room_type_id: &Ulid) {
        self.channels.remove(room_type_id);
    }
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockScope, DateBlock, StayRange};
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let rt = Ulid::new();
        let mut rx = hub.subscribe(rt);

        let event = Event::DateBlockAdded {
            block: DateBlock {
                id: Ulid::new(),
                scope: BlockScope::RoomType(rt),
                range: StayRange::new(d(2026, 7, 1), d(2026, 7, 2)),
                reason: "deep clean".into(),
            },
        };
        hub.send(rt, &event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let rt = Ulid::new();
        // No subscriber — should not panic
        hub.send(
            rt,
            &Event::DateBlockRemoved {
                id: Ulid::new(),
                scope: BlockScope::RoomType(rt),
            },
        );
    }
}
