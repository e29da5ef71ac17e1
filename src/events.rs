//! C6 — EventBus: process-wide in-process pub/sub (§4.6).
//!
//! Built on the same `tokio::sync::broadcast` primitive the conference room fanout uses
//! (`conference.rs`), just at process scope instead of per-conference scope. Subscribers are
//! in-process observers only (metrics, admin tooling) — nothing here touches the wire protocol.

use tokio::sync::broadcast;

use crate::ids::{ConferenceId, ParticipantId, SessionId};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum Event {
    ServerStarted,
    ClientConnected { session_id: SessionId },
    ClientDisconnected { session_id: SessionId },
    ConferenceCreated { conference_id: ConferenceId },
    ConferenceDestroyed { conference_id: ConferenceId },
    ParticipantJoined { conference_id: ConferenceId, participant_id: ParticipantId },
    ParticipantLeft { conference_id: ConferenceId, participant_id: ParticipantId },
    ProducerCreated { conference_id: ConferenceId, participant_id: ParticipantId },
    ProducerClosed { conference_id: ConferenceId, participant_id: ParticipantId },
    ConsumerCreated { conference_id: ConferenceId, participant_id: ParticipantId },
    ConsumerClosed { conference_id: ConferenceId, participant_id: ParticipantId },
    AudioMuted { conference_id: ConferenceId, participant_id: ParticipantId },
    AudioUnmuted { conference_id: ConferenceId, participant_id: ParticipantId },
    VideoMuted { conference_id: ConferenceId, participant_id: ParticipantId },
    VideoUnmuted { conference_id: ConferenceId, participant_id: ParticipantId },
    ServerError { message: String },
}

pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Never blocks a slow subscriber: a lagging receiver only misses events
    /// (`RecvError::Lagged`), it never backs up the sender.
    pub fn emit(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(Event::ServerStarted);
        let received = rx.recv().await.unwrap();
        assert!(matches!(received, Event::ServerStarted));
    }

    #[tokio::test]
    async fn emit_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.emit(Event::ServerStarted);
    }
}
