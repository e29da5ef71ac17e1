//! C3 — Conference: the set of participants sharing one router (§4.3).
//!
//! Grounded on the teacher's `room.rs`: an `Arc<Shared>` around a `Mutex<State>` of the
//! participant map, plus a `broadcast::Sender` for room-wide fanout. The router itself lives on
//! the conference, not the registry — every participant that joins reuses it.

use std::collections::HashMap;
use std::sync::Arc;

use mediasoup::producer::ProducerId;
use mediasoup::router::Router;
use mediasoup::rtp_parameters::MediaKind;
use mediasoup::worker::Worker;
use tokio::sync::{broadcast, Mutex};

use crate::config::ParticipantLimits;
use crate::error::CoreError;
use crate::ids::{ConferenceId, ParticipantId, SessionId};
use crate::participant::{Participant, StreamType};
use crate::protocol::{BroadcastEvent, ParticipantSummary};

const ROOM_CHANNEL_CAPACITY: usize = 256;

struct State {
    participants: HashMap<ParticipantId, Arc<Participant>>,
}

pub struct Conference {
    pub id: ConferenceId,
    pub name: Option<String>,
    pub worker: Worker,
    pub router: Router,
    participant_limits: Option<ParticipantLimits>,
    state: Mutex<State>,
    room_tx: broadcast::Sender<BroadcastEvent>,
}

impl Conference {
    pub fn new(
        id: ConferenceId,
        name: Option<String>,
        worker: Worker,
        router: Router,
        participant_limits: Option<ParticipantLimits>,
    ) -> Self {
        let (room_tx, _) = broadcast::channel(ROOM_CHANNEL_CAPACITY);
        Self {
            id,
            name,
            worker,
            router,
            participant_limits,
            state: Mutex::new(State {
                participants: HashMap::new(),
            }),
            room_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.room_tx.subscribe()
    }

    /// Fire-and-forget: a conference with zero subscribers (nobody connected yet) is not an
    /// error.
    pub fn broadcast(&self, event: BroadcastEvent) {
        let _ = self.room_tx.send(event);
    }

    /// §4.3 `join`: refuses a duplicate participant id unless it belongs to the same session
    /// (decided Open Question #3 — see DESIGN.md).
    pub async fn join(
        &self,
        participant_id: ParticipantId,
        participant_name: String,
        session_id: SessionId,
    ) -> Result<Arc<Participant>, CoreError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.participants.get(&participant_id) {
            if existing.session_id == session_id {
                return Ok(existing.clone());
            }
            return Err(CoreError::validation(format!(
                "participant {} already joined",
                participant_id
            )));
        }

        let participant = Arc::new(Participant::new(
            participant_id.clone(),
            participant_name,
            session_id,
            self.router.clone(),
        ));
        state.participants.insert(participant_id, participant.clone());
        Ok(participant)
    }

    pub async fn get(&self, participant_id: &str) -> Option<Arc<Participant>> {
        self.state.lock().await.participants.get(participant_id).cloned()
    }

    pub async fn participant_count(&self) -> usize {
        self.state.lock().await.participants.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.participants.is_empty()
    }

    pub async fn summaries(&self) -> Vec<ParticipantSummary> {
        let state = self.state.lock().await;
        state
            .participants
            .values()
            .map(|p| ParticipantSummary {
                participant_id: p.id.clone(),
                participant_name: p.name.clone(),
                producer_ids: p.non_closed_producers(),
            })
            .collect()
    }

    /// §4.3 `consume`: resolves the producer's owner within this conference, refusing
    /// self-consumption or an unknown producer, then delegates to the consuming participant.
    pub async fn consume(
        &self,
        participant_id: &str,
        producer_id: ProducerId,
        rtp_capabilities: mediasoup::rtp_parameters::RtpCapabilities,
    ) -> Result<(Arc<Participant>, mediasoup::consumer::Consumer, ParticipantId, StreamType), CoreError> {
        let (consumer_participant, owner) = {
            let state = self.state.lock().await;
            let consumer_participant = state
                .participants
                .get(participant_id)
                .cloned()
                .ok_or_else(|| CoreError::not_found(format!("participant {}", participant_id)))?;

            let owner = state
                .participants
                .values()
                .find(|p| p.producer_info(producer_id).is_some())
                .cloned()
                .ok_or_else(|| CoreError::not_found(format!("producer {}", producer_id)))?;

            if owner.id == participant_id {
                return Err(CoreError::validation("cannot consume one's own producer"));
            }

            (consumer_participant, owner)
        };

        let stream_type = owner
            .producer_info(producer_id)
            .map(|(_, st)| st)
            .ok_or_else(|| CoreError::not_found(format!("producer {}", producer_id)))?;

        let consumer = consumer_participant.consume(producer_id, rtp_capabilities).await?;
        Ok((consumer_participant, consumer, owner.id.clone(), stream_type))
    }

    /// §4.3: the requester's own producers are excluded from the candidate list before a target
    /// is resolved (preserved Open Question #4).
    pub async fn producers_excluding(&self, requester: &str) -> Vec<(ParticipantId, ProducerId, StreamType, MediaKind)> {
        let state = self.state.lock().await;
        state
            .participants
            .values()
            .filter(|p| p.id != requester)
            .flat_map(|p| {
                p.non_closed_producers().into_iter().filter_map(move |pid| {
                    p.producer_info(pid).map(|(kind, st)| (p.id.clone(), pid, st, kind))
                })
            })
            .collect()
    }

    /// §4.3: enforces the configured per-kind producer ceiling, if any (decided Open Question #2).
    pub fn check_producer_limit(&self, participant: &Participant, kind: MediaKind) -> Result<(), CoreError> {
        let Some(limits) = self.participant_limits else {
            return Ok(());
        };
        let max = match kind {
            MediaKind::Audio => limits.max_audio_producers,
            MediaKind::Video => limits.max_video_producers,
        };
        if participant.producer_count(kind) >= max {
            return Err(CoreError::LimitExceeded(format!(
                "participant {} already has {} {:?} producer(s), limit is {}",
                participant.id,
                participant.producer_count(kind),
                kind,
                max
            )));
        }
        Ok(())
    }

    /// §4.3 `leave`: removes the participant, runs its cleanup, and returns the ids it closed so
    /// the dispatcher can broadcast `participantLeft`.
    pub async fn leave(
        &self,
        participant_id: &str,
    ) -> Option<(Arc<Participant>, Vec<mediasoup::consumer::ConsumerId>, Vec<ProducerId>)> {
        let participant = {
            let mut state = self.state.lock().await;
            state.participants.remove(participant_id)?
        };
        let (closed_consumers, closed_producers) = participant.cleanup().await;
        Some((participant, closed_consumers, closed_producers))
    }

    pub async fn participant_ids(&self) -> Vec<ParticipantId> {
        self.state.lock().await.participants.keys().cloned().collect()
    }

    /// §4.3 `close`: tears down every participant, then the router itself. Used by
    /// `Registry::sweep` and the admin `closeConference` operation.
    pub async fn close(&self, reason: &str) {
        let participants: Vec<_> = {
            let mut state = self.state.lock().await;
            state.participants.drain().map(|(_, p)| p).collect()
        };
        for participant in participants {
            participant.cleanup().await;
        }
        self.broadcast(BroadcastEvent::ConferenceDestroyed {
            conference_id: self.id.clone(),
            reason: reason.to_string(),
        });
        self.router.close();
    }
}
