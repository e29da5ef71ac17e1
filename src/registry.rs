//! C4 — Registry: process-wide index of conferences and sessions (§4.4).
//!
//! Grounded on the teacher's `RelayServer` (`rooms: HashMap<RoomId, Arc<Mutex<Room>>>`, the
//! `Entry::Occupied`/`Vacant` join-or-create pattern in `get_room`), generalized from a
//! single-router-per-process server to the full registry contract that also tracks which
//! conference/participant a live session belongs to (needed for disconnect cleanup, §4.4).

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use mediasoup::router::RouterOptions;
use mediasoup::worker::WorkerId;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::CoreError;
use crate::events::{Event, EventBus};
use crate::ids::{ConferenceId, ParticipantId, SessionId};
use crate::conference::Conference;
use crate::worker_pool::WorkerPool;

#[derive(Clone)]
struct SessionLocation {
    conference_id: ConferenceId,
    participant_id: ParticipantId,
}

struct State {
    conferences: HashMap<ConferenceId, Arc<Conference>>,
    sessions: HashMap<SessionId, SessionLocation>,
}

pub struct Registry {
    worker_pool: Arc<WorkerPool>,
    config: Config,
    events: Arc<EventBus>,
    state: Mutex<State>,
}

impl Registry {
    pub fn new(worker_pool: Arc<WorkerPool>, config: Config, events: Arc<EventBus>) -> Self {
        Self {
            worker_pool,
            config,
            events,
            state: Mutex::new(State {
                conferences: HashMap::new(),
                sessions: HashMap::new(),
            }),
        }
    }

    /// §4.4 `joinConference`: get-or-create the conference (placing a fresh router on the
    /// least-loaded worker), join the participant onto it, and remember which session now owns
    /// that `(conferenceId, participantId)` pair.
    pub async fn join_conference(
        &self,
        conference_id: ConferenceId,
        conference_name: Option<String>,
        participant_id: ParticipantId,
        participant_name: String,
        session_id: SessionId,
    ) -> Result<(Arc<Conference>, Arc<crate::participant::Participant>), CoreError> {
        let conference = self.get_or_create_conference(conference_id, conference_name).await?;
        let participant = conference
            .join(participant_id.clone(), participant_name, session_id)
            .await?;

        let mut state = self.state.lock().await;
        state.sessions.insert(
            session_id,
            SessionLocation {
                conference_id: conference.id.clone(),
                participant_id,
            },
        );

        Ok((conference, participant))
    }

    async fn get_or_create_conference(
        &self,
        conference_id: ConferenceId,
        conference_name: Option<String>,
    ) -> Result<Arc<Conference>, CoreError> {
        let mut state = self.state.lock().await;
        match state.conferences.entry(conference_id.clone()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let router_options = RouterOptions::new(self.config.router_options.media_codecs());
                let (worker, router) = self.worker_pool.place_conference(router_options).await?;
                let created_id = conference_id.clone();
                let conference = Arc::new(Conference::new(
                    conference_id,
                    conference_name,
                    worker,
                    router,
                    self.config.participant_limits,
                ));
                entry.insert(conference.clone());
                self.events.emit(Event::ConferenceCreated { conference_id: created_id });
                Ok(conference)
            }
        }
    }

    pub async fn get_conference(&self, conference_id: &str) -> Option<Arc<Conference>> {
        self.state.lock().await.conferences.get(conference_id).cloned()
    }

    pub async fn list_conferences(&self) -> Vec<Arc<Conference>> {
        self.state.lock().await.conferences.values().cloned().collect()
    }

    /// §4.4 `leaveBySession`: resolves a session to its `(conference, participant)` and removes
    /// the participant from the conference. A conference left empty by this is only *marked*
    /// empty — actual teardown waits for [`Self::sweep`] (Data Model lifecycle rule: destroyed
    /// when the participant map is empty AND a sweep has run). Used both for explicit
    /// `leaveConference` requests and abrupt-disconnect cleanup.
    pub async fn leave_by_session(&self, session_id: SessionId) -> Option<LeaveOutcome> {
        let location = {
            let mut state = self.state.lock().await;
            state.sessions.remove(&session_id)?
        };

        let conference = self.get_conference(&location.conference_id).await?;
        let (participant, closed_consumers, closed_producers) =
            conference.leave(&location.participant_id).await?;

        let emptied = conference.is_empty().await;

        Some(LeaveOutcome {
            conference,
            participant,
            closed_consumers,
            closed_producers,
            emptied,
        })
    }

    async fn remove_conference(&self, conference_id: &str) {
        let conference = {
            let mut state = self.state.lock().await;
            state.conferences.remove(conference_id)
        };
        if let Some(conference) = conference {
            conference.close("empty").await;
            self.events.emit(Event::ConferenceDestroyed {
                conference_id: conference_id.to_string(),
            });
        }
    }

    /// §4.4 `sweep`: reclaim conferences left empty by a `leaveConference`/disconnect (Testable
    /// Invariant #4 — the router stays non-closed until a sweep has actually run since the last
    /// participant left).
    pub async fn sweep(&self) {
        let ids: Vec<ConferenceId> = {
            let state = self.state.lock().await;
            state.conferences.keys().cloned().collect()
        };
        for id in ids {
            let Some(conference) = self.get_conference(&id).await else {
                continue;
            };
            if conference.is_empty().await {
                self.remove_conference(&id).await;
                log::info!("swept empty conference {}", id);
            }
        }
    }

    /// §4.1/§7: a dead worker invalidates every conference pinned to it. Force-closes them
    /// immediately rather than waiting for a sweep, since their router is already gone.
    pub async fn reconcile_dead_worker(&self, worker_id: WorkerId) {
        let affected: Vec<ConferenceId> = {
            let state = self.state.lock().await;
            state
                .conferences
                .iter()
                .filter(|(_, conference)| conference.worker.id() == worker_id)
                .map(|(id, _)| id.clone())
                .collect()
        };
        for id in affected {
            let conference = {
                let mut state = self.state.lock().await;
                state.sessions.retain(|_, loc| loc.conference_id != id);
                state.conferences.remove(&id)
            };
            if let Some(conference) = conference {
                log::error!("closing conference {} pinned to dead worker {}", id, worker_id);
                conference.close("worker died").await;
                self.events.emit(Event::ConferenceDestroyed { conference_id: id });
            }
        }
    }

    pub async fn conference_count(&self) -> usize {
        self.state.lock().await.conferences.len()
    }

    /// Admin-surface `closeConference`: force-closes a conference regardless of occupancy.
    pub async fn close_conference(&self, conference_id: &str, reason: &str) -> Result<(), CoreError> {
        let conference = {
            let mut state = self.state.lock().await;
            state.conferences.remove(conference_id)
        };
        let conference = conference.ok_or_else(|| CoreError::not_found(format!("conference {}", conference_id)))?;
        conference.close(reason).await;
        self.events.emit(Event::ConferenceDestroyed {
            conference_id: conference_id.to_string(),
        });
        Ok(())
    }

    /// Admin-surface `kickParticipant`: routed through the same session-indexed
    /// [`Self::leave_by_session`] path a real `leaveConference`/disconnect uses, so the session
    /// index is cleared and the conference room hears `participantLeft` like any other departure.
    pub async fn kick_participant(
        &self,
        conference_id: &str,
        participant_id: &str,
    ) -> Result<(), CoreError> {
        let session_id = {
            let state = self.state.lock().await;
            state
                .sessions
                .iter()
                .find(|(_, loc)| loc.conference_id == conference_id && loc.participant_id == participant_id)
                .map(|(session_id, _)| *session_id)
        };
        let session_id = session_id
            .ok_or_else(|| CoreError::not_found(format!("participant {}", participant_id)))?;

        let outcome = self
            .leave_by_session(session_id)
            .await
            .ok_or_else(|| CoreError::not_found(format!("participant {}", participant_id)))?;

        self.events.emit(Event::ParticipantLeft {
            conference_id: outcome.conference.id.clone(),
            participant_id: outcome.participant.id.clone(),
        });
        outcome.conference.broadcast(crate::protocol::BroadcastEvent::ParticipantLeft {
            participant_id: outcome.participant.id.clone(),
            closed_producer_ids: outcome.closed_producers,
            closed_consumer_ids: outcome.closed_consumers,
        });

        Ok(())
    }
}

pub struct LeaveOutcome {
    pub conference: Arc<Conference>,
    pub participant: Arc<crate::participant::Participant>,
    pub closed_consumers: Vec<mediasoup::consumer::ConsumerId>,
    pub closed_producers: Vec<mediasoup::producer::ProducerId>,
    pub emptied: bool,
}
