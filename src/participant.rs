//! C2 — Participant: per-client media state (§4.2).
//!
//! Mirrors the teacher's `session.rs` shape: an `Arc<Shared>` handle around a `std::sync::Mutex`
//! of pure collections, with engine calls happening outside the lock. Unlike the teacher, a
//! Participant here is a plain data owner with no lifecycle hooks of its own — the owning
//! [`crate::conference::Conference`] drives `cleanup()` explicitly, matching §5's lock hierarchy
//! (Registry → Conference → Participant, never upward).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use mediasoup::consumer::{Consumer, ConsumerId, ConsumerOptions};
use mediasoup::data_structures::DtlsParameters;
use mediasoup::producer::{Producer, ProducerId, ProducerOptions};
use mediasoup::router::Router;
use mediasoup::rtp_parameters::{MediaKind, RtpCapabilities, RtpParameters};
use mediasoup::transport::{Transport, TransportId};
use mediasoup::webrtc_transport::{WebRtcTransport, WebRtcTransportOptions, WebRtcTransportRemoteParameters};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::ParticipantId;
use crate::protocol::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Audio,
    Video,
    Screenshare,
}

impl StreamType {
    pub fn for_produce(kind: MediaKind, requested: Option<StreamType>) -> Self {
        match (kind, requested) {
            (MediaKind::Video, Some(StreamType::Screenshare)) => StreamType::Screenshare,
            (MediaKind::Audio, _) => StreamType::Audio,
            (MediaKind::Video, _) => StreamType::Video,
        }
    }
}

#[derive(Debug, Clone)]
struct ProducerState {
    kind: MediaKind,
    stream_type: StreamType,
    paused: bool,
    closed: bool,
}

struct State {
    send_transport: Option<WebRtcTransport>,
    recv_transport: Option<WebRtcTransport>,
    producers: HashMap<ProducerId, Producer>,
    consumers: HashMap<ConsumerId, Consumer>,
    producer_states: HashMap<ProducerId, ProducerState>,
}

pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub session_id: crate::ids::SessionId,
    pub joined_at: Instant,
    router: Router,
    state: Mutex<State>,
}

impl Participant {
    pub fn new(
        id: ParticipantId,
        name: String,
        session_id: crate::ids::SessionId,
        router: Router,
    ) -> Self {
        Self {
            id,
            name,
            session_id,
            joined_at: Instant::now(),
            router,
            state: Mutex::new(State {
                send_transport: None,
                recv_transport: None,
                producers: HashMap::new(),
                consumers: HashMap::new(),
                producer_states: HashMap::new(),
            }),
        }
    }

    fn transport_slot(&self, direction: Direction, state: &State) -> Option<WebRtcTransport> {
        match direction {
            Direction::Producer => state.send_transport.clone(),
            Direction::Consumer => state.recv_transport.clone(),
        }
    }

    /// §4.2: creates a send/recv transport on the conference's router; refuses a second call for
    /// the same direction.
    pub async fn create_transport(
        &self,
        direction: Direction,
        options: WebRtcTransportOptions,
    ) -> Result<WebRtcTransport, CoreError> {
        {
            let state = self.state.lock().unwrap();
            if self.transport_slot(direction, &state).is_some() {
                return Err(CoreError::precondition(format!(
                    "{:?} transport already created",
                    direction
                )));
            }
        }

        let transport = self
            .router
            .create_webrtc_transport(options)
            .await
            .map_err(CoreError::engine)?;

        let mut state = self.state.lock().unwrap();
        match direction {
            Direction::Producer => state.send_transport = Some(transport.clone()),
            Direction::Consumer => state.recv_transport = Some(transport.clone()),
        }
        log::trace!("+transport {} ({:?}, participant {})", transport.id(), direction, self.id);
        Ok(transport)
    }

    pub async fn connect_transport(
        &self,
        direction: Direction,
        dtls_parameters: DtlsParameters,
    ) -> Result<(), CoreError> {
        let transport = {
            let state = self.state.lock().unwrap();
            self.transport_slot(direction, &state)
                .ok_or_else(|| CoreError::precondition(format!("{:?} transport not created", direction)))?
        };
        transport
            .connect(WebRtcTransportRemoteParameters { dtls_parameters })
            .await
            .map_err(CoreError::engine)?;
        log::trace!("<-> transport {} (participant {})", transport.id(), self.id);
        Ok(())
    }

    /// §4.2: requires `transport_id == sendTransport.id`.
    pub async fn produce(
        &self,
        transport_id: TransportId,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
        stream_type: StreamType,
    ) -> Result<Producer, CoreError> {
        let transport = {
            let state = self.state.lock().unwrap();
            let send = state
                .send_transport
                .clone()
                .ok_or_else(|| CoreError::precondition("producer transport not created"))?;
            if send.id() != transport_id {
                return Err(CoreError::precondition("transport_id does not match send transport"));
            }
            send
        };

        let mut options = ProducerOptions::new(kind, rtp_parameters);
        options.app_data = mediasoup::data_structures::AppData::new(serde_json::json!({
            "streamType": stream_type,
        }));

        let producer = transport.produce(options).await.map_err(CoreError::engine)?;

        let mut state = self.state.lock().unwrap();
        state.producer_states.insert(
            producer.id(),
            ProducerState {
                kind,
                stream_type,
                paused: false,
                closed: false,
            },
        );
        state.producers.insert(producer.id(), producer.clone());
        log::trace!("+producer {} (participant {})", producer.id(), self.id);
        Ok(producer)
    }

    /// §4.2: consumers are always created paused.
    pub async fn consume(
        &self,
        producer_id: ProducerId,
        rtp_capabilities: RtpCapabilities,
    ) -> Result<Consumer, CoreError> {
        let transport = {
            let state = self.state.lock().unwrap();
            state
                .recv_transport
                .clone()
                .ok_or_else(|| CoreError::precondition("consumer transport not created"))?
        };

        let mut options = ConsumerOptions::new(producer_id, rtp_capabilities);
        options.paused = true;

        let consumer = transport.consume(options).await.map_err(CoreError::engine)?;

        let mut state = self.state.lock().unwrap();
        state.consumers.insert(consumer.id(), consumer.clone());
        log::trace!("+consumer {} (participant {})", consumer.id(), self.id);
        Ok(consumer)
    }

    pub fn stream_type_of(&self, producer_id: ProducerId) -> Option<StreamType> {
        let state = self.state.lock().unwrap();
        state.producer_states.get(&producer_id).map(|s| s.stream_type)
    }

    pub fn producer_info(&self, producer_id: ProducerId) -> Option<(MediaKind, StreamType)> {
        let state = self.state.lock().unwrap();
        state
            .producer_states
            .get(&producer_id)
            .map(|s| (s.kind, s.stream_type))
    }

    pub fn non_closed_producers(&self) -> Vec<ProducerId> {
        let state = self.state.lock().unwrap();
        state
            .producer_states
            .iter()
            .filter(|(_, s)| !s.closed)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn producer_count(&self, kind: MediaKind) -> usize {
        let state = self.state.lock().unwrap();
        state
            .producer_states
            .values()
            .filter(|s| !s.closed && s.kind == kind)
            .count()
    }

    pub async fn pause_producer(&self, producer_id: ProducerId) -> Result<(), CoreError> {
        let producer = self.get_producer_handle(producer_id)?;
        producer.pause().await.map_err(CoreError::engine)?;
        let mut state = self.state.lock().unwrap();
        if let Some(s) = state.producer_states.get_mut(&producer_id) {
            s.paused = true;
        }
        Ok(())
    }

    pub async fn resume_producer(&self, producer_id: ProducerId) -> Result<(), CoreError> {
        let producer = self.get_producer_handle(producer_id)?;
        producer.resume().await.map_err(CoreError::engine)?;
        let mut state = self.state.lock().unwrap();
        if let Some(s) = state.producer_states.get_mut(&producer_id) {
            s.paused = false;
        }
        Ok(())
    }

    /// Idempotent: closing an already-closed producer is a no-op success.
    pub async fn close_producer(&self, producer_id: ProducerId) -> Result<(), CoreError> {
        let already_closed = {
            let state = self.state.lock().unwrap();
            state
                .producer_states
                .get(&producer_id)
                .map(|s| s.closed)
                .unwrap_or(true)
        };
        if already_closed {
            return Ok(());
        }
        let producer = self.get_producer_handle(producer_id)?;
        producer.close();
        let mut state = self.state.lock().unwrap();
        if let Some(s) = state.producer_states.get_mut(&producer_id) {
            s.closed = true;
        }
        state.producers.remove(&producer_id);
        log::trace!("-producer {} (participant {})", producer_id, self.id);
        Ok(())
    }

    pub async fn resume_consumer(&self, consumer_id: ConsumerId) -> Result<(), CoreError> {
        let consumer = self.get_consumer_handle(consumer_id)?;
        consumer.resume().await.map_err(CoreError::engine)?;
        Ok(())
    }

    /// Idempotent: closing an already-removed consumer is a no-op success.
    pub async fn close_consumer(&self, consumer_id: ConsumerId) -> Result<(), CoreError> {
        let consumer = {
            let mut state = self.state.lock().unwrap();
            state.consumers.remove(&consumer_id)
        };
        if let Some(consumer) = consumer {
            consumer.close();
            log::trace!("-consumer {} (participant {})", consumer_id, self.id);
        }
        Ok(())
    }

    /// §4.2: pause every non-closed producer of `kind`, returning the ids actually paused
    /// (idempotent: already-paused producers are skipped).
    pub async fn mute_kind(&self, kind: MediaKind) -> Vec<ProducerId> {
        let targets: Vec<ProducerId> = {
            let state = self.state.lock().unwrap();
            state
                .producer_states
                .iter()
                .filter(|(_, s)| s.kind == kind && !s.closed && !s.paused)
                .map(|(id, _)| *id)
                .collect()
        };
        let mut paused = Vec::new();
        for id in targets {
            if self.pause_producer(id).await.is_ok() {
                paused.push(id);
            }
        }
        paused
    }

    pub async fn unmute_kind(&self, kind: MediaKind) -> Vec<ProducerId> {
        let targets: Vec<ProducerId> = {
            let state = self.state.lock().unwrap();
            state
                .producer_states
                .iter()
                .filter(|(_, s)| s.kind == kind && !s.closed && s.paused)
                .map(|(id, _)| *id)
                .collect()
        };
        let mut resumed = Vec::new();
        for id in targets {
            if self.resume_producer(id).await.is_ok() {
                resumed.push(id);
            }
        }
        resumed
    }

    /// §4.2 `cleanup()`: closes every consumer, then every producer, then each transport,
    /// ignoring individual failures, returning the ids that were successfully closed.
    pub async fn cleanup(&self) -> (Vec<ConsumerId>, Vec<ProducerId>) {
        let (consumer_ids, producer_ids, send_transport, recv_transport) = {
            let state = self.state.lock().unwrap();
            (
                state.consumers.keys().copied().collect::<Vec<_>>(),
                state
                    .producer_states
                    .iter()
                    .filter(|(_, s)| !s.closed)
                    .map(|(id, _)| *id)
                    .collect::<Vec<_>>(),
                state.send_transport.clone(),
                state.recv_transport.clone(),
            )
        };

        let mut closed_consumers = Vec::new();
        for id in consumer_ids {
            if self.close_consumer(id).await.is_ok() {
                closed_consumers.push(id);
            }
        }

        let mut closed_producers = Vec::new();
        for id in producer_ids {
            if self.close_producer(id).await.is_ok() {
                closed_producers.push(id);
            }
        }

        if let Some(transport) = send_transport {
            transport.close();
        }
        if let Some(transport) = recv_transport {
            transport.close();
        }

        (closed_consumers, closed_producers)
    }

    fn get_producer_handle(&self, id: ProducerId) -> Result<Producer, CoreError> {
        let state = self.state.lock().unwrap();
        state
            .producers
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("producer {}", id)))
    }

    fn get_consumer_handle(&self, id: ConsumerId) -> Result<Consumer, CoreError> {
        let state = self.state.lock().unwrap();
        state
            .consumers
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("consumer {}", id)))
    }
}
