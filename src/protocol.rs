//! Wire protocol (§6.1): request/ack pairs and the broadcast event union.
//!
//! Generalized from the teacher's `messages.rs` two-role (`Vulcast`/`WebClient`) protocol to the
//! full request set this core supports. Every request still deserializes through a single tagged
//! enum; the dispatcher matches on it exhaustively.

use mediasoup::consumer::ConsumerId;
use mediasoup::data_structures::{DtlsParameters, IceCandidate, IceParameters};
use mediasoup::producer::ProducerId;
use mediasoup::rtp_parameters::{
    MediaKind, RtpCapabilities, RtpCapabilitiesFinalized, RtpParameters,
};
use mediasoup::sctp_parameters::SctpParameters;
use mediasoup::transport::TransportId;
use serde::{Deserialize, Serialize};

use crate::ids::{ConferenceId, ParticipantId};
use crate::participant::StreamType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Producer,
    Consumer,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientRequest {
    #[serde(rename_all = "camelCase")]
    JoinConference {
        conference_id: ConferenceId,
        conference_name: Option<String>,
        participant_id: ParticipantId,
        participant_name: String,
        participant_info: Option<serde_json::Value>,
    },
    #[serde(rename_all = "camelCase")]
    LeaveConference {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
    },
    #[serde(rename_all = "camelCase")]
    GetParticipants { conference_id: ConferenceId },
    #[serde(rename_all = "camelCase")]
    CreateTransport {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
        direction: Direction,
    },
    #[serde(rename_all = "camelCase")]
    ConnectTransport {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
        direction: Direction,
        dtls_parameters: DtlsParameters,
    },
    #[serde(rename_all = "camelCase")]
    Produce {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
        transport_id: TransportId,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
        stream_type: Option<StreamType>,
    },
    #[serde(rename_all = "camelCase")]
    Consume {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
        consume_options: ConsumeOptions,
    },
    #[serde(rename_all = "camelCase")]
    ConsumeParticipantMedia {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
        target_participant_id: ParticipantId,
        rtp_capabilities: RtpCapabilities,
    },
    #[serde(rename_all = "camelCase")]
    UnpauseConsumer {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
        consumer_id: ConsumerId,
    },
    #[serde(rename_all = "camelCase")]
    PauseProducer {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
        extra_data: ProducerRef,
    },
    #[serde(rename_all = "camelCase")]
    ResumeProducer {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
        extra_data: ProducerRef,
    },
    #[serde(rename_all = "camelCase")]
    CloseProducer {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
        extra_data: ProducerRef,
    },
    #[serde(rename_all = "camelCase")]
    CloseConsumer {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
        extra_data: ConsumerRef,
    },
    #[serde(rename_all = "camelCase")]
    MuteAudio {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
    },
    #[serde(rename_all = "camelCase")]
    UnmuteAudio {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
    },
    #[serde(rename_all = "camelCase")]
    MuteVideo {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
    },
    #[serde(rename_all = "camelCase")]
    UnmuteVideo {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeOptions {
    pub producer_id: ProducerId,
    pub rtp_capabilities: RtpCapabilities,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerRef {
    pub producer_id: ProducerId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerRef {
    pub consumer_id: ConsumerId,
}

/// `{status: "ok", data?: T} | {status: "error", error: string}` (§6.1).
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Ack {
    Ok {
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    Error {
        error: String,
    },
}

impl Ack {
    pub fn ok() -> Self {
        Ack::Ok { data: None }
    }

    pub fn ok_with(data: impl Serialize) -> Self {
        Ack::Ok {
            data: Some(serde_json::to_value(data).expect("ack payload is always serializable")),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Ack::Error {
            error: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportParams {
    pub id: TransportId,
    pub ice_parameters: IceParameters,
    pub ice_candidates: Vec<IceCandidate>,
    pub dtls_parameters: DtlsParameters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sctp_parameters: Option<SctpParameters>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerParams {
    pub id: ConsumerId,
    pub producer_id: ProducerId,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    pub stream_type: StreamType,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub participant_id: ParticipantId,
    pub participant_name: String,
    pub producer_ids: Vec<ProducerId>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinConferenceData {
    pub router_capabilities: RtpCapabilitiesFinalized,
}

/// Signaling → all sessions in the conference room (§6.1), tagged so the client can dispatch
/// exhaustively.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum BroadcastEvent {
    #[serde(rename_all = "camelCase")]
    ParticipantJoined {
        participant_id: ParticipantId,
        participant_name: String,
        conference_id: ConferenceId,
        #[serde(skip_serializing_if = "Option::is_none")]
        participant_info: Option<serde_json::Value>,
    },
    #[serde(rename_all = "camelCase")]
    ParticipantLeft {
        participant_id: ParticipantId,
        closed_producer_ids: Vec<ProducerId>,
        closed_consumer_ids: Vec<ConsumerId>,
    },
    #[serde(rename_all = "camelCase")]
    NewProducer {
        producer_id: ProducerId,
        participant_id: ParticipantId,
        participant_name: String,
        kind: MediaKind,
        stream_type: StreamType,
    },
    #[serde(rename_all = "camelCase")]
    ProducerClosed {
        participant_id: ParticipantId,
        producer_id: ProducerId,
        kind: MediaKind,
    },
    #[serde(rename_all = "camelCase")]
    ConsumerClosed {
        participant_id: ParticipantId,
        consumer_id: ConsumerId,
    },
    #[serde(rename_all = "camelCase")]
    ProducersPaused {
        participant_id: ParticipantId,
        producer_ids: Vec<ProducerId>,
        kind: MediaKind,
    },
    #[serde(rename_all = "camelCase")]
    ProducersResumed {
        participant_id: ParticipantId,
        producer_ids: Vec<ProducerId>,
        kind: MediaKind,
    },
    #[serde(rename_all = "camelCase")]
    ConferenceDestroyed {
        conference_id: ConferenceId,
        reason: String,
    },
}
