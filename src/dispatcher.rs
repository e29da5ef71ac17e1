//! C5 — SessionDispatcher: maps wire requests onto Registry/Conference operations (§4.5).
//!
//! Grounded on the teacher's `session.rs` `Session::produce`/`consume`/`connect_webrtc_transport`
//! call sequence and `log::trace!` style, composed with the room `announce_producer` broadcast
//! pattern from `room.rs`. Every handler validates, dispatches, ack's the caller, and — on success
//! — broadcasts a descriptor to the rest of the conference room.

use std::sync::Arc;

use mediasoup::webrtc_transport::WebRtcTransportOptions;

use crate::config::Config;
use crate::error::CoreError;
use crate::events::{Event, EventBus};
use crate::ids::SessionId;
use crate::protocol::{
    Ack, BroadcastEvent, ClientRequest, ConsumerParams, JoinConferenceData, TransportParams,
};
use crate::registry::Registry;
use crate::session::Session;

pub struct SessionDispatcher {
    registry: Arc<Registry>,
    events: Arc<EventBus>,
    config: Config,
}

impl SessionDispatcher {
    pub fn new(registry: Arc<Registry>, events: Arc<EventBus>, config: Config) -> Self {
        Self { registry, events, config }
    }

    pub async fn handle(&self, session: &dyn Session, request: ClientRequest) {
        log::info!("request from session {}: {:?}", session.session_id(), request_name(&request));
        let result = self.dispatch(session, request).await;
        match result {
            Ok(ack) => session.send_ack(ack).await,
            Err(err) => {
                log::warn!("request from session {} failed: {}", session.session_id(), err);
                self.events.emit(Event::ServerError { message: err.to_string() });
                session.send_ack(Ack::err(err.wire_message())).await;
            }
        }
    }

    async fn dispatch(&self, session: &dyn Session, request: ClientRequest) -> Result<Ack, CoreError> {
        match request {
            ClientRequest::JoinConference {
                conference_id,
                conference_name,
                participant_id,
                participant_name,
                participant_info,
            } => {
                let (conference, _participant) = self
                    .registry
                    .join_conference(
                        conference_id.clone(),
                        conference_name,
                        participant_id.clone(),
                        participant_name.clone(),
                        session.session_id(),
                    )
                    .await?;

                self.events.emit(Event::ParticipantJoined {
                    conference_id: conference_id.clone(),
                    participant_id: participant_id.clone(),
                });

                self.broadcast(
                    &conference,
                    BroadcastEvent::ParticipantJoined {
                        participant_id,
                        participant_name,
                        conference_id,
                        participant_info,
                    },
                );

                // Atomic with the join succeeding (§3): a broadcast racing this join must not be
                // missed, and `broadcast::Receiver` only sees messages sent after it subscribes.
                session.subscribe_room(conference.subscribe());

                Ok(Ack::ok_with(JoinConferenceData {
                    router_capabilities: conference.router.rtp_capabilities().clone(),
                }))
            }

            ClientRequest::LeaveConference { conference_id: _, participant_id: _ } => {
                self.leave(session.session_id()).await
            }

            ClientRequest::GetParticipants { conference_id } => {
                let conference = self.get_conference(&conference_id).await?;
                Ok(Ack::ok_with(conference.summaries().await))
            }

            ClientRequest::CreateTransport { conference_id, participant_id, direction } => {
                let conference = self.get_conference(&conference_id).await?;
                let participant = self.get_participant(&conference, &participant_id).await?;
                let options = build_transport_options(&self.config);
                let transport = participant.create_transport(direction, options).await?;
                Ok(Ack::ok_with(TransportParams {
                    id: transport.id(),
                    ice_parameters: transport.ice_parameters().clone(),
                    ice_candidates: transport.ice_candidates().clone(),
                    dtls_parameters: transport.dtls_parameters(),
                    sctp_parameters: transport.sctp_parameters(),
                }))
            }

            ClientRequest::ConnectTransport { conference_id, participant_id, direction, dtls_parameters } => {
                let conference = self.get_conference(&conference_id).await?;
                let participant = self.get_participant(&conference, &participant_id).await?;
                participant.connect_transport(direction, dtls_parameters).await?;
                Ok(Ack::ok())
            }

            ClientRequest::Produce {
                conference_id,
                participant_id,
                transport_id,
                kind,
                rtp_parameters,
                stream_type,
            } => {
                let conference = self.get_conference(&conference_id).await?;
                let participant = self.get_participant(&conference, &participant_id).await?;
                conference.check_producer_limit(&participant, kind)?;

                let resolved_stream_type = crate::participant::StreamType::for_produce(kind, stream_type);
                let producer = participant
                    .produce(transport_id, kind, rtp_parameters, resolved_stream_type)
                    .await?;

                self.events.emit(Event::ProducerCreated {
                    conference_id: conference_id.clone(),
                    participant_id: participant_id.clone(),
                });

                self.broadcast(
                    &conference,
                    BroadcastEvent::NewProducer {
                        producer_id: producer.id(),
                        participant_id,
                        participant_name: participant.name.clone(),
                        kind,
                        stream_type: resolved_stream_type,
                    },
                );

                Ok(Ack::ok_with(serde_json::json!({ "id": producer.id() })))
            }

            ClientRequest::Consume { conference_id, participant_id, consume_options } => {
                let conference = self.get_conference(&conference_id).await?;
                let (_participant, consumer, _owner_id, stream_type) = conference
                    .consume(&participant_id, consume_options.producer_id, consume_options.rtp_capabilities)
                    .await?;

                self.events.emit(Event::ConsumerCreated {
                    conference_id,
                    participant_id,
                });

                Ok(Ack::ok_with(ConsumerParams {
                    id: consumer.id(),
                    producer_id: consumer.producer_id(),
                    kind: consumer.kind(),
                    rtp_parameters: consumer.rtp_parameters().clone(),
                    stream_type,
                }))
            }

            ClientRequest::ConsumeParticipantMedia {
                conference_id,
                participant_id,
                target_participant_id,
                rtp_capabilities,
            } => {
                let conference = self.get_conference(&conference_id).await?;
                let candidates = conference.producers_excluding(&participant_id).await;
                let mut params = Vec::new();
                for (owner_id, producer_id, stream_type, _kind) in candidates {
                    if owner_id != target_participant_id {
                        continue;
                    }
                    match conference.consume(&participant_id, producer_id, rtp_capabilities.clone()).await {
                        Ok((_participant, consumer, _owner, stream_type)) => {
                            params.push(ConsumerParams {
                                id: consumer.id(),
                                producer_id: consumer.producer_id(),
                                kind: consumer.kind(),
                                rtp_parameters: consumer.rtp_parameters().clone(),
                                stream_type,
                            });
                        }
                        Err(err) => {
                            log::warn!(
                                "consumeParticipantMedia: skipping producer {} ({}): {}",
                                producer_id,
                                stream_type_name(stream_type),
                                err
                            );
                        }
                    }
                }
                Ok(Ack::ok_with(params))
            }

            ClientRequest::UnpauseConsumer { conference_id, participant_id, consumer_id } => {
                let conference = self.get_conference(&conference_id).await?;
                let participant = self.get_participant(&conference, &participant_id).await?;
                participant.resume_consumer(consumer_id).await?;
                Ok(Ack::ok())
            }

            ClientRequest::PauseProducer { conference_id, participant_id, extra_data } => {
                let conference = self.get_conference(&conference_id).await?;
                let participant = self.get_participant(&conference, &participant_id).await?;
                participant.pause_producer(extra_data.producer_id).await?;
                Ok(Ack::ok())
            }

            ClientRequest::ResumeProducer { conference_id, participant_id, extra_data } => {
                let conference = self.get_conference(&conference_id).await?;
                let participant = self.get_participant(&conference, &participant_id).await?;
                participant.resume_producer(extra_data.producer_id).await?;
                Ok(Ack::ok())
            }

            ClientRequest::CloseProducer { conference_id, participant_id, extra_data } => {
                let conference = self.get_conference(&conference_id).await?;
                let participant = self.get_participant(&conference, &participant_id).await?;
                let kind = participant
                    .producer_info(extra_data.producer_id)
                    .map(|(kind, _)| kind)
                    .unwrap_or(mediasoup::rtp_parameters::MediaKind::Audio);
                participant.close_producer(extra_data.producer_id).await?;

                self.events.emit(Event::ProducerClosed {
                    conference_id: conference_id.clone(),
                    participant_id: participant_id.clone(),
                });
                self.broadcast(
                    &conference,
                    BroadcastEvent::ProducerClosed {
                        participant_id,
                        producer_id: extra_data.producer_id,
                        kind,
                    },
                );
                Ok(Ack::ok())
            }

            ClientRequest::CloseConsumer { conference_id, participant_id, extra_data } => {
                let conference = self.get_conference(&conference_id).await?;
                let participant = self.get_participant(&conference, &participant_id).await?;
                participant.close_consumer(extra_data.consumer_id).await?;

                self.events.emit(Event::ConsumerClosed {
                    conference_id: conference_id.clone(),
                    participant_id: participant_id.clone(),
                });
                self.broadcast(
                    &conference,
                    BroadcastEvent::ConsumerClosed {
                        participant_id,
                        consumer_id: extra_data.consumer_id,
                    },
                );
                Ok(Ack::ok())
            }

            ClientRequest::MuteAudio { conference_id, participant_id } => {
                self.mute(conference_id, participant_id, mediasoup::rtp_parameters::MediaKind::Audio, true).await
            }
            ClientRequest::UnmuteAudio { conference_id, participant_id } => {
                self.mute(conference_id, participant_id, mediasoup::rtp_parameters::MediaKind::Audio, false).await
            }
            ClientRequest::MuteVideo { conference_id, participant_id } => {
                self.mute(conference_id, participant_id, mediasoup::rtp_parameters::MediaKind::Video, true).await
            }
            ClientRequest::UnmuteVideo { conference_id, participant_id } => {
                self.mute(conference_id, participant_id, mediasoup::rtp_parameters::MediaKind::Video, false).await
            }
        }
    }

    async fn mute(
        &self,
        conference_id: String,
        participant_id: String,
        kind: mediasoup::rtp_parameters::MediaKind,
        pause: bool,
    ) -> Result<Ack, CoreError> {
        let conference = self.get_conference(&conference_id).await?;
        let participant = self.get_participant(&conference, &participant_id).await?;
        let affected = if pause {
            participant.mute_kind(kind).await
        } else {
            participant.unmute_kind(kind).await
        };

        let event = if pause {
            self.events.emit(match kind {
                mediasoup::rtp_parameters::MediaKind::Audio => Event::AudioMuted {
                    conference_id: conference_id.clone(),
                    participant_id: participant_id.clone(),
                },
                mediasoup::rtp_parameters::MediaKind::Video => Event::VideoMuted {
                    conference_id: conference_id.clone(),
                    participant_id: participant_id.clone(),
                },
            });
            BroadcastEvent::ProducersPaused { participant_id, producer_ids: affected, kind }
        } else {
            self.events.emit(match kind {
                mediasoup::rtp_parameters::MediaKind::Audio => Event::AudioUnmuted {
                    conference_id: conference_id.clone(),
                    participant_id: participant_id.clone(),
                },
                mediasoup::rtp_parameters::MediaKind::Video => Event::VideoUnmuted {
                    conference_id: conference_id.clone(),
                    participant_id: participant_id.clone(),
                },
            });
            BroadcastEvent::ProducersResumed { participant_id, producer_ids: affected, kind }
        };

        self.broadcast(&conference, event);
        Ok(Ack::ok())
    }

    /// §4.5 `leaveConference`: routed through the registry's session index so a second
    /// `leaveConference` for the same participant is a no-op success instead of `NotFound`
    /// (idempotence law, §5/§8) — a session with no recorded location has already left.
    async fn leave(&self, session_id: SessionId) -> Result<Ack, CoreError> {
        if let Some(outcome) = self.registry.leave_by_session(session_id).await {
            self.announce_leave(outcome);
        }
        Ok(Ack::ok())
    }

    /// Disconnect handler (§4.5): idempotent — a session with no recorded location is a no-op.
    pub async fn handle_disconnect(&self, session_id: SessionId) {
        if let Some(outcome) = self.registry.leave_by_session(session_id).await {
            self.announce_leave(outcome);
        }
    }

    /// Shared by [`Self::leave`] and [`Self::handle_disconnect`]: emits `participantLeft` to both
    /// the event bus and the conference room. Does not force-close an emptied conference — that
    /// waits for `Registry::sweep` (Testable Invariant #4).
    fn announce_leave(&self, outcome: crate::registry::LeaveOutcome) {
        self.events.emit(Event::ParticipantLeft {
            conference_id: outcome.conference.id.clone(),
            participant_id: outcome.participant.id.clone(),
        });

        outcome.conference.broadcast(BroadcastEvent::ParticipantLeft {
            participant_id: outcome.participant.id.clone(),
            closed_producer_ids: outcome.closed_producers,
            closed_consumer_ids: outcome.closed_consumers,
        });

        if outcome.emptied {
            log::info!("conference {} emptied, pending sweep", outcome.conference.id);
        }
    }

    fn broadcast(&self, conference: &crate::conference::Conference, event: BroadcastEvent) {
        log::debug!("broadcast to conference {}: {:?}", conference.id, event);
        conference.broadcast(event);
    }

    async fn get_conference(&self, conference_id: &str) -> Result<Arc<crate::conference::Conference>, CoreError> {
        self.registry
            .get_conference(conference_id)
            .await
            .ok_or_else(|| CoreError::not_found(format!("conference {}", conference_id)))
    }

    async fn get_participant(
        &self,
        conference: &Arc<crate::conference::Conference>,
        participant_id: &str,
    ) -> Result<Arc<crate::participant::Participant>, CoreError> {
        conference
            .get(participant_id)
            .await
            .ok_or_else(|| CoreError::not_found(format!("participant {}", participant_id)))
    }
}

fn build_transport_options(config: &Config) -> WebRtcTransportOptions {
    let mut listen_ips = config.transport_options.listen_ips.iter().map(|ip| {
        mediasoup::webrtc_transport::ListenIp {
            ip: ip.ip,
            announced_ip: ip.announced_ip,
        }
    });

    let first = listen_ips
        .next()
        .expect("config.transportOptions.listenIps must be non-empty");
    let mut options = WebRtcTransportOptions::new(mediasoup::transport::ListenIps::new(first));
    for ip in listen_ips {
        options.listen_ips.add(ip);
    }
    options.enable_udp = config.transport_options.enable_udp;
    options.enable_tcp = config.transport_options.enable_tcp;
    options.prefer_udp = config.transport_options.prefer_udp;
    options.initial_available_outgoing_bitrate = config.transport_options.initial_available_outgoing_bitrate;
    options
}

fn stream_type_name(stream_type: crate::participant::StreamType) -> &'static str {
    match stream_type {
        crate::participant::StreamType::Audio => "audio",
        crate::participant::StreamType::Video => "video",
        crate::participant::StreamType::Screenshare => "screenshare",
    }
}

fn request_name(request: &ClientRequest) -> &'static str {
    match request {
        ClientRequest::JoinConference { .. } => "joinConference",
        ClientRequest::LeaveConference { .. } => "leaveConference",
        ClientRequest::GetParticipants { .. } => "getParticipants",
        ClientRequest::CreateTransport { .. } => "createTransport",
        ClientRequest::ConnectTransport { .. } => "connectTransport",
        ClientRequest::Produce { .. } => "produce",
        ClientRequest::Consume { .. } => "consume",
        ClientRequest::ConsumeParticipantMedia { .. } => "consumeParticipantMedia",
        ClientRequest::UnpauseConsumer { .. } => "unpauseConsumer",
        ClientRequest::PauseProducer { .. } => "pauseProducer",
        ClientRequest::ResumeProducer { .. } => "resumeProducer",
        ClientRequest::CloseProducer { .. } => "closeProducer",
        ClientRequest::CloseConsumer { .. } => "closeConsumer",
        ClientRequest::MuteAudio { .. } => "muteAudio",
        ClientRequest::UnmuteAudio { .. } => "unmuteAudio",
        ClientRequest::MuteVideo { .. } => "muteVideo",
        ClientRequest::UnmuteVideo { .. } => "unmuteVideo",
    }
}
