mod fixture;

use mediasoup::rtp_parameters::MediaKind;
use mediasoup::transport::{ListenIps, Transport};
use mediasoup::webrtc_transport::WebRtcTransportOptions;

use parley_relay::conference::Conference;
use parley_relay::config::ParticipantLimits;
use parley_relay::ids::SessionId;
use parley_relay::participant::StreamType;
use parley_relay::protocol::Direction;

fn transport_options() -> WebRtcTransportOptions {
    WebRtcTransportOptions::new(ListenIps::new(mediasoup::webrtc_transport::ListenIp {
        ip: "127.0.0.1".parse().unwrap(),
        announced_ip: None,
    }))
}

async fn new_conference(limits: Option<ParticipantLimits>) -> Conference {
    let (worker, router) = fixture::worker_and_router().await;
    Conference::new("conf-1".to_string(), None, worker, router, limits)
}

#[tokio::test]
async fn join_then_leave_alone_closes_nothing_unexpected() {
    let conference = new_conference(None).await;
    let participant = conference
        .join("alice".to_string(), "Alice".to_string(), SessionId::new())
        .await
        .expect("first join succeeds");

    assert_eq!(conference.participant_count().await, 1);

    let (left, closed_consumers, closed_producers) =
        conference.leave(&participant.id).await.expect("leave returns the removed participant");
    assert_eq!(left.id, "alice");
    assert!(closed_consumers.is_empty());
    assert!(closed_producers.is_empty());
    assert!(conference.is_empty().await);
}

#[tokio::test]
async fn rejoin_with_same_session_is_idempotent() {
    let conference = new_conference(None).await;
    let session = SessionId::new();
    let first = conference.join("alice".to_string(), "Alice".to_string(), session).await.unwrap();
    let second = conference.join("alice".to_string(), "Alice".to_string(), session).await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn rejoin_with_different_session_is_rejected() {
    let conference = new_conference(None).await;
    conference.join("alice".to_string(), "Alice".to_string(), SessionId::new()).await.unwrap();
    let result = conference.join("alice".to_string(), "Alice".to_string(), SessionId::new()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn two_joiners_exchange_audio() {
    let conference = new_conference(None).await;
    let alice = conference.join("alice".to_string(), "Alice".to_string(), SessionId::new()).await.unwrap();
    let bob = conference.join("bob".to_string(), "Bob".to_string(), SessionId::new()).await.unwrap();

    let send_transport = alice.create_transport(Direction::Producer, transport_options()).await.unwrap();
    alice
        .connect_transport(Direction::Producer, fixture::dtls_parameters())
        .await
        .unwrap();
    let producer = alice
        .produce(
            send_transport.id(),
            MediaKind::Audio,
            fixture::audio_producer_rtp_parameters(),
            StreamType::Audio,
        )
        .await
        .unwrap();

    bob.create_transport(Direction::Consumer, transport_options()).await.unwrap();
    bob.connect_transport(Direction::Consumer, fixture::dtls_parameters()).await.unwrap();

    let (_consumer_participant, consumer, owner_id, stream_type) = conference
        .consume(&bob.id, producer.id(), fixture::consumer_device_capabilities())
        .await
        .unwrap();

    assert_eq!(owner_id, "alice");
    assert_eq!(stream_type, StreamType::Audio);
    assert!(consumer.paused());
}

#[tokio::test]
async fn consuming_own_producer_is_rejected() {
    let conference = new_conference(None).await;
    let alice = conference.join("alice".to_string(), "Alice".to_string(), SessionId::new()).await.unwrap();

    let send_transport = alice.create_transport(Direction::Producer, transport_options()).await.unwrap();
    alice.connect_transport(Direction::Producer, fixture::dtls_parameters()).await.unwrap();
    let producer = alice
        .produce(send_transport.id(), MediaKind::Audio, fixture::audio_producer_rtp_parameters(), StreamType::Audio)
        .await
        .unwrap();

    alice.create_transport(Direction::Consumer, transport_options()).await.unwrap();
    alice.connect_transport(Direction::Consumer, fixture::dtls_parameters()).await.unwrap();

    let result = conference
        .consume(&alice.id, producer.id(), fixture::consumer_device_capabilities())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn screenshare_carries_stream_type() {
    let conference = new_conference(None).await;
    let alice = conference.join("alice".to_string(), "Alice".to_string(), SessionId::new()).await.unwrap();

    let send_transport = alice.create_transport(Direction::Producer, transport_options()).await.unwrap();
    alice.connect_transport(Direction::Producer, fixture::dtls_parameters()).await.unwrap();
    let producer = alice
        .produce(
            send_transport.id(),
            MediaKind::Video,
            fixture::video_producer_rtp_parameters(),
            StreamType::Screenshare,
        )
        .await
        .unwrap();

    assert_eq!(alice.stream_type_of(producer.id()), Some(StreamType::Screenshare));
}

#[tokio::test]
async fn producer_limit_is_enforced_when_configured() {
    let limits = ParticipantLimits { max_audio_producers: 1, max_video_producers: 1 };
    let conference = new_conference(Some(limits)).await;
    let alice = conference.join("alice".to_string(), "Alice".to_string(), SessionId::new()).await.unwrap();

    conference.check_producer_limit(&alice, MediaKind::Audio).expect("under the limit");

    let send_transport = alice.create_transport(Direction::Producer, transport_options()).await.unwrap();
    alice.connect_transport(Direction::Producer, fixture::dtls_parameters()).await.unwrap();
    alice
        .produce(send_transport.id(), MediaKind::Audio, fixture::audio_producer_rtp_parameters(), StreamType::Audio)
        .await
        .unwrap();

    let result = conference.check_producer_limit(&alice, MediaKind::Audio);
    assert!(matches!(result, Err(parley_relay::error::CoreError::LimitExceeded(_))));
}

#[tokio::test]
async fn producer_limit_is_unenforced_when_unconfigured() {
    let conference = new_conference(None).await;
    let alice = conference.join("alice".to_string(), "Alice".to_string(), SessionId::new()).await.unwrap();
    conference.check_producer_limit(&alice, MediaKind::Audio).expect("no limit configured");
}

#[tokio::test]
async fn abrupt_disconnect_cleans_up_transports_and_producers() {
    let conference = new_conference(None).await;
    let alice = conference.join("alice".to_string(), "Alice".to_string(), SessionId::new()).await.unwrap();

    let send_transport = alice.create_transport(Direction::Producer, transport_options()).await.unwrap();
    alice.connect_transport(Direction::Producer, fixture::dtls_parameters()).await.unwrap();
    alice
        .produce(send_transport.id(), MediaKind::Audio, fixture::audio_producer_rtp_parameters(), StreamType::Audio)
        .await
        .unwrap();

    let (_left, _closed_consumers, closed_producers) = conference.leave("alice").await.unwrap();
    assert_eq!(closed_producers.len(), 1);
    assert!(conference.get("alice").await.is_none());
}
