use duet_client::{CallEvent, SessionConfig, TrackKind};
use duet_core::{NegotiationState, Payload, SignalMessage};
use serde_json::json;

use crate::integration::{CallHarness, init_tracing, room, start_scripted};
use crate::utils::{MockMediaSource, MockTransportFactory, TransportCall, scripted_link};

#[tokio::test]
async fn test_flip_camera_swaps_in_place() {
    init_tracing();

    let room_id = room("abc123");
    let (mut call, mut server) = start_scripted(&room_id, SessionConfig::default());
    let transport = super::connect_as_initiator(&mut call, &mut server, &room_id).await;

    call.handle.flip_camera();
    assert!(
        transport
            .wait_for_call(|c| *c == TransportCall::ReplaceTrack("video-2".to_owned()))
            .await
    );

    let offers = transport
        .calls()
        .await
        .iter()
        .filter(|c| **c == TransportCall::CreateOffer)
        .count();
    assert_eq!(offers, 1);
    assert!(call.media.wait_for_release("video-1").await);

    call.handle.hangup().await;
    assert_eq!(call.finish().await, NegotiationState::Ended);
}

#[tokio::test]
async fn test_screen_share_renegotiates_without_live_swap() {
    init_tracing();

    let room_id = room("abc123");
    let (link, mut server) = scripted_link();
    let mut call = CallHarness::start(
        &room_id,
        SessionConfig::default(),
        link,
        MockMediaSource::new(),
        MockTransportFactory::without_live_replace(),
    );
    let transport = super::connect_as_initiator(&mut call, &mut server, &room_id).await;

    call.handle.start_screen_share();
    let offer = server.expect("offer").await.unwrap();
    assert_eq!(
        offer,
        SignalMessage::Offer {
            room_id: room_id.clone(),
            payload: Payload(json!({"type": "offer", "sdp": "mock offer 2"}))
        }
    );

    server
        .send(&SignalMessage::Answer {
            room_id: room_id.clone(),
            payload: Payload(json!({"type": "answer", "sdp": "v=0 answer 2"})),
        })
        .unwrap();

    call.handle.stop_screen_share();
    let offer = server.expect("offer").await.unwrap();
    assert!(matches!(offer, SignalMessage::Offer { .. }));

    // The call stays up across rounds.
    assert_eq!(transport.close_count().await, 0);
    call.handle.hangup().await;
    let events = call.collect_until_ended().await;
    assert!(!events.iter().any(|e| matches!(e, CallEvent::Error(_))));
    assert_eq!(call.finish().await, NegotiationState::Ended);
}

#[tokio::test]
async fn test_mute_toggles_producer() {
    init_tracing();

    let room_id = room("abc123");
    let (mut call, mut server) = start_scripted(&room_id, SessionConfig::default());
    let transport = super::connect_as_initiator(&mut call, &mut server, &room_id).await;

    call.handle.set_audio_enabled(false);
    call.handle.set_video_enabled(false);
    call.handle.set_audio_enabled(true);
    assert!(
        transport
            .wait_for_call(|c| *c == TransportCall::SetTrackEnabled(TrackKind::Audio, true))
            .await
    );

    let toggles: Vec<_> = transport
        .calls()
        .await
        .into_iter()
        .filter(|c| matches!(c, TransportCall::SetTrackEnabled(..)))
        .collect();
    assert_eq!(
        toggles,
        vec![
            TransportCall::SetTrackEnabled(TrackKind::Audio, false),
            TransportCall::SetTrackEnabled(TrackKind::Video, false),
            TransportCall::SetTrackEnabled(TrackKind::Audio, true),
        ]
    );

    call.handle.hangup().await;
    assert_eq!(call.finish().await, NegotiationState::Ended);
}
