use std::time::Duration;

use duet_client::{CallEvent, SessionConfig};
use duet_core::{NegotiationState, Role, SignalMessage};

use crate::integration::{CallHarness, init_tracing, room, start_scripted};
use crate::utils::{MockMediaSource, MockTransportFactory, scripted_link};

#[tokio::test]
async fn test_hangup_is_idempotent() {
    init_tracing();

    let room_id = room("abc123");
    let (mut call, mut server) = start_scripted(&room_id, SessionConfig::default());
    server.expect("join").await.unwrap();
    server
        .send(&SignalMessage::Joined {
            room_id: room_id.clone(),
            role: Role::Initiator,
            peer_present: false,
        })
        .unwrap();
    let transport = call.transports.wait_for_transport().await.unwrap();

    tokio::join!(call.handle.hangup(), call.handle.hangup());
    call.handle.hangup().await;

    let events = call.collect_until_ended().await;
    assert!(matches!(
        events.last(),
        Some(CallEvent::Ended {
            state: NegotiationState::Ended,
            elapsed: None
        })
    ));

    let handle = call.handle.clone();
    let media = call.media.clone();
    let mut events = std::mem::replace(&mut call.events, tokio::sync::mpsc::unbounded_channel().1);
    assert_eq!(call.finish().await, NegotiationState::Ended);

    // Exactly one Ended, one close, one leave.
    assert!(events.recv().await.is_none());
    assert_eq!(transport.close_count().await, 1);
    assert_eq!(server.drain_kinds().await.unwrap(), vec!["leave"]);
    assert_eq!(media.released().await.len(), 2);

    assert!(!handle.is_active());
    handle.hangup().await;
}

#[tokio::test(start_paused = true)]
async fn test_hangup_during_media_acquisition() {
    init_tracing();

    let room_id = room("abc123");
    let (link, mut server) = scripted_link();
    let mut call = CallHarness::start(
        &room_id,
        SessionConfig::default(),
        link,
        MockMediaSource::with_delay(Duration::from_secs(3)),
        MockTransportFactory::new(),
    );

    server.expect("join").await.unwrap();
    server
        .send(&SignalMessage::Joined {
            room_id: room_id.clone(),
            role: Role::Initiator,
            peer_present: false,
        })
        .unwrap();
    call.expect_event(|e| matches!(e, CallEvent::Joined { .. }))
        .await;

    call.handle.hangup().await;
    let events = call.collect_until_ended().await;
    assert_eq!(
        events.last(),
        Some(&CallEvent::Ended {
            state: NegotiationState::Ended,
            elapsed: None
        })
    );

    let media = call.media.clone();
    let transports = call.transports.clone();
    assert_eq!(call.finish().await, NegotiationState::Ended);
    assert_eq!(media.acquisitions(), 1);

    // The acquisition completes after teardown: its tracks are stopped, never attached.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(media.released().await, vec!["audio-1", "video-1"]);
    assert_eq!(transports.created_count().await, 0);
    assert_eq!(server.drain_kinds().await.unwrap(), vec!["leave"]);
}
