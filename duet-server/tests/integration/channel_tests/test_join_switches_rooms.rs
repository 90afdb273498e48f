use duet_core::{RoomState, SignalMessage};

use crate::integration::{create_test_state, init_tracing, room};
use crate::utils::TestClient;

async fn join(client: &mut TestClient, room_id: &duet_core::RoomId) {
    client
        .send(&SignalMessage::Join { room_id: room_id.clone() })
        .unwrap();
    client.expect("joined").await.unwrap();
}

#[tokio::test]
async fn test_rejected_join_keeps_current_room() {
    init_tracing();

    let state = create_test_state();
    let home = room("home12");
    let full = room("full34");

    let mut a = TestClient::connect(&state).await.unwrap();
    let mut b = TestClient::connect(&state).await.unwrap();
    let mut c = TestClient::connect(&state).await.unwrap();
    let mut d = TestClient::connect(&state).await.unwrap();

    join(&mut a, &home).await;
    join(&mut b, &home).await;
    a.expect("peer_joined").await.unwrap();
    join(&mut c, &full).await;
    join(&mut d, &full).await;

    a.send(&SignalMessage::Join { room_id: full.clone() }).unwrap();
    assert_eq!(
        a.recv().await.unwrap(),
        SignalMessage::RoomFull {
            room_id: full.clone()
        }
    );

    let snapshot = state.registry.snapshot(&home).await.unwrap();
    assert_eq!(snapshot.state, RoomState::Full);
    assert!(snapshot.members.iter().any(|(id, _)| *id == a.member_id));
    b.expect_silence(100).await.unwrap();

    // Still paired: relays between a and b keep flowing.
    b.send(&SignalMessage::Renegotiate { room_id: home.clone() })
        .unwrap();
    assert_eq!(
        a.expect("renegotiate").await.unwrap(),
        SignalMessage::Renegotiate { room_id: home }
    );
}

#[tokio::test]
async fn test_accepted_join_leaves_previous_room() {
    init_tracing();

    let state = create_test_state();
    let home = room("home56");
    let next = room("next78");

    let mut a = TestClient::connect(&state).await.unwrap();
    let mut b = TestClient::connect(&state).await.unwrap();

    join(&mut a, &home).await;
    join(&mut b, &home).await;

    join(&mut a, &next).await;
    assert_eq!(
        b.expect("peer_left").await.unwrap(),
        SignalMessage::PeerLeft {
            room_id: home.clone()
        }
    );

    let snapshot = state.registry.snapshot(&home).await.unwrap();
    let members: Vec<_> = snapshot.members.iter().map(|(id, _)| *id).collect();
    assert_eq!(members, vec![b.member_id]);
}
