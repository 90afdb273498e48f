use crate::AppState;
use crate::signaling::SignalingChannel;
use duet_core::MemberId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// In-process signaling connection carrying the same JSON frames as the socket.
///
/// Dropping `to_server` closes the connection, which implies a leave.
pub struct LocalConnection {
    pub member_id: MemberId,
    pub to_server: mpsc::UnboundedSender<String>,
    pub from_server: mpsc::UnboundedReceiver<String>,
}

pub fn connect_local(state: &Arc<AppState>) -> LocalConnection {
    let member_id = MemberId::new();
    let (to_server, mut server_rx) = mpsc::unbounded_channel::<String>();
    let (client_tx, from_server) = mpsc::unbounded_channel::<String>();

    let mut channel = SignalingChannel::open(
        member_id,
        state.signaling.clone(),
        state.registry.clone(),
        client_tx,
    );

    tokio::spawn(async move {
        info!("New local connection: {}", member_id);
        while let Some(text) = server_rx.recv().await {
            channel.handle_text(&text).await;
        }
        channel.close().await;
    });

    LocalConnection {
        member_id,
        to_server,
        from_server,
    }
}
