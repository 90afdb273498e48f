use crate::AppState;
use crate::signaling::SignalingChannel;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use duet_core::MemberId;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let member_id = MemberId::new();

    ws.on_upgrade(move |socket| handle_socket(socket, member_id, state))
}

async fn handle_socket(socket: WebSocket, member_id: MemberId, state: Arc<AppState>) {
    info!("New WebSocket connection: {}", member_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let mut channel = SignalingChannel::open(
        member_id,
        state.signaling.clone(),
        state.registry.clone(),
        tx,
    );

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut send_task => break,
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => channel.handle_text(text.as_str()).await,
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    send_task.abort();
    channel.close().await;
    info!("WebSocket disconnected: {}", member_id);
}
