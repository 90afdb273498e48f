use crate::room::{JoinOutcome, RegistryError, Room, RoomCommand, RoomSnapshot};
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use duet_core::{MemberId, RoomId, SignalMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

const DEFAULT_COMMAND_BUFFER: usize = 100;

/// Attempts made when a join races the shutdown of the room it targeted.
const JOIN_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub(crate) struct RoomHandle {
    pub(crate) generation: u64,
    tx: mpsc::Sender<RoomCommand>,
}

/// Table of active rooms. Each entry is the command queue of a room event loop;
/// rooms are created on first join and remove themselves once empty.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<DashMap<RoomId, RoomHandle>>,
    signaling: Arc<dyn SignalingOutput>,
    next_generation: Arc<AtomicU64>,
    command_buffer: usize,
}

impl RoomRegistry {
    pub fn new(signaling: Arc<dyn SignalingOutput>) -> Self {
        Self::with_command_buffer(signaling, DEFAULT_COMMAND_BUFFER)
    }

    pub fn with_command_buffer(signaling: Arc<dyn SignalingOutput>, command_buffer: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            signaling,
            next_generation: Arc::new(AtomicU64::new(0)),
            command_buffer: command_buffer.max(1),
        }
    }

    pub async fn join(
        &self,
        room_id: &RoomId,
        member_id: MemberId,
    ) -> Result<JoinOutcome, RegistryError> {
        for _ in 0..JOIN_ATTEMPTS {
            let handle = self.room_handle(room_id);
            let (reply, rx) = oneshot::channel();

            let sent = handle
                .tx
                .send(RoomCommand::Join { member_id, reply })
                .await;
            let result = match sent {
                Ok(()) => rx
                    .await
                    .unwrap_or_else(|_| Err(RegistryError::RoomClosed(room_id.clone()))),
                Err(_) => Err(RegistryError::RoomClosed(room_id.clone())),
            };

            match result {
                Err(RegistryError::RoomClosed(_)) => {
                    warn!("Room {} closed during join, retrying", room_id);
                    self.rooms
                        .remove_if(room_id, |_, h| h.generation == handle.generation);
                }
                other => return other,
            }
        }

        Err(RegistryError::RoomClosed(room_id.clone()))
    }

    /// Returns whether `member_id` was a member of the room.
    pub async fn leave(&self, room_id: &RoomId, member_id: MemberId) -> bool {
        let Some(tx) = self.existing_sender(room_id) else {
            return false;
        };
        let (reply, rx) = oneshot::channel();
        if tx
            .send(RoomCommand::Leave { member_id, reply })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Forward `message` to the other member of the room. Dropped, never queued, on error.
    pub async fn relay(
        &self,
        room_id: &RoomId,
        from: MemberId,
        message: SignalMessage,
    ) -> Result<(), RegistryError> {
        let not_found = || RegistryError::RoomNotFound(room_id.clone());

        let tx = self.existing_sender(room_id).ok_or_else(not_found)?;
        let (reply, rx) = oneshot::channel();
        tx.send(RoomCommand::Relay {
            from,
            message,
            reply,
        })
        .await
        .map_err(|_| not_found())?;

        rx.await.unwrap_or_else(|_| Err(not_found()))
    }

    pub async fn snapshot(&self, room_id: &RoomId) -> Option<RoomSnapshot> {
        let tx = self.existing_sender(room_id)?;
        let (reply, rx) = oneshot::channel();
        tx.send(RoomCommand::Inspect { reply }).await.ok()?;
        rx.await.ok()
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn existing_sender(&self, room_id: &RoomId) -> Option<mpsc::Sender<RoomCommand>> {
        self.rooms.get(room_id).map(|handle| handle.tx.clone())
    }

    fn room_handle(&self, room_id: &RoomId) -> RoomHandle {
        self.rooms
            .entry(room_id.clone())
            .or_insert_with(|| self.spawn_room(room_id))
            .clone()
    }

    fn spawn_room(&self, room_id: &RoomId) -> RoomHandle {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        info!("Creating new room: {} (generation {})", room_id, generation);

        let (tx, rx) = mpsc::channel(self.command_buffer);
        let room = Room::new(
            room_id.clone(),
            generation,
            rx,
            self.signaling.clone(),
            self.rooms.clone(),
        );
        tokio::spawn(room.run());

        RoomHandle { generation, tx }
    }
}
