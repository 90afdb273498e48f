use crate::room::room_command::{JoinOutcome, RoomCommand, RoomSnapshot};
use crate::room::room_error::RegistryError;
use crate::room::room_registry::RoomHandle;
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use duet_core::{MemberId, Role, RoomId, RoomState, SignalMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A call never has more than two participants.
pub const ROOM_CAPACITY: usize = 2;

#[derive(Debug, Clone, Copy)]
struct Member {
    id: MemberId,
    role: Role,
}

/// Single-writer event loop owning one room's membership.
///
/// Every join, leave and relay for the room is a command on one queue, so they are
/// serialized relative to each other and relayed messages keep their send order.
pub struct Room {
    id: RoomId,
    generation: u64,
    members: Vec<Member>,
    state: RoomState,
    command_rx: mpsc::Receiver<RoomCommand>,
    signaling: Arc<dyn SignalingOutput>,
    rooms: Arc<DashMap<RoomId, RoomHandle>>,
}

impl Room {
    pub(crate) fn new(
        id: RoomId,
        generation: u64,
        command_rx: mpsc::Receiver<RoomCommand>,
        signaling: Arc<dyn SignalingOutput>,
        rooms: Arc<DashMap<RoomId, RoomHandle>>,
    ) -> Self {
        Self {
            id,
            generation,
            members: Vec::with_capacity(ROOM_CAPACITY),
            state: RoomState::Waiting,
            command_rx,
            signaling,
            rooms,
        }
    }

    pub async fn run(mut self) {
        info!("Room {} event loop started", self.id);

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;

            if self.state == RoomState::Closed {
                break;
            }
        }

        let generation = self.generation;
        self.rooms
            .remove_if(&self.id, |_, handle| handle.generation == generation);

        // Commands that raced the shutdown never observe the closed room's state.
        self.command_rx.close();
        while let Ok(cmd) = self.command_rx.try_recv() {
            self.reject(cmd);
        }

        info!("Room {} destroyed", self.id);
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { member_id, reply } => {
                let result = self.join(member_id).await;
                let _ = reply.send(result);
            }

            RoomCommand::Leave { member_id, reply } => {
                let was_member = self.leave(&member_id).await;
                let _ = reply.send(was_member);
            }

            RoomCommand::Relay {
                from,
                message,
                reply,
            } => {
                let result = self.relay(&from, message).await;
                let _ = reply.send(result);
            }

            RoomCommand::Inspect { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    async fn join(&mut self, member_id: MemberId) -> Result<JoinOutcome, RegistryError> {
        if let Some(existing) = self.members.iter().find(|m| m.id == member_id).copied() {
            debug!("Member {} re-joined room {}", member_id, self.id);
            let outcome = JoinOutcome {
                role: existing.role,
                peer_present: self.members.len() == ROOM_CAPACITY,
            };
            self.notify_joined(member_id, outcome).await;
            return Ok(outcome);
        }

        if self.members.len() >= ROOM_CAPACITY {
            warn!("Member {} rejected: room {} is full", member_id, self.id);
            self.signaling
                .send_signal(
                    &member_id,
                    SignalMessage::RoomFull {
                        room_id: self.id.clone(),
                    },
                )
                .await;
            return Err(RegistryError::RoomFull(self.id.clone()));
        }

        let role = match self.members.first() {
            Some(first) if first.role == Role::Initiator => Role::Responder,
            Some(_) => Role::Initiator,
            None => Role::for_position(0),
        };
        self.members.push(Member {
            id: member_id,
            role,
        });

        let peer = self.counterpart(&member_id);
        if self.members.len() == ROOM_CAPACITY {
            self.state = RoomState::Full;
        }
        info!(
            "Member {} joined room {} as {} ({:?})",
            member_id, self.id, role, self.state
        );

        let outcome = JoinOutcome {
            role,
            peer_present: peer.is_some(),
        };
        self.notify_joined(member_id, outcome).await;

        if let Some(peer) = peer {
            self.signaling
                .send_signal(
                    &peer.id,
                    SignalMessage::PeerJoined {
                        room_id: self.id.clone(),
                    },
                )
                .await;
        }

        Ok(outcome)
    }

    async fn leave(&mut self, member_id: &MemberId) -> bool {
        let Some(index) = self.members.iter().position(|m| &m.id == member_id) else {
            return false;
        };
        self.members.remove(index);
        info!("Member {} left room {}", member_id, self.id);

        match self.members.first().copied() {
            Some(remaining) => {
                self.state = RoomState::Waiting;
                self.signaling
                    .send_signal(
                        &remaining.id,
                        SignalMessage::PeerLeft {
                            room_id: self.id.clone(),
                        },
                    )
                    .await;
            }
            None => self.state = RoomState::Closed,
        }

        true
    }

    async fn relay(&mut self, from: &MemberId, message: SignalMessage) -> Result<(), RegistryError> {
        if !self.members.iter().any(|m| &m.id == from) {
            return Err(RegistryError::NotAMember {
                room: self.id.clone(),
                member: *from,
            });
        }

        let Some(peer) = self.counterpart(from) else {
            debug!(
                "Dropping {} from {}: no peer in room {}",
                message.kind(),
                from,
                self.id
            );
            return Err(RegistryError::PeerAbsent(self.id.clone()));
        };

        if !self.signaling.send_signal(&peer.id, message).await {
            return Err(RegistryError::PeerAbsent(self.id.clone()));
        }
        Ok(())
    }

    fn reject(&self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { reply, .. } => {
                let _ = reply.send(Err(RegistryError::RoomClosed(self.id.clone())));
            }
            RoomCommand::Leave { reply, .. } => {
                let _ = reply.send(false);
            }
            RoomCommand::Relay { reply, .. } => {
                let _ = reply.send(Err(RegistryError::RoomNotFound(self.id.clone())));
            }
            RoomCommand::Inspect { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    async fn notify_joined(&self, member_id: MemberId, outcome: JoinOutcome) {
        self.signaling
            .send_signal(
                &member_id,
                SignalMessage::Joined {
                    room_id: self.id.clone(),
                    role: outcome.role,
                    peer_present: outcome.peer_present,
                },
            )
            .await;
    }

    fn counterpart(&self, member_id: &MemberId) -> Option<Member> {
        self.members.iter().find(|m| &m.id != member_id).copied()
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            state: self.state,
            members: self.members.iter().map(|m| (m.id, m.role)).collect(),
        }
    }
}
