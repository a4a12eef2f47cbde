//! The room task: owns the match controller and drives its clock

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::util::time::{unix_millis, ROOM_TICK_HZ};

use super::r#match::{MatchController, Outbound};
use super::PlayerInput;

const COMMAND_BUFFER: usize = 1024;
const OUTBOUND_BUFFER: usize = 256;

/// Requests handled by the room task
#[derive(Debug)]
pub enum RoomCommand {
    Join { player_id: Uuid },
    Leave { player_id: Uuid },
    Input(PlayerInput),
    AdminStop { message: String, reply: oneshot::Sender<bool> },
    AdminStart { reply: oneshot::Sender<bool> },
}

/// Room summary published for the health route
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    pub phase: &'static str,
    pub players: usize,
    /// Milliseconds, while a match is running
    pub time_remaining: Option<u64>,
}

/// Handle to the running room
#[derive(Clone)]
pub struct RoomHandle {
    pub commands: mpsc::Sender<RoomCommand>,
    pub outbound: broadcast::Sender<Arc<Outbound>>,
    pub status: Arc<RwLock<RoomStatus>>,
}

impl RoomHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Outbound>> {
        self.outbound.subscribe()
    }

    pub fn status(&self) -> RoomStatus {
        self.status.read().clone()
    }
}

/// The single authoritative room
pub struct Room {
    controller: MatchController,
    commands_rx: mpsc::Receiver<RoomCommand>,
    outbound_tx: broadcast::Sender<Arc<Outbound>>,
    status: Arc<RwLock<RoomStatus>>,
}

impl Room {
    pub fn new(controller: MatchController) -> (Self, RoomHandle) {
        let (commands, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (outbound_tx, _) = broadcast::channel(OUTBOUND_BUFFER);
        let status = Arc::new(RwLock::new(RoomStatus {
            phase: controller.phase().name(),
            ..Default::default()
        }));

        let handle = RoomHandle {
            commands,
            outbound: outbound_tx.clone(),
            status: status.clone(),
        };

        let room = Self {
            controller,
            commands_rx,
            outbound_tx,
            status,
        };

        (room, handle)
    }

    /// Run until every command sender is dropped
    pub async fn run(mut self) {
        info!(seed = self.controller.level().seed, "Room started");

        let mut tick = interval(Duration::from_millis(1000 / ROOM_TICK_HZ));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let out = self.controller.advance(unix_millis());
                    self.publish(out);
                }
                command = self.commands_rx.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    self.handle_command(command);
                }
            }
        }

        info!("Room stopped");
    }

    fn handle_command(&mut self, command: RoomCommand) {
        let now = unix_millis();
        match command {
            RoomCommand::Join { player_id } => {
                let out = self.controller.player_joined(player_id, now);
                self.publish(out);
            }
            RoomCommand::Leave { player_id } => {
                let out = self.controller.player_left(player_id, now);
                self.publish(out);
            }
            RoomCommand::Input(input) => {
                let out = self.controller.handle(input.player_id, input.msg, input.received_at);
                self.publish(out);
            }
            RoomCommand::AdminStop { message, reply } => {
                let (stopped, out) = self.controller.admin_stop(&message);
                self.publish(out);
                let _ = reply.send(stopped);
            }
            RoomCommand::AdminStart { reply } => {
                let (started, out) = self.controller.admin_start(now);
                self.publish(out);
                let _ = reply.send(started);
            }
        }
    }

    /// Refresh the status snapshot, then fan the messages out
    fn publish(&mut self, out: Vec<Outbound>) {
        {
            let mut status = self.status.write();
            status.phase = self.controller.phase().name();
            status.players = self.controller.player_count();
            status.time_remaining = self.controller.time_remaining(unix_millis());
        }

        for outbound in out {
            // No subscribers is fine: the room may be empty
            if self.outbound_tx.send(Arc::new(outbound)).is_err() {
                debug!("No session listening");
            }
        }
    }
}
