//! Headless predictive client
//!
//! The local ship is simulated with the shared rules at a fixed 60 Hz step.
//! Server messages overwrite local state (points, invincibility, destruction)
//! as they arrive; there is no rollback.

use std::collections::{HashMap, HashSet};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::collision::{bounce_ball_off_walls, resolve_hazards, stick_balls, Fatal, Opponent};
use crate::game::level::LevelData;
use crate::game::physics::{Controls, Ship};
use crate::game::race::RaceSystem;
use crate::game::scoring::MatchRules;
use crate::util::time::{FrameClock, FRAME_MS};
use crate::ws::protocol::{ClientMsg, PlayerView, ServerMsg, Winner};

use super::remote::RemotePlayer;

/// Minimum gap between two `position-update` messages
pub const POSITION_INTERVAL_MS: u64 = 50;

/// What the client believes the room is doing
#[derive(Debug, Clone, PartialEq)]
pub enum ClientPhase {
    /// Connected, no match or countdown
    Waiting,
    /// Free flight before the final countdown
    PreMatch { countdown: u32 },
    /// Final countdown; controls are locked
    Countdown { countdown: u32 },
    Playing,
    Celebration { winners: Vec<Winner> },
}

impl ClientPhase {
    fn controls_enabled(&self) -> bool {
        matches!(self, ClientPhase::Waiting | ClientPhase::PreMatch { .. } | ClientPhase::Playing)
    }
}

pub struct ClientSession {
    id: Option<Uuid>,
    color: String,
    ship: Ship,
    controls: Controls,
    level: LevelData,
    race: RaceSystem,
    remotes: HashMap<Uuid, RemotePlayer>,
    phase: ClientPhase,
    /// Set while the local ship is a wreck; the inner id is the destroyer
    destroyed_by: Option<Option<Uuid>>,
    /// Targets already reported as destroyed since they last respawned
    reported_kills: HashSet<Uuid>,
    clock: FrameClock,
    rng: ChaCha8Rng,
    now_ms: u64,
    last_position_sent: Option<u64>,
    latency_ms: Option<u64>,
    outbox: Vec<ClientMsg>,
}

impl ClientSession {
    /// A session over a bare arena until the server sends a level
    pub fn new(width: f64, height: f64, seed: u64) -> Self {
        let level = LevelData::empty(width, height);
        let (x, y) = level.center();
        let ship = Ship::new(x, y);
        let mut race = RaceSystem::new(MatchRules::default().match_duration_ms, seed);
        race.set_level(&level, true);

        Self {
            id: None,
            color: ship.color.clone(),
            ship,
            controls: Controls::default(),
            level,
            race,
            remotes: HashMap::new(),
            phase: ClientPhase::Waiting,
            destroyed_by: None,
            reported_kills: HashSet::new(),
            clock: FrameClock::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            now_ms: 0,
            last_position_sent: None,
            latency_ms: None,
            outbox: Vec::new(),
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn ship(&self) -> &Ship {
        &self.ship
    }

    pub fn level(&self) -> &LevelData {
        &self.level
    }

    pub fn race(&self) -> &RaceSystem {
        &self.race
    }

    pub fn phase(&self) -> &ClientPhase {
        &self.phase
    }

    pub fn points(&self) -> u32 {
        self.race.points()
    }

    pub fn remote(&self, id: &Uuid) -> Option<&RemotePlayer> {
        self.remotes.get(id)
    }

    pub fn remotes(&self) -> impl Iterator<Item = &RemotePlayer> {
        self.remotes.values()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed_by.is_some()
    }

    /// Who destroyed the local ship, when another player did
    pub fn destroyed_by(&self) -> Option<Uuid> {
        self.destroyed_by.flatten()
    }

    pub fn latency_ms(&self) -> Option<u64> {
        self.latency_ms
    }

    pub fn set_controls(&mut self, controls: Controls) {
        self.controls = controls;
    }

    /// Ask for a countdown; only meaningful while nothing is running
    pub fn request_game_start(&mut self) -> bool {
        if self.phase != ClientPhase::Waiting {
            return false;
        }
        self.outbox.push(ClientMsg::RequestGameStart);
        true
    }

    /// Rebuild a destroyed ship at the spawn point
    pub fn respawn(&mut self) -> bool {
        if !self.is_destroyed() {
            return false;
        }
        self.reset_ship();
        self.destroyed_by = None;
        self.outbox.push(ClientMsg::Respawn);
        info!("Respawned");
        true
    }

    pub fn ping(&mut self) {
        self.outbox.push(ClientMsg::Ping { t: self.now_ms });
    }

    /// Apply one server message
    pub fn apply(&mut self, msg: ServerMsg) {
        match msg {
            ServerMsg::Init {
                id,
                players,
                color,
                game_in_progress,
                celebration_active,
                level_data,
                ..
            } => {
                info!(player_id = %id, players = players.len(), "Joined room");
                self.id = Some(id);
                self.color = color;
                for view in players.iter().filter(|p| p.id != id) {
                    self.add_remote(view);
                }
                if let Some(level) = level_data {
                    // Layout follows the level seed, so this matches every peer
                    self.race.set_level(&level, true);
                    self.level = level;
                }
                self.reset_ship();

                if game_in_progress {
                    self.race.start_game(None);
                    self.phase = ClientPhase::Playing;
                } else if celebration_active {
                    self.phase = ClientPhase::Celebration { winners: Vec::new() };
                }
            }
            ServerMsg::PlayerJoined(view) => {
                if Some(view.id) != self.id {
                    debug!(player_id = %view.id, "Remote player joined");
                    self.add_remote(&view);
                }
            }
            ServerMsg::PlayerLeft { id } => {
                self.remotes.remove(&id);
                self.reported_kills.remove(&id);
            }
            ServerMsg::PlayerMoved {
                id,
                x,
                y,
                rotation,
                vx,
                vy,
                invincible,
            } => {
                if let Some(remote) = self.remotes.get_mut(&id) {
                    remote.set_target(x, y, rotation, vx, vy);
                    remote.invincible = invincible;
                }
            }
            ServerMsg::PlayerPoints { id, points } => {
                if Some(id) == self.id {
                    self.race.set_points(points);
                } else if let Some(remote) = self.remotes.get_mut(&id) {
                    remote.points = points;
                }
            }
            ServerMsg::PointsEarned { amount, total, reason } => {
                debug!(amount, total, ?reason, "Points changed");
                self.race.set_points(total);
            }
            ServerMsg::ShipDestroyed { destroyer_id } => {
                info!(destroyer_id = %destroyer_id, "Ship destroyed");
                self.destroyed_by = Some(Some(destroyer_id));
            }
            ServerMsg::CountdownStart { countdown, is_pre_match }
            | ServerMsg::CountdownUpdate { countdown, is_pre_match } => {
                self.phase = if is_pre_match {
                    ClientPhase::PreMatch { countdown }
                } else {
                    ClientPhase::Countdown { countdown }
                };
            }
            ServerMsg::FinalCountdownStart { countdown } => {
                self.phase = ClientPhase::Countdown { countdown };
            }
            ServerMsg::GameStart {
                match_duration,
                level_data,
            } => {
                info!(seed = level_data.seed, match_duration, "Match started");
                self.race.set_level(&level_data, true);
                self.level = level_data;
                self.race.start_game(Some(match_duration));
                for remote in self.remotes.values_mut() {
                    remote.points = 0;
                }
                self.reset_ship();
                self.destroyed_by = None;
                self.reported_kills.clear();
                self.phase = ClientPhase::Playing;
            }
            ServerMsg::TimeUpdate { time_remaining } => {
                self.race.update_time_remaining(time_remaining);
            }
            ServerMsg::GameEnd { winners } => {
                info!(winners = winners.len(), "Match ended");
                self.race.reset();
                self.phase = ClientPhase::Celebration { winners };
            }
            ServerMsg::GameStopped { message } => {
                info!(%message, "Match stopped");
                self.race.reset();
                self.phase = ClientPhase::Waiting;
            }
            ServerMsg::InvincibilityEnded => {
                self.ship.clear_invincibility();
            }
            ServerMsg::PlayerInvincibility { id, invincible } => {
                if Some(id) == self.id {
                    self.ship.invincible = invincible;
                } else if let Some(remote) = self.remotes.get_mut(&id) {
                    remote.invincible = invincible;
                    if invincible {
                        // A fresh ship can be destroyed again once this wears off
                        self.reported_kills.remove(&id);
                    }
                }
            }
            ServerMsg::Pong { t } => {
                self.latency_ms = Some(self.now_ms.saturating_sub(t));
            }
            ServerMsg::Error { code, message } => {
                warn!(%code, %message, "Server rejected a message");
            }
        }
    }

    /// Advance to `now_ms` after `delta_ms` of wall time and collect the
    /// messages to send
    pub fn tick(&mut self, now_ms: u64, delta_ms: f64) -> Vec<ClientMsg> {
        self.now_ms = now_ms;

        for _ in 0..self.clock.advance(delta_ms) {
            self.step_frame();
        }

        if self.id.is_some() && !self.is_destroyed() {
            let due = self
                .last_position_sent
                .map_or(true, |sent| now_ms.saturating_sub(sent) >= POSITION_INTERVAL_MS);
            if due {
                self.last_position_sent = Some(now_ms);
                self.outbox.push(ClientMsg::PositionUpdate {
                    x: self.ship.x,
                    y: self.ship.y,
                    rotation: self.ship.rotation,
                    vx: self.ship.vx,
                    vy: self.ship.vy,
                });
            }
        }

        std::mem::take(&mut self.outbox)
    }

    /// One fixed simulation frame
    fn step_frame(&mut self) {
        let now = self.now_ms;
        for remote in self.remotes.values_mut() {
            remote.update(FRAME_MS);
        }

        if self.is_destroyed() {
            return;
        }

        self.ship.controls = if self.phase.controls_enabled() {
            self.controls
        } else {
            Controls::default()
        };
        self.ship.update();
        self.ship.update_trail(now, &mut self.rng);

        bounce_ball_off_walls(&mut self.ship.ball, &self.level.segments, &mut self.rng);
        self.ship.ball.update_stick(now);

        let playing = self.phase == ClientPhase::Playing;
        let opponents: Vec<Opponent<'_, Uuid>> = if playing {
            self.remotes
                .values()
                .map(|r| Opponent {
                    id: r.id,
                    ship: r,
                    ball: &r.ball,
                    invincible: r.invincible,
                })
                .collect()
        } else {
            Vec::new()
        };

        for opponent in &opponents {
            if stick_balls(&mut self.ship.ball, opponent.ball, now) {
                break;
            }
        }

        let report = resolve_hazards(&mut self.ship, &self.level.segments, &opponents);

        if playing {
            for target_id in report.ball_kills {
                if self.reported_kills.insert(target_id) {
                    debug!(target_id = %target_id, "Ball struck a ship");
                    self.outbox.push(ClientMsg::DestroyShip { target_id });
                }
            }
        }

        if let Some(fatal) = report.fatal {
            debug!(?fatal, "Local ship lost");
            // Every loss is reported so the server accepts the respawn
            if playing && matches!(fatal, Fatal::Wall | Fatal::Ship(_)) {
                self.outbox.push(ClientMsg::Collision);
            } else {
                self.outbox.push(ClientMsg::ShipLost);
            }
            self.destroyed_by = Some(match fatal {
                Fatal::Ship(id) | Fatal::Ball(id) => Some(id),
                Fatal::Wall | Fatal::OwnBall => None,
            });
            return;
        }

        if let Some(reached) = self.race.update(&self.ship) {
            debug!(checkpoint = reached.number, points = reached.points, "Checkpoint reached");
            self.outbox.push(ClientMsg::PointUpdate { points: reached.points });
        }
    }

    fn add_remote(&mut self, view: &PlayerView) {
        self.remotes.insert(view.id, RemotePlayer::new(view));
    }

    fn reset_ship(&mut self) {
        let (x, y) = self.level.center();
        self.ship = Ship::new(x, y);
        self.ship.color = self.color.clone();
    }
}
