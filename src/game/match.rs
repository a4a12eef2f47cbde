//! Match lifecycle, scoring and player bookkeeping
//!
//! The controller never reads a clock. Every entry point takes `now` in unix
//! milliseconds and pending work is stored as deadlines inside [`MatchPhase`],
//! so replacing the phase cancels whatever was scheduled.

use std::collections::HashMap;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ws::protocol::{ClientMsg, PointsReason, ServerMsg, Winner};

use super::level::{LevelData, LevelGenerator};
use super::scoring::{apply_penalty, timeout_winners, MatchRules, CHECKPOINT_POINTS, DESTROY_POINTS, CRASH_PENALTY};
use super::snapshot;

/// Player colours, assigned by join order
pub const PLAYER_COLORS: [&str; 10] = [
    "#e74c3c", "#3498db", "#2ecc71", "#f1c40f", "#9b59b6", "#1abc9c", "#e67e22", "#34495e", "#d35400",
    "#27ae60",
];

const SECOND_MS: u64 = 1000;

/// Match phase with its pending deadlines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Waiting for players
    Idle { auto_start_at: Option<u64> },
    /// Free-fly countdown
    PreMatch { remaining: u32, next_tick_at: u64 },
    /// Announced countdown to zero
    FinalCountdown { remaining: u32, next_tick_at: u64 },
    /// Countdown hit zero, "GO!" on screen
    Launching { start_at: u64 },
    /// Match in progress
    Active { started_at: u64, ends_at: u64, next_time_update_at: u64 },
    /// Winners on screen
    Celebration { until: u64 },
}

impl MatchPhase {
    pub fn name(&self) -> &'static str {
        match self {
            MatchPhase::Idle { .. } => "idle",
            MatchPhase::PreMatch { .. } => "pre-match",
            MatchPhase::FinalCountdown { .. } => "final-countdown",
            MatchPhase::Launching { .. } => "launching",
            MatchPhase::Active { .. } => "active",
            MatchPhase::Celebration { .. } => "celebration",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, MatchPhase::Active { .. })
    }

    pub fn is_countdown(&self) -> bool {
        matches!(
            self,
            MatchPhase::PreMatch { .. } | MatchPhase::FinalCountdown { .. } | MatchPhase::Launching { .. }
        )
    }

    pub fn is_celebration(&self) -> bool {
        matches!(self, MatchPhase::Celebration { .. })
    }

    fn next_deadline(&self) -> Option<u64> {
        match *self {
            MatchPhase::Idle { auto_start_at } => auto_start_at,
            MatchPhase::PreMatch { next_tick_at, .. } => Some(next_tick_at),
            MatchPhase::FinalCountdown { next_tick_at, .. } => Some(next_tick_at),
            MatchPhase::Launching { start_at } => Some(start_at),
            MatchPhase::Active {
                ends_at,
                next_time_update_at,
                ..
            } => Some(ends_at.min(next_time_update_at)),
            MatchPhase::Celebration { until } => Some(until),
        }
    }
}

/// Who an outbound message is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    All,
    AllExcept(Uuid),
    Player(Uuid),
}

impl Recipient {
    pub fn includes(&self, id: Uuid) -> bool {
        match *self {
            Recipient::All => true,
            Recipient::AllExcept(excluded) => excluded != id,
            Recipient::Player(target) => target == id,
        }
    }
}

/// An addressed server message
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: Recipient,
    pub msg: ServerMsg,
}

impl Outbound {
    fn all(msg: ServerMsg) -> Self {
        Self { to: Recipient::All, msg }
    }

    fn except(id: Uuid, msg: ServerMsg) -> Self {
        Self {
            to: Recipient::AllExcept(id),
            msg,
        }
    }

    fn to(id: Uuid, msg: ServerMsg) -> Self {
        Self {
            to: Recipient::Player(id),
            msg,
        }
    }
}

/// Server-side record of a connected player
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    /// Join order, for stable listings
    pub seq: u64,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub vx: f64,
    pub vy: f64,
    pub points: u32,
    pub invincible_until: Option<u64>,
    /// Destroyed and not yet respawned
    pub destroyed: bool,
    /// Someone was already credited with destroying this life
    pub destroy_credited: bool,
}

impl PlayerRecord {
    pub fn is_invincible(&self) -> bool {
        self.invincible_until.is_some()
    }
}

/// Authoritative match state (owned by the room task)
pub struct MatchController {
    rules: MatchRules,
    generator: LevelGenerator,
    phase: MatchPhase,
    players: HashMap<Uuid, PlayerRecord>,
    level: LevelData,
    next_seq: u64,
    /// Cleared by an operator stop; blocks automatic countdowns
    auto_start: bool,
}

impl MatchController {
    pub fn new(rules: MatchRules, generator: LevelGenerator, seed: u64) -> Self {
        let level = generator.generate(seed);
        Self {
            rules,
            generator,
            phase: MatchPhase::Idle { auto_start_at: None },
            players: HashMap::new(),
            level,
            next_seq: 0,
            auto_start: true,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn level(&self) -> &LevelData {
        &self.level
    }

    pub fn player(&self, id: &Uuid) -> Option<&PlayerRecord> {
        self.players.get(id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Milliseconds left in the running match
    pub fn time_remaining(&self, now: u64) -> Option<u64> {
        match self.phase {
            MatchPhase::Active { ends_at, .. } => Some(ends_at.saturating_sub(now)),
            _ => None,
        }
    }

    fn spawn_point(&self) -> (f64, f64) {
        self.level.center()
    }

    /// Register a new connection
    pub fn player_joined(&mut self, id: Uuid, now: u64) -> Vec<Outbound> {
        let mut out = Vec::new();
        if self.players.contains_key(&id) {
            warn!(player_id = %id, "Player already registered");
            return out;
        }

        let index = self.players.len();
        let (x, y) = self.spawn_point();
        let mut record = PlayerRecord {
            id,
            name: format!("Player {}", index + 1),
            color: PLAYER_COLORS[index % PLAYER_COLORS.len()].to_string(),
            seq: self.next_seq,
            x,
            y,
            rotation: 0.0,
            vx: 0.0,
            vy: 0.0,
            points: 0,
            invincible_until: None,
            destroyed: false,
            destroy_credited: false,
        };
        self.next_seq += 1;

        // Joining mid-match gets the same protection as a respawn
        if self.phase.is_active() {
            record.invincible_until = Some(now + self.rules.invincibility_ms);
        }

        let color = record.color.clone();
        let view = snapshot::player_view(&record);
        self.players.insert(id, record);

        info!(player_id = %id, players = self.players.len(), phase = self.phase.name(), "Player joined");

        out.push(Outbound::to(
            id,
            ServerMsg::Init {
                id,
                players: snapshot::roster(self.players.values()),
                color,
                game_in_progress: self.phase.is_active(),
                countdown_active: self.phase.is_countdown(),
                celebration_active: self.phase.is_celebration(),
                level_data: Some(self.level.clone()),
            },
        ));
        out.push(Outbound::except(id, ServerMsg::PlayerJoined(view)));

        match self.phase {
            MatchPhase::PreMatch { remaining, .. } => out.push(Outbound::to(
                id,
                ServerMsg::CountdownStart {
                    countdown: remaining,
                    is_pre_match: true,
                },
            )),
            MatchPhase::FinalCountdown { remaining, .. } => out.push(Outbound::to(
                id,
                ServerMsg::CountdownStart {
                    countdown: remaining,
                    is_pre_match: false,
                },
            )),
            MatchPhase::Idle { auto_start_at: None } if self.auto_start => {
                self.phase = MatchPhase::Idle {
                    auto_start_at: Some(now + self.rules.auto_start_delay_ms),
                };
            }
            _ => {}
        }

        out
    }

    /// Drop a connection; an empty room goes back to idle
    pub fn player_left(&mut self, id: Uuid, now: u64) -> Vec<Outbound> {
        let mut out = Vec::new();
        if self.players.remove(&id).is_none() {
            return out;
        }

        info!(player_id = %id, players = self.players.len(), "Player left");
        out.push(Outbound::all(ServerMsg::PlayerLeft { id }));

        if self.players.is_empty() {
            info!(phase = self.phase.name(), "Room empty, resetting to idle");
            self.phase = MatchPhase::Idle { auto_start_at: None };
        } else {
            self.check_win(now, &mut out);
        }

        out
    }

    /// Apply one client message
    pub fn handle(&mut self, id: Uuid, msg: ClientMsg, now: u64) -> Vec<Outbound> {
        let mut out = Vec::new();
        if !self.players.contains_key(&id) {
            debug!(player_id = %id, "Message from unknown player");
            return out;
        }

        match msg {
            ClientMsg::PositionUpdate { x, y, rotation, vx, vy } => {
                self.handle_position(id, [x, y, rotation, vx, vy], &mut out);
            }
            ClientMsg::PointUpdate { points } => self.handle_point_update(id, points, now, &mut out),
            ClientMsg::Collision => self.handle_collision(id, now, &mut out),
            ClientMsg::ShipLost => {
                if let Some(player) = self.players.get_mut(&id) {
                    debug!(player_id = %id, "Ship lost");
                    player.destroyed = true;
                }
            }
            ClientMsg::DestroyShip { target_id } => self.handle_destroy(id, target_id, now, &mut out),
            ClientMsg::RequestGameStart => {
                if matches!(self.phase, MatchPhase::Idle { .. }) {
                    info!(player_id = %id, "Game start requested");
                    self.auto_start = true;
                    self.start_pre_match(now, &mut out);
                }
            }
            ClientMsg::Respawn => self.handle_respawn(id, now, &mut out),
            ClientMsg::Ping { t } => out.push(Outbound::to(id, ServerMsg::Pong { t })),
        }

        out
    }

    fn handle_position(&mut self, id: Uuid, values: [f64; 5], out: &mut Vec<Outbound>) {
        if values.iter().any(|v| !v.is_finite()) {
            warn!(player_id = %id, "Non-finite position update dropped");
            return;
        }
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };

        let [x, y, rotation, vx, vy] = values;
        player.x = x;
        player.y = y;
        player.rotation = rotation;
        player.vx = vx;
        player.vy = vy;

        out.push(Outbound::except(
            id,
            ServerMsg::PlayerMoved {
                id,
                x,
                y,
                rotation,
                vx,
                vy,
                invincible: player.is_invincible(),
            },
        ));
    }

    /// Checkpoint progress reported by the client
    ///
    /// Last write wins, but a single update may raise the total by at most
    /// one checkpoint.
    fn handle_point_update(&mut self, id: Uuid, points: u32, now: u64, out: &mut Vec<Outbound>) {
        if !self.phase.is_active() {
            debug!(player_id = %id, "Point update outside a match ignored");
            return;
        }
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };

        if points > player.points + CHECKPOINT_POINTS {
            warn!(player_id = %id, claimed = points, current = player.points, "Implausible point update dropped");
            return;
        }

        player.points = points;
        out.push(Outbound::all(ServerMsg::PlayerPoints { id, points }));
        self.check_win(now, out);
    }

    fn handle_collision(&mut self, id: Uuid, now: u64, out: &mut Vec<Outbound>) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        player.destroyed = true;
        if !self.phase.is_active() {
            return;
        }

        let before = player.points;
        player.points = apply_penalty(before, CRASH_PENALTY);
        let total = player.points;
        debug!(player_id = %id, before, total, "Crash penalty");

        out.push(Outbound::to(
            id,
            ServerMsg::PointsEarned {
                amount: i64::from(total) - i64::from(before),
                total,
                reason: PointsReason::Crash,
            },
        ));
        out.push(Outbound::all(ServerMsg::PlayerPoints { id, points: total }));
        self.check_win(now, out);
    }

    fn handle_destroy(&mut self, source: Uuid, target: Uuid, now: u64, out: &mut Vec<Outbound>) {
        if !self.phase.is_active() || source == target {
            return;
        }

        let Some(victim) = self.players.get_mut(&target) else {
            debug!(player_id = %source, target_id = %target, "Destroy on unknown target ignored");
            return;
        };
        if victim.is_invincible() {
            debug!(player_id = %source, target_id = %target, "Target is invincible");
            return;
        }
        if victim.destroy_credited {
            debug!(player_id = %source, target_id = %target, "Target already destroyed");
            return;
        }
        victim.destroyed = true;
        victim.destroy_credited = true;

        let Some(destroyer) = self.players.get_mut(&source) else {
            return;
        };
        destroyer.points += DESTROY_POINTS;
        let total = destroyer.points;

        info!(player_id = %source, target_id = %target, total, "Ship destroyed");

        out.push(Outbound::to(target, ServerMsg::ShipDestroyed { destroyer_id: source }));
        out.push(Outbound::to(
            source,
            ServerMsg::PointsEarned {
                amount: i64::from(DESTROY_POINTS),
                total,
                reason: PointsReason::Destroy,
            },
        ));
        out.push(Outbound::all(ServerMsg::PlayerPoints {
            id: source,
            points: total,
        }));

        self.check_win(now, out);
    }

    fn handle_respawn(&mut self, id: Uuid, now: u64, out: &mut Vec<Outbound>) {
        let until = now + self.rules.invincibility_ms;
        let (x, y) = self.spawn_point();
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if !player.destroyed {
            debug!(player_id = %id, "Respawn without a known death ignored");
            return;
        }

        player.destroyed = false;
        player.destroy_credited = false;
        player.x = x;
        player.y = y;
        player.vx = 0.0;
        player.vy = 0.0;
        player.invincible_until = Some(until);

        debug!(player_id = %id, until, "Respawned");
        out.push(Outbound::all(ServerMsg::PlayerInvincibility { id, invincible: true }));
    }

    /// Fire every deadline due at `now` and expire invincibility windows
    pub fn advance(&mut self, now: u64) -> Vec<Outbound> {
        let mut out = Vec::new();

        while let Some(due) = self.phase.next_deadline() {
            if due > now {
                break;
            }
            self.fire(due, &mut out);
        }

        let mut expired: Vec<&mut PlayerRecord> = self
            .players
            .values_mut()
            .filter(|p| p.invincible_until.is_some_and(|until| now >= until))
            .collect();
        expired.sort_by_key(|p| p.seq);
        for player in expired {
            player.invincible_until = None;
            out.push(Outbound::to(player.id, ServerMsg::InvincibilityEnded));
            out.push(Outbound::all(ServerMsg::PlayerInvincibility {
                id: player.id,
                invincible: false,
            }));
        }

        out
    }

    /// Handle the deadline of the current phase, stamped at `at`
    fn fire(&mut self, at: u64, out: &mut Vec<Outbound>) {
        match self.phase {
            MatchPhase::Idle { .. } => {
                if self.players.is_empty() || !self.auto_start {
                    self.phase = MatchPhase::Idle { auto_start_at: None };
                } else {
                    self.start_pre_match(at, out);
                }
            }
            MatchPhase::PreMatch { remaining, next_tick_at } => {
                let remaining = remaining.saturating_sub(1);
                if remaining > self.rules.final_countdown {
                    self.phase = MatchPhase::PreMatch {
                        remaining,
                        next_tick_at: next_tick_at + SECOND_MS,
                    };
                    out.push(Outbound::all(ServerMsg::CountdownUpdate {
                        countdown: remaining,
                        is_pre_match: true,
                    }));
                } else {
                    self.start_final_countdown(next_tick_at, out);
                }
            }
            MatchPhase::FinalCountdown { remaining, next_tick_at } => {
                let remaining = remaining.saturating_sub(1);
                out.push(Outbound::all(ServerMsg::CountdownUpdate {
                    countdown: remaining,
                    is_pre_match: false,
                }));
                self.phase = if remaining == 0 {
                    MatchPhase::Launching {
                        start_at: next_tick_at + self.rules.go_delay_ms,
                    }
                } else {
                    MatchPhase::FinalCountdown {
                        remaining,
                        next_tick_at: next_tick_at + SECOND_MS,
                    }
                };
            }
            MatchPhase::Launching { start_at } => self.start_match(start_at, out),
            MatchPhase::Active {
                started_at,
                ends_at,
                next_time_update_at,
            } => {
                if at >= ends_at {
                    let standings = self.standings();
                    let winners = timeout_winners(&standings);
                    info!(winners = winners.len(), "Match time expired");
                    self.end_match(winners, ends_at, out);
                } else {
                    out.push(Outbound::all(ServerMsg::TimeUpdate {
                        time_remaining: ends_at - next_time_update_at,
                    }));
                    self.phase = MatchPhase::Active {
                        started_at,
                        ends_at,
                        next_time_update_at: next_time_update_at + SECOND_MS,
                    };
                    self.check_win(next_time_update_at, out);
                }
            }
            MatchPhase::Celebration { until } => {
                if self.players.is_empty() {
                    self.phase = MatchPhase::Idle { auto_start_at: None };
                } else {
                    self.start_pre_match(until, out);
                }
            }
        }
    }

    fn start_pre_match(&mut self, now: u64, out: &mut Vec<Outbound>) {
        let countdown = self.rules.pre_match_countdown;
        info!(countdown, players = self.players.len(), "Pre-match countdown started");

        if countdown <= self.rules.final_countdown {
            self.start_final_countdown(now, out);
            return;
        }

        self.phase = MatchPhase::PreMatch {
            remaining: countdown,
            next_tick_at: now + SECOND_MS,
        };
        out.push(Outbound::all(ServerMsg::CountdownStart {
            countdown,
            is_pre_match: true,
        }));
    }

    fn start_final_countdown(&mut self, now: u64, out: &mut Vec<Outbound>) {
        let countdown = self.rules.final_countdown;
        self.phase = MatchPhase::FinalCountdown {
            remaining: countdown,
            next_tick_at: now + SECOND_MS,
        };
        out.push(Outbound::all(ServerMsg::FinalCountdownStart { countdown }));
    }

    fn start_match(&mut self, now: u64, out: &mut Vec<Outbound>) {
        if self.players.is_empty() {
            self.phase = MatchPhase::Idle { auto_start_at: None };
            return;
        }

        self.level = self.generator.generate(now);
        let until = now + self.rules.invincibility_ms;
        let (x, y) = self.spawn_point();

        let mut ids: Vec<(u64, Uuid)> = Vec::with_capacity(self.players.len());
        for player in self.players.values_mut() {
            player.points = 0;
            player.destroyed = false;
            player.destroy_credited = false;
            player.x = x;
            player.y = y;
            player.vx = 0.0;
            player.vy = 0.0;
            player.invincible_until = Some(until);
            ids.push((player.seq, player.id));
        }
        ids.sort();

        self.phase = MatchPhase::Active {
            started_at: now,
            ends_at: now + self.rules.match_duration_ms,
            next_time_update_at: now + SECOND_MS,
        };

        info!(seed = now, players = ids.len(), "Match started");

        out.push(Outbound::all(ServerMsg::GameStart {
            match_duration: self.rules.match_duration_ms,
            level_data: self.level.clone(),
        }));
        for (_, id) in ids {
            out.push(Outbound::all(ServerMsg::PlayerInvincibility { id, invincible: true }));
        }
    }

    fn standings(&self) -> Vec<(Uuid, u32)> {
        let mut standings: Vec<_> = self.players.values().map(|p| (p.seq, p.id, p.points)).collect();
        standings.sort();
        standings.into_iter().map(|(_, id, points)| (id, points)).collect()
    }

    fn check_win(&mut self, now: u64, out: &mut Vec<Outbound>) {
        if !self.phase.is_active() {
            return;
        }
        if let Some(winner) = self.rules.evaluate_win(&self.standings()) {
            info!(player_id = %winner, "Win condition reached");
            self.end_match(vec![winner], now, out);
        }
    }

    fn end_match(&mut self, winners: Vec<Uuid>, now: u64, out: &mut Vec<Outbound>) {
        let winners: Vec<Winner> = winners
            .iter()
            .filter_map(|id| self.players.get(id))
            .map(snapshot::winner)
            .collect();

        self.phase = MatchPhase::Celebration {
            until: now + self.rules.celebration_ms,
        };
        out.push(Outbound::all(ServerMsg::GameEnd { winners }));
    }

    /// Operator override: abort whatever is running and stay idle
    ///
    /// Returns false when there was nothing to stop.
    pub fn admin_stop(&mut self, message: &str) -> (bool, Vec<Outbound>) {
        self.auto_start = false;
        if let MatchPhase::Idle { .. } = self.phase {
            self.phase = MatchPhase::Idle { auto_start_at: None };
            return (false, Vec::new());
        }

        warn!(phase = self.phase.name(), "Match stopped by operator");
        self.phase = MatchPhase::Idle { auto_start_at: None };
        for player in self.players.values_mut() {
            player.invincible_until = None;
            player.destroyed = false;
            player.destroy_credited = false;
        }

        let out = vec![Outbound::all(ServerMsg::GameStopped {
            message: message.to_string(),
        })];
        (true, out)
    }

    /// Operator override: re-enable the cycle and start a countdown now
    ///
    /// Returns false unless a countdown was started.
    pub fn admin_start(&mut self, now: u64) -> (bool, Vec<Outbound>) {
        self.auto_start = true;
        let mut out = Vec::new();
        if !matches!(self.phase, MatchPhase::Idle { .. }) || self.players.is_empty() {
            return (false, out);
        }

        info!("Countdown started by operator");
        self.start_pre_match(now, &mut out);
        (true, out)
    }
}
