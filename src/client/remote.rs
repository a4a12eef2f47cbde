//! Mirrored view of another player
//!
//! Remote ships are not simulated. Each `player-moved` sets a target and the
//! ship closes on it over a fixed window.

use std::f64::consts::PI;

use uuid::Uuid;

use crate::game::collision::Body;
use crate::game::physics::{BallStats, ShipStats};
use crate::ws::protocol::PlayerView;

/// Interpolation window in milliseconds
pub const INTERPOLATION_MS: f64 = 100.0;
/// Fraction of the gap to its target a remote ball closes per frame
pub const BALL_SMOOTHING: f64 = 0.1;

/// Approximate wrecking ball trailing a remote ship
#[derive(Debug, Clone)]
pub struct RemoteBall {
    pub x: f64,
    pub y: f64,
    /// Movement over the last frame
    pub vx: f64,
    pub vy: f64,
    pub size: f64,
    pub distance: f64,
}

impl RemoteBall {
    fn below(x: f64, y: f64) -> Self {
        let stats = BallStats::default();
        Self {
            x,
            y: y + stats.distance,
            vx: 0.0,
            vy: 0.0,
            size: stats.size,
            distance: stats.distance,
        }
    }

    /// Ease toward the point one chain length behind a ship
    fn follow(&mut self, ship_x: f64, ship_y: f64, rotation: f64) {
        let angle = rotation + PI;
        let target_x = ship_x + angle.cos() * self.distance;
        let target_y = ship_y + angle.sin() * self.distance;

        self.vx = (target_x - self.x) * BALL_SMOOTHING;
        self.vy = (target_y - self.y) * BALL_SMOOTHING;
        self.x += self.vx;
        self.y += self.vy;
    }
}

impl Body for RemoteBall {
    fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    fn velocity(&self) -> (f64, f64) {
        (self.vx, self.vy)
    }

    fn radius(&self) -> f64 {
        self.size
    }
}

#[derive(Debug, Clone)]
pub struct RemotePlayer {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub points: u32,
    pub invincible: bool,

    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub vx: f64,
    pub vy: f64,
    pub size: f64,
    pub ball: RemoteBall,

    target_x: f64,
    target_y: f64,
    target_rotation: f64,
    /// Milliseconds since the last server update
    elapsed_ms: f64,
}

impl RemotePlayer {
    pub fn new(view: &PlayerView) -> Self {
        Self {
            id: view.id,
            name: view.name.clone(),
            color: view.color.clone(),
            points: view.points,
            invincible: view.invincible,
            x: view.x,
            y: view.y,
            rotation: view.rotation,
            vx: view.vx,
            vy: view.vy,
            size: ShipStats::default().size,
            ball: RemoteBall::below(view.x, view.y),
            target_x: view.x,
            target_y: view.y,
            target_rotation: view.rotation,
            elapsed_ms: 0.0,
        }
    }

    /// New authoritative target; restarts the interpolation window
    pub fn set_target(&mut self, x: f64, y: f64, rotation: f64, vx: f64, vy: f64) {
        self.target_x = x;
        self.target_y = y;
        self.target_rotation = rotation;
        self.vx = vx;
        self.vy = vy;
        self.elapsed_ms = 0.0;
    }

    pub fn target(&self) -> (f64, f64, f64) {
        (self.target_x, self.target_y, self.target_rotation)
    }

    /// Move toward the target after `delta_ms` of wall time
    pub fn update(&mut self, delta_ms: f64) {
        if delta_ms.is_finite() && delta_ms > 0.0 {
            self.elapsed_ms += delta_ms;
        }
        let t = (self.elapsed_ms / INTERPOLATION_MS).min(1.0);

        self.x += (self.target_x - self.x) * t;
        self.y += (self.target_y - self.y) * t;
        self.rotation += shortest_angle(self.rotation, self.target_rotation) * t;

        self.ball.follow(self.x, self.y, self.rotation);
    }
}

impl Body for RemotePlayer {
    fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    fn velocity(&self) -> (f64, f64) {
        (self.vx, self.vy)
    }

    fn radius(&self) -> f64 {
        self.size
    }
}

/// Signed rotation from `from` to `to`, wrapped into [-π, π]
pub fn shortest_angle(from: f64, to: f64) -> f64 {
    let mut diff = to - from;
    if diff > PI {
        diff -= 2.0 * PI;
    }
    if diff < -PI {
        diff += 2.0 * PI;
    }
    diff
}
