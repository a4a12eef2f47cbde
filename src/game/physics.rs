//! Ship and wrecking-ball integration
//!
//! Rates are per-frame constants for a 60 Hz step; callers that run on a
//! variable clock feed whole frames through a fixed-step accumulator.

use std::collections::VecDeque;

use rand::Rng;

use super::collision::Body;

/// Kick-start multiplier for thrust while nearly stationary
pub const LOW_SPEED_THRUST_BOOST: f64 = 1.5;
/// Thrust multiplier when lifting off from a landed state
pub const TAKEOFF_THRUST_BOOST: f64 = 1.5;
/// Effective gravity while thrusting upward
pub const THRUST_GRAVITY_FACTOR: f64 = 0.8;
/// Chain spring constant
pub const CHAIN_SPRING: f64 = 0.05;
/// Fraction of the overstretch removed positionally each frame
pub const CHAIN_CORRECTION: f64 = 0.1;
/// Ball velocity multiplier applied every frame while stuck to another ball
pub const STICK_DAMPING: f64 = 0.2;
/// Outward impulse given to a ball when it unsticks
pub const STICK_REPULSION: f64 = 1.5;
/// How long two balls stay stuck together
pub const STICK_DURATION_MS: u64 = 500;
/// A released ball cannot stick again during this window
pub const STICK_COOLDOWN_MS: u64 = 500;

const TRAIL_MAX_PARTICLES: usize = 60;
const TRAIL_LIFESPAN_MS: u64 = 5000;
const TRAIL_PARTICLES_PER_FRAME: usize = 3;
const TRAIL_SPREAD: f64 = 0.2;

/// Ship handling constants
#[derive(Debug, Clone, Copy)]
pub struct ShipStats {
    /// Radians per frame
    pub rotation_speed: f64,
    /// Acceleration per frame while thrusting
    pub thrust_power: f64,
    /// Velocity multiplier per frame
    pub drag: f64,
    /// Downward acceleration per frame
    pub gravity: f64,
    /// Collision radius proxy
    pub size: f64,
}

impl Default for ShipStats {
    fn default() -> Self {
        Self {
            rotation_speed: 0.08,
            thrust_power: 0.15,
            drag: 0.99,
            gravity: 0.05,
            size: 15.0,
        }
    }
}

/// Wrecking ball constants
#[derive(Debug, Clone, Copy)]
pub struct BallStats {
    /// Chain rest length
    pub distance: f64,
    pub size: f64,
    /// Heavier balls tug the ship less per unit of stretch
    pub mass: f64,
    pub gravity: f64,
    pub drag: f64,
}

impl Default for BallStats {
    fn default() -> Self {
        Self {
            distance: 120.0,
            size: 15.0,
            mass: 5.0,
            gravity: 0.1,
            drag: 0.995,
        }
    }
}

/// Pilot inputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub thrusting: bool,
    pub rotating_left: bool,
    pub rotating_right: bool,
}

impl Controls {
    /// Net rotation direction: -1 left, +1 right
    fn turn(&self) -> f64 {
        let mut turn = 0.0;
        if self.rotating_left {
            turn -= 1.0;
        }
        if self.rotating_right {
            turn += 1.0;
        }
        turn
    }
}

/// Exhaust particle
#[derive(Debug, Clone)]
pub struct TrailParticle {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub size: f64,
    pub timestamp: u64,
    pub color: &'static str,
}

#[derive(Debug, Clone, Copy)]
struct Stick {
    until: u64,
    /// Unit vector pointing away from the partner ball
    normal: (f64, f64),
}

/// Ball on a spring chain
///
/// The ball holds no reference to its ship. [`WreckingBall::step`] takes the
/// anchor position and hands back the velocity change the chain applies to
/// whatever it is attached to.
#[derive(Debug, Clone)]
pub struct WreckingBall {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub stats: BallStats,
    stick: Option<Stick>,
    stick_cooldown_until: u64,
}

impl WreckingBall {
    /// Ball hanging straight below the anchor at rest length
    pub fn hanging_from(anchor_x: f64, anchor_y: f64, stats: BallStats) -> Self {
        Self {
            x: anchor_x,
            y: anchor_y + stats.distance,
            vx: 0.0,
            vy: 0.0,
            stats,
            stick: None,
            stick_cooldown_until: 0,
        }
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (self.x - x).hypot(self.y - y)
    }

    /// Integrate one frame and apply the chain constraint
    ///
    /// Returns the velocity change for the anchor.
    pub fn step(&mut self, anchor_x: f64, anchor_y: f64) -> (f64, f64) {
        if self.stick.is_some() {
            self.vx *= STICK_DAMPING;
            self.vy *= STICK_DAMPING;
        }

        self.vy += self.stats.gravity;
        self.vx *= self.stats.drag;
        self.vy *= self.stats.drag;

        self.x += self.vx;
        self.y += self.vy;

        let dx = self.x - anchor_x;
        let dy = self.y - anchor_y;
        let current = dx.hypot(dy);

        if current <= self.stats.distance || current == 0.0 {
            return (0.0, 0.0);
        }

        let nx = dx / current;
        let ny = dy / current;
        let stretch = current - self.stats.distance;
        let force = stretch * CHAIN_SPRING;

        self.vx -= nx * force;
        self.vy -= ny * force;

        let correction = stretch * CHAIN_CORRECTION;
        self.x -= nx * correction;
        self.y -= ny * correction;

        (nx * force / self.stats.mass, ny * force / self.stats.mass)
    }

    pub fn is_stuck(&self) -> bool {
        self.stick.is_some()
    }

    pub fn can_stick(&self, now: u64) -> bool {
        self.stick.is_none() && now >= self.stick_cooldown_until
    }

    /// Latch onto another ball; `normal` points away from the partner
    pub fn stick(&mut self, now: u64, normal: (f64, f64)) {
        self.vx *= STICK_DAMPING;
        self.vy *= STICK_DAMPING;
        self.stick = Some(Stick {
            until: now + STICK_DURATION_MS,
            normal,
        });
    }

    /// Release an expired stick with a push along its normal
    ///
    /// Returns true when a release happened this call.
    pub fn update_stick(&mut self, now: u64) -> bool {
        match self.stick {
            Some(stick) if now >= stick.until => {
                self.vx += stick.normal.0 * STICK_REPULSION;
                self.vy += stick.normal.1 * STICK_REPULSION;
                self.stick = None;
                self.stick_cooldown_until = now + STICK_COOLDOWN_MS;
                true
            }
            _ => false,
        }
    }
}

impl Body for WreckingBall {
    fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    fn velocity(&self) -> (f64, f64) {
        (self.vx, self.vy)
    }

    fn radius(&self) -> f64 {
        self.stats.size
    }
}

/// Player ship with its attached wrecking ball
#[derive(Debug, Clone)]
pub struct Ship {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub ax: f64,
    pub ay: f64,
    /// Radians; 0 points up, positive turns clockwise
    pub rotation: f64,
    pub stats: ShipStats,
    pub controls: Controls,
    pub color: String,
    pub invincible: bool,
    pub invincible_until: Option<u64>,
    pub landed: bool,
    pub ball: WreckingBall,
    pub trail: VecDeque<TrailParticle>,
}

impl Ship {
    pub fn new(x: f64, y: f64) -> Self {
        Self::with_stats(x, y, ShipStats::default(), BallStats::default())
    }

    pub fn with_stats(x: f64, y: f64, stats: ShipStats, ball_stats: BallStats) -> Self {
        Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            ax: 0.0,
            ay: 0.0,
            rotation: 0.0,
            stats,
            controls: Controls::default(),
            color: "#3498db".to_string(),
            invincible: false,
            invincible_until: None,
            landed: false,
            ball: WreckingBall::hanging_from(x, y, ball_stats),
            trail: VecDeque::with_capacity(TRAIL_MAX_PARTICLES),
        }
    }

    pub fn size(&self) -> f64 {
        self.stats.size
    }

    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }

    /// Advance one frame
    pub fn update(&mut self) {
        self.rotation += self.controls.turn() * self.stats.rotation_speed;

        if self.landed {
            if !self.controls.thrusting {
                self.ax = 0.0;
                self.ay = 0.0;
                self.vx = 0.0;
                self.vy = 0.0;
                self.update_ball();
                // The chain cannot drag a landed ship.
                self.vx = 0.0;
                self.vy = 0.0;
                return;
            }
            self.apply_thrust(TAKEOFF_THRUST_BOOST);
            self.landed = false;
        } else if self.controls.thrusting {
            let boost = if self.vx * self.vx + self.vy * self.vy < 1.0 {
                LOW_SPEED_THRUST_BOOST
            } else {
                1.0
            };
            self.apply_thrust(boost);
        } else {
            self.ax = 0.0;
            self.ay = 0.0;
        }

        let gravity_factor = if self.controls.thrusting && self.ay < 0.0 {
            THRUST_GRAVITY_FACTOR
        } else {
            1.0
        };
        self.ay += self.stats.gravity * gravity_factor;

        self.vx += self.ax;
        self.vy += self.ay;

        // No speed cap: top speed is bounded only by drag.
        self.vx *= self.stats.drag;
        self.vy *= self.stats.drag;

        self.x += self.vx;
        self.y += self.vy;

        self.update_ball();
    }

    fn apply_thrust(&mut self, factor: f64) {
        self.ax = self.rotation.sin() * self.stats.thrust_power * factor;
        self.ay = -self.rotation.cos() * self.stats.thrust_power * factor;
    }

    fn update_ball(&mut self) {
        let (dvx, dvy) = self.ball.step(self.x, self.y);
        self.vx += dvx;
        self.vy += dvy;
    }

    /// Make the ship immune to ball and ship hits until `until`
    pub fn grant_invincibility(&mut self, until: u64) {
        self.invincible = true;
        self.invincible_until = Some(until);
    }

    pub fn clear_invincibility(&mut self) {
        self.invincible = false;
        self.invincible_until = None;
    }

    /// Drop an expired invincibility window; returns true if it just ended
    pub fn expire_invincibility(&mut self, now: u64) -> bool {
        match self.invincible_until {
            Some(until) if now >= until => {
                self.clear_invincibility();
                true
            }
            _ => false,
        }
    }

    /// Add exhaust particles for this frame and prune old ones
    pub fn update_trail<R: Rng + ?Sized>(&mut self, now: u64, rng: &mut R) {
        if self.controls.thrusting {
            for _ in 0..TRAIL_PARTICLES_PER_FRAME {
                self.trail.push_back(TrailParticle {
                    x: self.x,
                    y: self.y,
                    rotation: self.rotation + (rng.gen::<f64>() - 0.5) * TRAIL_SPREAD,
                    size: self.stats.size * (0.3 + rng.gen::<f64>() * 0.3),
                    timestamp: now,
                    color: if rng.gen::<f64>() > 0.7 { "#f39c12" } else { "#e74c3c" },
                });
            }
        }

        while self
            .trail
            .front()
            .is_some_and(|p| now.saturating_sub(p.timestamp) >= TRAIL_LIFESPAN_MS)
        {
            self.trail.pop_front();
        }
        while self.trail.len() > TRAIL_MAX_PARTICLES {
            self.trail.pop_front();
        }
    }
}

impl Body for Ship {
    fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    fn velocity(&self) -> (f64, f64) {
        (self.vx, self.vy)
    }

    fn radius(&self) -> f64 {
        self.stats.size
    }
}
