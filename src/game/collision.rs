//! Collision detection and classification
//!
//! Everything here is a distance test: point-to-segment for walls and
//! center-to-center for ships and balls. Results are classified as soft
//! (landing, bump) or hard (fatal) by speed.

use rand::Rng;

use super::level::Segment;
use super::physics::{Ship, WreckingBall};

/// Below this speed a contact is a harmless bump
pub const SOFT_COLLISION_SPEED: f64 = 2.0;
/// Vertical speed under which a wall contact counts as a landing
pub const LANDING_VERTICAL_SPEED: f64 = 1.5;
/// Horizontal speed under which a wall contact counts as a landing
pub const LANDING_HORIZONTAL_SPEED: f64 = 1.0;
/// Both velocity components must drop under this to come to rest
pub const LANDED_SPEED: f64 = 0.3;
/// Velocity multiplier applied on touchdown
pub const LANDING_DAMPING: f64 = 0.1;
/// Fraction of vertical speed returned as a bounce on touchdown
pub const LANDING_BOUNCE: f64 = 0.2;
/// Ball reach multiplier accounting for its spikes
pub const SPIKE_FACTOR: f64 = 1.4;
/// Energy kept by a ball bouncing off a wall
pub const BALL_WALL_RESTITUTION: f64 = 0.7;
/// Maximum random velocity nudge after a wall bounce
pub const BALL_WALL_JITTER: f64 = 0.2;

/// Anything round that can collide
pub trait Body {
    fn position(&self) -> (f64, f64);
    fn velocity(&self) -> (f64, f64);
    fn radius(&self) -> f64;
}

/// Outcome of a single collision test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionCheck {
    pub collision: bool,
    pub is_soft: bool,
    /// Speed used for the soft/hard decision
    pub velocity: f64,
}

impl CollisionCheck {
    pub const NONE: Self = Self {
        collision: false,
        is_soft: false,
        velocity: 0.0,
    };

    pub fn is_hard(&self) -> bool {
        self.collision && !self.is_soft
    }
}

/// Closest point on segment AB to P
///
/// A zero-length segment is treated as the point A.
pub fn closest_point_on_segment(px: f64, py: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> (f64, f64) {
    let cx = x2 - x1;
    let cy = y2 - y1;
    let len_sq = cx * cx + cy * cy;

    if len_sq == 0.0 {
        return (x1, y1);
    }

    let t = ((px - x1) * cx + (py - y1) * cy) / len_sq;
    if t < 0.0 {
        (x1, y1)
    } else if t > 1.0 {
        (x2, y2)
    } else {
        (x1 + t * cx, y1 + t * cy)
    }
}

/// Euclidean distance from P to segment AB
pub fn distance_to_segment(px: f64, py: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let (qx, qy) = closest_point_on_segment(px, py, x1, y1, x2, y2);
    (px - qx).hypot(py - qy)
}

fn distance_to(segment: &Segment, x: f64, y: f64) -> f64 {
    distance_to_segment(x, y, segment.x1, segment.y1, segment.x2, segment.y2)
}

fn center_distance(a: &dyn Body, b: &dyn Body) -> f64 {
    let (ax, ay) = a.position();
    let (bx, by) = b.position();
    (ax - bx).hypot(ay - by)
}

/// Ship against level walls
///
/// A soft contact that qualifies as a landing damps the ship and may set it
/// down; hard contacts leave the ship untouched for the caller to destroy.
pub fn check_level_collision(ship: &mut Ship, segments: &[Segment]) -> CollisionCheck {
    let threshold = ship.size() / 4.0;
    if !segments.iter().any(|s| distance_to(s, ship.x, ship.y) < threshold) {
        return CollisionCheck::NONE;
    }

    let speed = ship.speed();
    let vertical = ship.vy.abs();
    let horizontal = ship.vx.abs();
    let is_landing = vertical < LANDING_VERTICAL_SPEED && horizontal < LANDING_HORIZONTAL_SPEED;
    let is_soft = speed < SOFT_COLLISION_SPEED || is_landing;

    if is_landing {
        ship.vx *= LANDING_DAMPING;
        ship.vy *= LANDING_DAMPING;
        ship.vy = -ship.vy * LANDING_BOUNCE;

        if ship.vx.abs() < LANDED_SPEED && ship.vy.abs() < LANDED_SPEED {
            ship.landed = true;
        }
    }

    CollisionCheck {
        collision: true,
        is_soft,
        velocity: speed,
    }
}

/// Ship against ship, classified by relative speed
///
/// Symmetric in its arguments.
pub fn check_ship_collision(a: &dyn Body, b: &dyn Body) -> CollisionCheck {
    if center_distance(a, b) >= a.radius() + b.radius() {
        return CollisionCheck::NONE;
    }

    let (avx, avy) = a.velocity();
    let (bvx, bvy) = b.velocity();
    let relative = (avx - bvx).hypot(avy - bvy);

    CollisionCheck {
        collision: true,
        is_soft: relative < SOFT_COLLISION_SPEED,
        velocity: relative,
    }
}

/// Ball (spikes included) touching a ship
pub fn ball_hits_ship(ball: &dyn Body, ship: &dyn Body) -> bool {
    center_distance(ball, ship) < ball.radius() * SPIKE_FACTOR + ship.radius()
}

/// Two balls close enough to latch together
pub fn balls_touch(a: &dyn Body, b: &dyn Body) -> bool {
    center_distance(a, b) < SPIKE_FACTOR * (a.radius() + b.radius())
}

/// Latch `ball` onto `other` if they touch and `ball` is free to stick
///
/// Only `ball` is modified; the peer applies the same rule to its own ball.
pub fn stick_balls(ball: &mut WreckingBall, other: &dyn Body, now: u64) -> bool {
    if !ball.can_stick(now) || !balls_touch(ball, other) {
        return false;
    }

    let (ox, oy) = other.position();
    let dx = ball.x - ox;
    let dy = ball.y - oy;
    let len = dx.hypot(dy);
    let normal = if len > 0.0 { (dx / len, dy / len) } else { (0.0, -1.0) };

    ball.stick(now, normal);
    true
}

/// Reflect a ball off the first wall it touches
///
/// The ball keeps [`BALL_WALL_RESTITUTION`] of its speed plus a small random
/// nudge and is pushed back out to touching distance. Walls never destroy a
/// ball. Returns true when a bounce happened.
pub fn bounce_ball_off_walls<R: Rng + ?Sized>(
    ball: &mut WreckingBall,
    segments: &[Segment],
    rng: &mut R,
) -> bool {
    let reach = ball.stats.size * SPIKE_FACTOR;

    for segment in segments {
        let (qx, qy) =
            closest_point_on_segment(ball.x, ball.y, segment.x1, segment.y1, segment.x2, segment.y2);
        let dx = ball.x - qx;
        let dy = ball.y - qy;
        let distance = dx.hypot(dy);
        if distance >= reach {
            continue;
        }

        let (nx, ny) = if distance > 0.0 {
            (dx / distance, dy / distance)
        } else {
            // Center exactly on the wall: use the segment normal facing
            // against the direction of travel.
            let len = segment.length();
            if len == 0.0 {
                (0.0, -1.0)
            } else {
                let (nx, ny) = (-(segment.y2 - segment.y1) / len, (segment.x2 - segment.x1) / len);
                if nx * ball.vx + ny * ball.vy > 0.0 {
                    (-nx, -ny)
                } else {
                    (nx, ny)
                }
            }
        };

        let approach = ball.vx * nx + ball.vy * ny;
        if approach < 0.0 {
            ball.vx = (ball.vx - 2.0 * approach * nx) * BALL_WALL_RESTITUTION
                + rng.gen_range(-BALL_WALL_JITTER..=BALL_WALL_JITTER);
            ball.vy = (ball.vy - 2.0 * approach * ny) * BALL_WALL_RESTITUTION
                + rng.gen_range(-BALL_WALL_JITTER..=BALL_WALL_JITTER);
        }

        ball.x = qx + nx * reach;
        ball.y = qy + ny * reach;
        return true;
    }

    false
}

/// Why a ship was destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fatal<I> {
    /// Hard impact with level geometry
    Wall,
    /// Hard impact with another ship
    Ship(I),
    /// Hit by its own ball
    OwnBall,
    /// Hit by another player's ball
    Ball(I),
}

/// Another player as seen by the collision engine
pub struct Opponent<'a, I> {
    pub id: I,
    pub ship: &'a dyn Body,
    pub ball: &'a dyn Body,
    pub invincible: bool,
}

/// Everything that happened to one ship in one frame
#[derive(Debug, Clone, PartialEq)]
pub struct HazardReport<I> {
    /// First fatal contact found; later checks are skipped
    pub fatal: Option<Fatal<I>>,
    /// A wall or ship contact that did no harm
    pub soft_contact: bool,
    /// Opponents (not invincible) struck by this ship's ball
    pub ball_kills: Vec<I>,
}

/// Run every ship-level check for `ship` against walls and opponents
///
/// Ball kills are gathered first since aggression does not depend on the
/// aggressor surviving. Victim checks stop at the first fatal hit. An
/// invincible ship can still die on a wall but never to a ship or ball.
pub fn resolve_hazards<I: Copy>(
    ship: &mut Ship,
    segments: &[Segment],
    opponents: &[Opponent<'_, I>],
) -> HazardReport<I> {
    let ball_kills = opponents
        .iter()
        .filter(|o| !o.invincible && ball_hits_ship(&ship.ball, o.ship))
        .map(|o| o.id)
        .collect();

    let mut report = HazardReport {
        fatal: None,
        soft_contact: false,
        ball_kills,
    };

    let wall = check_level_collision(ship, segments);
    if wall.is_hard() {
        report.fatal = Some(Fatal::Wall);
        return report;
    }
    report.soft_contact |= wall.collision;

    for opponent in opponents {
        let contact = check_ship_collision(&*ship, opponent.ship);
        if contact.is_hard() && !ship.invincible {
            report.fatal = Some(Fatal::Ship(opponent.id));
            return report;
        }
        report.soft_contact |= contact.collision;
    }

    if ship.invincible {
        return report;
    }

    if ball_hits_ship(&ship.ball, &*ship) {
        report.fatal = Some(Fatal::OwnBall);
        return report;
    }

    if let Some(opponent) = opponents.iter().find(|o| ball_hits_ship(o.ball, &*ship)) {
        report.fatal = Some(Fatal::Ball(opponent.id));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Dot {
        x: f64,
        y: f64,
        vx: f64,
        vy: f64,
        r: f64,
    }

    impl Body for Dot {
        fn position(&self) -> (f64, f64) {
            (self.x, self.y)
        }
        fn velocity(&self) -> (f64, f64) {
            (self.vx, self.vy)
        }
        fn radius(&self) -> f64 {
            self.r
        }
    }

    fn dot(x: f64, y: f64, vx: f64, vy: f64) -> Dot {
        Dot { x, y, vx, vy, r: 15.0 }
    }

    fn floor() -> Vec<Segment> {
        vec![Segment::wall(0.0, 100.0, 1000.0, 100.0)]
    }

    #[test]
    fn test_distance_to_segment() {
        // Perpendicular projection inside the segment
        assert_eq!(distance_to_segment(5.0, 3.0, 0.0, 0.0, 10.0, 0.0), 3.0);
        // Clamped to an endpoint
        assert_eq!(distance_to_segment(-3.0, 4.0, 0.0, 0.0, 10.0, 0.0), 5.0);
        assert_eq!(distance_to_segment(13.0, 4.0, 0.0, 0.0, 10.0, 0.0), 5.0);
        // Degenerate segment is a point
        assert_eq!(distance_to_segment(3.0, 4.0, 0.0, 0.0, 0.0, 0.0), 5.0);
    }

    #[test]
    fn test_hard_wall_collision() {
        let mut ship = Ship::new(500.0, 101.0);
        ship.vy = 6.0;
        let check = check_level_collision(&mut ship, &floor());
        assert!(check.collision);
        assert!(check.is_hard());
        assert!(!ship.landed);
        assert_eq!(ship.vy, 6.0);
    }

    #[test]
    fn test_gentle_touchdown_lands() {
        let mut ship = Ship::new(500.0, 99.0);
        ship.vy = 1.0;
        ship.vx = 0.2;
        let check = check_level_collision(&mut ship, &floor());
        assert!(check.collision);
        assert!(check.is_soft);
        assert!(ship.landed);
        assert!((ship.vy + 0.02).abs() < 1e-12, "small upward bounce");
    }

    #[test]
    fn test_soft_bump_without_landing() {
        // Slow overall but moving sideways too fast to land
        let mut ship = Ship::new(500.0, 99.0);
        ship.vx = 1.2;
        ship.vy = 0.5;
        let check = check_level_collision(&mut ship, &floor());
        assert!(check.is_soft);
        assert!(!ship.landed);
        assert_eq!(ship.vx, 1.2);
    }

    #[test]
    fn test_far_from_walls() {
        let mut ship = Ship::new(500.0, 50.0);
        assert_eq!(check_level_collision(&mut ship, &floor()), CollisionCheck::NONE);
    }

    #[test]
    fn test_ship_collision_symmetry() {
        let cases = [
            (dot(0.0, 0.0, 0.0, 0.0), dot(20.0, 0.0, 0.5, 0.0)),
            (dot(0.0, 0.0, 5.0, 0.0), dot(10.0, 10.0, -5.0, 0.0)),
            (dot(0.0, 0.0, 1.0, 1.0), dot(29.9, 0.0, 0.0, 0.0)),
            (dot(0.0, 0.0, 1.0, 1.0), dot(30.0, 0.0, 0.0, 0.0)),
            (dot(0.0, 0.0, 0.0, 0.0), dot(100.0, 0.0, 0.0, 0.0)),
        ];
        for (a, b) in &cases {
            let ab = check_ship_collision(a, b);
            let ba = check_ship_collision(b, a);
            assert_eq!(ab.collision, ba.collision);
            assert_eq!(ab.is_soft, ba.is_soft);
        }

        assert!(check_ship_collision(&cases[0].0, &cases[0].1).is_soft);
        assert!(check_ship_collision(&cases[1].0, &cases[1].1).is_hard());
        assert!(!check_ship_collision(&cases[3].0, &cases[3].1).collision);
    }

    #[test]
    fn test_ball_reach_includes_spikes() {
        let ball = dot(0.0, 0.0, 0.0, 0.0);
        // 15 * 1.4 + 15 = 36
        assert!(ball_hits_ship(&ball, &dot(35.9, 0.0, 0.0, 0.0)));
        assert!(!ball_hits_ship(&ball, &dot(36.0, 0.0, 0.0, 0.0)));

        // 1.4 * (15 + 15) = 42
        assert!(balls_touch(&ball, &dot(41.0, 0.0, 0.0, 0.0)));
        assert!(!balls_touch(&ball, &dot(42.5, 0.0, 0.0, 0.0)));
    }

    #[test]
    fn test_stick_balls_pushes_apart_on_release() {
        let mut ball = WreckingBall::hanging_from(0.0, 0.0, Default::default());
        ball.x = 0.0;
        ball.y = 0.0;
        let other = dot(30.0, 0.0, 0.0, 0.0);

        assert!(stick_balls(&mut ball, &other, 100));
        assert!(!stick_balls(&mut ball, &other, 200), "already stuck");

        assert!(ball.update_stick(100 + crate::game::physics::STICK_DURATION_MS));
        assert!(ball.vx < 0.0, "released away from the partner");
    }

    #[test]
    fn test_ball_bounces_off_wall() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut ball = WreckingBall::hanging_from(0.0, 0.0, Default::default());
        ball.x = 500.0;
        ball.y = 90.0;
        ball.vx = 1.0;
        ball.vy = 5.0;

        assert!(bounce_ball_off_walls(&mut ball, &floor(), &mut rng));
        assert!(ball.vy < 0.0, "reflected upward");
        assert!((ball.vy + 3.5).abs() <= BALL_WALL_JITTER + 1e-9);
        assert!((ball.vx - 0.7).abs() <= BALL_WALL_JITTER + 1e-9);
        assert!((100.0 - ball.y - 15.0 * SPIKE_FACTOR).abs() < 1e-9);

        ball.y = 20.0;
        assert!(!bounce_ball_off_walls(&mut ball, &floor(), &mut rng));
    }

    #[test]
    fn test_invincible_ship_survives_ships_and_balls() {
        let mut ship = Ship::new(500.0, 500.0);
        ship.vx = 10.0;
        ship.grant_invincibility(u64::MAX);

        let rammer = dot(510.0, 500.0, -10.0, 0.0);
        let spikes = dot(500.0, 480.0, 0.0, 0.0);
        let opponents = [Opponent {
            id: 7u32,
            ship: &rammer,
            ball: &spikes,
            invincible: false,
        }];

        let report = resolve_hazards(&mut ship, &[], &opponents);
        assert_eq!(report.fatal, None);
        assert!(report.soft_contact);

        ship.clear_invincibility();
        let report = resolve_hazards(&mut ship, &[], &opponents);
        assert_eq!(report.fatal, Some(Fatal::Ship(7)));
    }

    #[test]
    fn test_invincible_ship_still_dies_on_walls() {
        let mut ship = Ship::new(500.0, 100.0);
        ship.vy = 8.0;
        ship.grant_invincibility(u64::MAX);
        let report = resolve_hazards::<u32>(&mut ship, &floor(), &[]);
        assert_eq!(report.fatal, Some(Fatal::Wall));
    }

    #[test]
    fn test_enemy_ball_kills_and_own_ball_kills() {
        let mut ship = Ship::new(500.0, 500.0);
        let far_ship = dot(900.0, 900.0, 0.0, 0.0);
        let spikes = dot(520.0, 500.0, 0.0, 0.0);
        let opponents = [Opponent {
            id: 1u32,
            ship: &far_ship,
            ball: &spikes,
            invincible: false,
        }];
        let report = resolve_hazards(&mut ship, &[], &opponents);
        assert_eq!(report.fatal, Some(Fatal::Ball(1)));

        let mut ship = Ship::new(500.0, 500.0);
        ship.ball.x = 500.0;
        ship.ball.y = 520.0;
        let report = resolve_hazards::<u32>(&mut ship, &[], &[]);
        assert_eq!(report.fatal, Some(Fatal::OwnBall));
    }

    #[test]
    fn test_ball_kills_skip_invincible_targets() {
        let mut ship = Ship::new(500.0, 500.0);
        let victim = dot(500.0, 630.0, 0.0, 0.0);
        let shielded = dot(505.0, 625.0, 0.0, 0.0);
        let far_ball = dot(2000.0, 2000.0, 0.0, 0.0);
        let opponents = [
            Opponent {
                id: 1u32,
                ship: &victim,
                ball: &far_ball,
                invincible: false,
            },
            Opponent {
                id: 2u32,
                ship: &shielded,
                ball: &far_ball,
                invincible: true,
            },
        ];

        let report = resolve_hazards(&mut ship, &[], &opponents);
        assert_eq!(report.ball_kills, vec![1]);
        assert_eq!(report.fatal, None);
    }
}
