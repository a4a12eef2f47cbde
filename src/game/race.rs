//! Checkpoint layout and per-pilot checkpoint scoring
//!
//! The layout is derived from the level seed, so every client builds the same
//! six checkpoints for a level. Which checkpoint is active is a local choice.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use super::collision::distance_to_segment;
use super::level::LevelData;
use super::physics::Ship;
use super::scoring::CHECKPOINT_POINTS;

pub const CHECKPOINT_COUNT: usize = 6;
pub const CHECKPOINT_RADIUS: f64 = 80.0;
/// Distance kept from the arena edges
pub const CHECKPOINT_MARGIN: f64 = 300.0;
/// Minimum spacing between checkpoints, in radii
pub const CHECKPOINT_SPACING: f64 = 4.0;
/// The first checkpoint sits this far below the arena center
pub const FIRST_CHECKPOINT_OFFSET: f64 = 200.0;
const MAX_PLACEMENT_ATTEMPTS: usize = 100;
/// Radius multiplier for a checkpoint placed after exhausting its attempts
const FALLBACK_RADIUS_FACTOR: f64 = 0.7;

pub const INACTIVE_COLOR: &str = "#3498db";
pub const ACTIVE_COLOR: &str = "#f1c40f";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    /// 1-based display number
    pub number: u32,
    pub active: bool,
    pub color: &'static str,
}

impl Checkpoint {
    fn new(x: f64, y: f64, radius: f64, number: u32) -> Self {
        Self {
            x,
            y,
            radius,
            number,
            active: false,
            color: INACTIVE_COLOR,
        }
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
        self.color = if active { ACTIVE_COLOR } else { INACTIVE_COLOR };
    }

    fn clear_of_walls(&self, level: &LevelData) -> bool {
        level
            .segments
            .iter()
            .all(|s| distance_to_segment(self.x, self.y, s.x1, s.y1, s.x2, s.y2) >= self.radius)
    }
}

/// Lay out the checkpoints for `level`
pub fn generate_checkpoints(level: &LevelData) -> Vec<Checkpoint> {
    let mut rng = ChaCha8Rng::seed_from_u64(level.seed);
    let (cx, cy) = level.center();

    let mut checkpoints = Vec::with_capacity(CHECKPOINT_COUNT);
    checkpoints.push(Checkpoint::new(cx, cy + FIRST_CHECKPOINT_OFFSET, CHECKPOINT_RADIUS, 1));

    let span_x = (level.width - 2.0 * CHECKPOINT_MARGIN).max(0.0);
    let span_y = (level.height - 2.0 * CHECKPOINT_MARGIN).max(0.0);

    for number in 2..=CHECKPOINT_COUNT as u32 {
        let mut candidate = Checkpoint::new(cx, cy, CHECKPOINT_RADIUS, number);
        let mut placed = false;

        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            candidate.x = CHECKPOINT_MARGIN + rng.gen::<f64>() * span_x;
            candidate.y = CHECKPOINT_MARGIN + rng.gen::<f64>() * span_y;

            let spaced = checkpoints.iter().all(|c: &Checkpoint| {
                (candidate.x - c.x).hypot(candidate.y - c.y) >= CHECKPOINT_RADIUS * CHECKPOINT_SPACING
            });
            if spaced && candidate.clear_of_walls(level) {
                placed = true;
                break;
            }
        }

        if !placed {
            tracing::debug!(number, "no clear spot for checkpoint, shrinking it");
            candidate.radius = CHECKPOINT_RADIUS * FALLBACK_RADIUS_FACTOR;
        }

        checkpoints.push(candidate);
    }

    checkpoints
}

/// Result of flying through the active checkpoint
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointReached {
    /// Number of the checkpoint just scored
    pub number: u32,
    /// Points total after the award
    pub points: u32,
}

/// Snapshot of race progress for HUDs and logs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceInfo {
    pub active: bool,
    pub points: u32,
    pub time_remaining: u64,
    pub active_checkpoint: Option<usize>,
    pub checkpoint_count: usize,
    /// 0 when nothing is active
    pub active_checkpoint_number: u32,
}

/// A pilot's view of the checkpoint race
#[derive(Debug, Clone)]
pub struct RaceSystem {
    checkpoints: Vec<Checkpoint>,
    active: Option<usize>,
    points: u32,
    game_active: bool,
    match_duration_ms: u64,
    time_remaining_ms: u64,
    level_size: Option<(f64, f64)>,
    rng: ChaCha8Rng,
}

impl RaceSystem {
    pub fn new(match_duration_ms: u64, seed: u64) -> Self {
        Self {
            checkpoints: Vec::new(),
            active: None,
            points: 0,
            game_active: false,
            match_duration_ms,
            time_remaining_ms: 0,
            level_size: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Adopt a level, rebuilding the checkpoints when this is the first
    /// level, the size changed, or `force` is set
    pub fn set_level(&mut self, level: &LevelData, force: bool) {
        let size = (level.width, level.height);
        if !force && self.level_size == Some(size) {
            return;
        }

        self.level_size = Some(size);
        self.checkpoints = generate_checkpoints(level);

        if let Some(index) = self.active {
            match self.checkpoints.get_mut(index) {
                Some(checkpoint) => checkpoint.set_active(true),
                None => self.active = None,
            }
        }
    }

    /// Begin a match: points reset and a checkpoint is lit
    pub fn start_game(&mut self, match_duration_ms: Option<u64>) {
        self.game_active = true;
        self.points = 0;
        if let Some(duration) = match_duration_ms {
            self.match_duration_ms = duration;
        }
        self.time_remaining_ms = self.match_duration_ms;

        for checkpoint in &mut self.checkpoints {
            checkpoint.set_active(false);
        }
        self.active = None;
        self.activate_random_checkpoint();
    }

    /// Light a checkpoint chosen uniformly among all of them
    ///
    /// The one just scored is a valid pick.
    pub fn activate_random_checkpoint(&mut self) {
        if let Some(current) = self.active.and_then(|i| self.checkpoints.get_mut(i)) {
            current.set_active(false);
        }

        if self.checkpoints.is_empty() {
            self.active = None;
            return;
        }

        let index = self.rng.gen_range(0..self.checkpoints.len());
        self.checkpoints[index].set_active(true);
        self.active = Some(index);
    }

    /// Score the active checkpoint if `ship` is inside it
    pub fn update(&mut self, ship: &Ship) -> Option<CheckpointReached> {
        if !self.game_active {
            return None;
        }

        let index = match self.active {
            Some(index) if index < self.checkpoints.len() => index,
            stale => {
                if let Some(index) = stale {
                    tracing::debug!(index, count = self.checkpoints.len(), "stale active checkpoint");
                }
                self.activate_random_checkpoint();
                self.active?
            }
        };

        let checkpoint = &self.checkpoints[index];
        let distance = (ship.x - checkpoint.x).hypot(ship.y - checkpoint.y);
        if distance >= checkpoint.radius + ship.size() {
            return None;
        }

        let number = checkpoint.number;
        self.points += CHECKPOINT_POINTS;
        self.activate_random_checkpoint();

        Some(CheckpointReached {
            number,
            points: self.points,
        })
    }

    pub fn add_points(&mut self, amount: u32) -> u32 {
        self.points += amount;
        self.points
    }

    /// Overwrite the local total with the server's figure
    pub fn set_points(&mut self, points: u32) -> u32 {
        self.points = points;
        self.points
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn is_active(&self) -> bool {
        self.game_active
    }

    pub fn time_remaining(&self) -> u64 {
        self.time_remaining_ms
    }

    pub fn update_time_remaining(&mut self, time_remaining_ms: u64) {
        self.time_remaining_ms = time_remaining_ms;
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn active_checkpoint(&self) -> Option<&Checkpoint> {
        self.active.and_then(|i| self.checkpoints.get(i))
    }

    pub fn info(&self) -> RaceInfo {
        RaceInfo {
            active: self.game_active,
            points: self.points,
            time_remaining: self.time_remaining_ms,
            active_checkpoint: self.active,
            checkpoint_count: self.checkpoints.len(),
            active_checkpoint_number: self.active_checkpoint().map_or(0, |c| c.number),
        }
    }

    /// Stop scoring; the layout is kept
    pub fn reset(&mut self) {
        self.game_active = false;
        self.points = 0;
        if let Some(current) = self.active.and_then(|i| self.checkpoints.get_mut(i)) {
            current.set_active(false);
        }
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::level::{LevelGenerator, LevelType, Segment};

    fn level(seed: u64) -> LevelData {
        LevelGenerator::new(4000.0, 3000.0, LevelType::Technical).generate(seed)
    }

    fn started(level: &LevelData) -> RaceSystem {
        let mut race = RaceSystem::new(300_000, 9);
        race.set_level(level, true);
        race.start_game(None);
        race
    }

    #[test]
    fn test_layout_shape() {
        let level = level(1234);
        let checkpoints = generate_checkpoints(&level);

        assert_eq!(checkpoints.len(), CHECKPOINT_COUNT);
        assert_eq!((checkpoints[0].x, checkpoints[0].y), (2000.0, 1700.0));
        for (i, c) in checkpoints.iter().enumerate() {
            assert_eq!(c.number as usize, i + 1);
            assert!(!c.active);
            assert_eq!(c.color, INACTIVE_COLOR);
        }
        for c in &checkpoints[1..] {
            assert!(c.x >= CHECKPOINT_MARGIN && c.x <= 4000.0 - CHECKPOINT_MARGIN);
            assert!(c.y >= CHECKPOINT_MARGIN && c.y <= 3000.0 - CHECKPOINT_MARGIN);
            if c.radius == CHECKPOINT_RADIUS {
                assert!(c.clear_of_walls(&level));
            }
        }
    }

    #[test]
    fn test_layout_is_shared_across_clients() {
        let level = level(777);
        assert_eq!(generate_checkpoints(&level), generate_checkpoints(&level));
    }

    #[test]
    fn test_crowded_level_shrinks_checkpoints() {
        let mut level = LevelData::empty(4000.0, 3000.0);
        // A dense field of horizontal walls every 50 units leaves no clear spot
        for i in 0..60 {
            let y = i as f64 * 50.0;
            level.segments.push(Segment::wall(0.0, y, 4000.0, y));
        }

        let checkpoints = generate_checkpoints(&level);
        assert_eq!(checkpoints.len(), CHECKPOINT_COUNT);
        for c in &checkpoints[1..] {
            assert_eq!(c.radius, CHECKPOINT_RADIUS * FALLBACK_RADIUS_FACTOR);
        }
    }

    #[test]
    fn test_start_lights_exactly_one() {
        let race = started(&level(5));
        let lit: Vec<_> = race.checkpoints().iter().filter(|c| c.active).collect();
        assert_eq!(lit.len(), 1);
        assert_eq!(lit[0].color, ACTIVE_COLOR);
        assert!(race.info().active_checkpoint_number > 0);
        assert_eq!(race.time_remaining(), 300_000);
    }

    #[test]
    fn test_reaching_active_checkpoint_scores() {
        let mut race = started(&level(5));
        let target = race.active_checkpoint().cloned().unwrap();

        let far = Ship::new(target.x + target.radius + 100.0, target.y);
        assert_eq!(race.update(&far), None);

        let ship = Ship::new(target.x + target.radius, target.y);
        let reached = race.update(&ship).unwrap();
        assert_eq!(reached.number, target.number);
        assert_eq!(reached.points, 1);
        assert_eq!(race.points(), 1);
        assert_eq!(race.checkpoints().iter().filter(|c| c.active).count(), 1);
    }

    #[test]
    fn test_no_scoring_when_inactive() {
        let level = level(5);
        let mut race = RaceSystem::new(300_000, 1);
        race.set_level(&level, true);
        let c = race.checkpoints()[0].clone();
        assert_eq!(race.update(&Ship::new(c.x, c.y)), None);
        assert_eq!(race.points(), 0);
    }

    #[test]
    fn test_stale_active_index_recovers() {
        let mut race = started(&level(5));
        race.checkpoints.truncate(2);
        race.active = Some(5);

        let _ = race.update(&Ship::new(-1000.0, -1000.0));
        let active = race.info().active_checkpoint.unwrap();
        assert!(active < 2);
    }

    #[test]
    fn test_set_level_keeps_layout_unless_forced() {
        let first = level(5);
        let mut race = RaceSystem::new(300_000, 1);
        race.set_level(&first, false);
        let before = race.checkpoints().to_vec();

        race.set_level(&level(6), false);
        assert_eq!(race.checkpoints(), &before[..]);

        race.set_level(&level(6), true);
        assert_ne!(race.checkpoints(), &before[..]);
    }

    #[test]
    fn test_reset_keeps_layout() {
        let mut race = started(&level(5));
        race.add_points(4);
        let layout: Vec<_> = race.checkpoints().iter().map(|c| (c.x, c.y)).collect();

        race.reset();
        assert!(!race.is_active());
        assert_eq!(race.points(), 0);
        assert!(race.active_checkpoint().is_none());
        let after: Vec<_> = race.checkpoints().iter().map(|c| (c.x, c.y)).collect();
        assert_eq!(layout, after);
    }
}
