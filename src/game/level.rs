//! Procedural level generation and the level wire format

use std::f64::consts::TAU;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::rng::SeededRandom;

/// Thickness tag carried by boundary walls
pub const BOUNDARY_THICKNESS: f64 = 20.0;
/// Radius of the obstacle-free spawn zone at the level center
pub const SAFE_ZONE_RADIUS: f64 = 200.0;
/// Obstacle centers stay this far inside the boundary
pub const OBSTACLE_MARGIN: f64 = 200.0;
/// Obstacles in an open level
pub const OPEN_OBSTACLE_COUNT: usize = 15;
/// Extra obstacles sprinkled over a technical level
pub const TECHNICAL_OBSTACLE_COUNT: usize = 5;
/// Spacing of candidate walls in a technical level
pub const GRID_SIZE: f64 = 400.0;
/// Width of the gap cut into each technical wall
pub const PATH_WIDTH: f64 = 150.0;
/// Grid cells closer than this to the center get no wall
pub const TECHNICAL_CENTER_CLEARANCE: f64 = 300.0;
/// Chance that a grid cell receives a wall
pub const WALL_CHANCE: f64 = 0.7;
/// Placement resamples before the last sample is accepted as-is
pub const MAX_PLACEMENT_ATTEMPTS: usize = 200;

/// Layout style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelType {
    /// Randomly shaped obstacles scattered over open space
    Open,
    /// Grid of gapped corridor walls plus a few obstacles
    #[default]
    Technical,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown level type '{0}' (expected 'open' or 'technical')")]
pub struct ParseLevelTypeError(String);

impl FromStr for LevelType {
    type Err = ParseLevelTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "technical" => Ok(Self::Technical),
            other => Err(ParseLevelTypeError(other.to_string())),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A wall edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    #[serde(default)]
    pub is_boundary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness: Option<f64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_floor: bool,
    /// Survives obstacle regeneration
    #[serde(default, skip_serializing_if = "is_false")]
    pub permanent: bool,
}

impl Segment {
    /// Plain obstacle edge
    pub fn wall(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            is_boundary: false,
            thickness: None,
            is_floor: false,
            permanent: false,
        }
    }

    fn boundary(x1: f64, y1: f64, x2: f64, y2: f64, is_floor: bool) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            is_boundary: true,
            thickness: Some(BOUNDARY_THICKNESS),
            is_floor,
            permanent: true,
        }
    }

    pub fn length(&self) -> f64 {
        (self.x2 - self.x1).hypot(self.y2 - self.y1)
    }
}

/// Obstacle shape families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObstacleKind {
    ThickLine,
    Polygon,
    Star,
    Circle,
}

impl ObstacleKind {
    fn from_index(index: i64) -> Self {
        match index {
            0 => Self::ThickLine,
            1 => Self::Polygon,
            2 => Self::Star,
            _ => Self::Circle,
        }
    }
}

/// Structured obstacle record (its segments are also flattened into the level)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    #[serde(rename = "type")]
    pub kind: ObstacleKind,
    pub x: f64,
    pub y: f64,
    pub segments: Vec<Segment>,
}

/// Complete level as generated on the server and sent to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelData {
    pub width: f64,
    pub height: f64,
    pub segments: Vec<Segment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obstacles: Vec<Obstacle>,
    #[serde(default)]
    pub seed: u64,
}

impl LevelData {
    /// Bare arena: boundary walls only
    pub fn empty(width: f64, height: f64) -> Self {
        let mut level = Self {
            width,
            height,
            segments: Vec::new(),
            obstacles: Vec::new(),
            seed: 0,
        };
        add_boundaries(&mut level);
        level
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }

    pub fn boundary_segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.is_boundary)
    }
}

/// A circle obstacles must stay out of
#[derive(Debug, Clone, Copy)]
struct SafeZone {
    x: f64,
    y: f64,
    radius: f64,
}

impl SafeZone {
    fn contains(&self, x: f64, y: f64) -> bool {
        (x - self.x).hypot(y - self.y) < self.radius
    }
}

/// Deterministic level generator
#[derive(Debug, Clone)]
pub struct LevelGenerator {
    width: f64,
    height: f64,
    level_type: LevelType,
}

impl LevelGenerator {
    pub fn new(width: f64, height: f64, level_type: LevelType) -> Self {
        Self {
            width,
            height,
            level_type,
        }
    }

    /// Build a full level for `seed`
    pub fn generate(&self, seed: u64) -> LevelData {
        let mut rng = SeededRandom::new(seed);
        let mut level = LevelData {
            width: self.width,
            height: self.height,
            segments: Vec::new(),
            obstacles: Vec::new(),
            seed,
        };

        add_boundaries(&mut level);

        match self.level_type {
            LevelType::Technical => {
                add_corridor_walls(&mut level, &mut rng);
                add_random_obstacles(&mut level, &mut rng, TECHNICAL_OBSTACLE_COUNT);
            }
            LevelType::Open => {
                add_random_obstacles(&mut level, &mut rng, OPEN_OBSTACLE_COUNT);
            }
        }

        level
    }

    /// Replace every non-permanent segment of `level` with a fresh layout for
    /// `seed`, keeping its permanent boundary walls untouched.
    pub fn regenerate_obstacles(&self, level: &LevelData, seed: u64) -> LevelData {
        let fresh = LevelGenerator::new(level.width, level.height, self.level_type).generate(seed);

        let mut segments: Vec<Segment> =
            level.segments.iter().filter(|s| s.permanent).cloned().collect();
        segments.extend(fresh.segments.into_iter().filter(|s| !s.permanent));

        LevelData {
            width: level.width,
            height: level.height,
            segments,
            obstacles: fresh.obstacles,
            seed,
        }
    }
}

fn add_boundaries(level: &mut LevelData) {
    let (w, h) = (level.width, level.height);
    level.segments.extend([
        Segment::boundary(0.0, 0.0, w, 0.0, false),
        Segment::boundary(0.0, h, w, h, true),
        Segment::boundary(0.0, 0.0, 0.0, h, false),
        Segment::boundary(w, 0.0, w, h, false),
    ]);
}

fn add_corridor_walls(level: &mut LevelData, rng: &mut SeededRandom) {
    let (cx, cy) = level.center();
    let half = GRID_SIZE / 2.0;
    let quarter = GRID_SIZE / 4.0;
    let half_path = PATH_WIDTH / 2.0;

    let mut x = GRID_SIZE;
    while x < level.width {
        let mut y = GRID_SIZE;
        while y < level.height {
            if (x - cx).hypot(y - cy) >= TECHNICAL_CENTER_CLEARANCE && rng.next_f64() < WALL_CHANCE {
                if rng.next_f64() < 0.5 {
                    let gap_y = y + rng.between(-quarter, quarter);
                    level.segments.push(Segment::wall(x, y - half, x, gap_y - half_path));
                    level.segments.push(Segment::wall(x, gap_y + half_path, x, y + half));
                } else {
                    let gap_x = x + rng.between(-quarter, quarter);
                    level.segments.push(Segment::wall(x - half, y, gap_x - half_path, y));
                    level.segments.push(Segment::wall(gap_x + half_path, y, x + half, y));
                }
            }
            y += GRID_SIZE;
        }
        x += GRID_SIZE;
    }
}

/// Scatter `count` obstacles outside the spawn safe zone
///
/// A rejected placement redraws the shape parameters as well as the centre, so
/// the draw sequence after the first retry differs from a position-only retry.
fn add_random_obstacles(level: &mut LevelData, rng: &mut SeededRandom, count: usize) {
    let (cx, cy) = level.center();
    let safe_zones = [SafeZone {
        x: cx,
        y: cy,
        radius: SAFE_ZONE_RADIUS,
    }];

    for _ in 0..count {
        let kind = ObstacleKind::from_index(rng.int_between(0, 3));

        let mut placed = None;
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let x = OBSTACLE_MARGIN + rng.between(0.0, level.width - 2.0 * OBSTACLE_MARGIN);
            let y = OBSTACLE_MARGIN + rng.between(0.0, level.height - 2.0 * OBSTACLE_MARGIN);
            let outline = build_outline(kind, x, y, rng);

            let clear = !safe_zones.iter().any(|zone| {
                zone.contains(x, y) || outline.iter().any(|&(px, py)| zone.contains(px, py))
            });

            placed = Some((x, y, outline));
            if clear {
                break;
            }
        }

        // The attempt budget is never zero, so the last sample is always present.
        let Some((x, y, outline)) = placed else {
            continue;
        };

        let segments = close_outline(&outline);
        level.segments.extend(segments.iter().cloned());
        level.obstacles.push(Obstacle {
            kind,
            x,
            y,
            segments,
        });
    }
}

fn build_outline(kind: ObstacleKind, x: f64, y: f64, rng: &mut SeededRandom) -> Vec<(f64, f64)> {
    match kind {
        ObstacleKind::ThickLine => {
            let length = 100.0 + rng.between(0.0, 200.0);
            let thickness = 20.0 + rng.between(0.0, 30.0);
            let angle = rng.between(0.0, TAU);

            let dx = angle.cos() * length / 2.0;
            let dy = angle.sin() * length / 2.0;
            let perp_x = -dy / length * thickness;
            let perp_y = dx / length * thickness;

            vec![
                (x - dx + perp_x, y - dy + perp_y),
                (x + dx + perp_x, y + dy + perp_y),
                (x + dx - perp_x, y + dy - perp_y),
                (x - dx - perp_x, y - dy - perp_y),
            ]
        }
        ObstacleKind::Polygon => {
            let sides = 5 + rng.int_between(0, 3);
            let radius = 50.0 + rng.between(0.0, 100.0);
            (0..sides)
                .map(|i| {
                    let angle = i as f64 / sides as f64 * TAU;
                    let r = radius * (0.7 + rng.between(0.0, 0.6));
                    (x + angle.cos() * r, y + angle.sin() * r)
                })
                .collect()
        }
        ObstacleKind::Star => {
            let tips = 5 + rng.int_between(0, 2);
            let outer = 80.0 + rng.between(0.0, 60.0);
            let inner = outer * (0.3 + rng.between(0.0, 0.2));
            (0..tips * 2)
                .map(|i| {
                    let angle = i as f64 / (tips * 2) as f64 * TAU;
                    let r = if i % 2 == 0 { outer } else { inner };
                    (x + angle.cos() * r, y + angle.sin() * r)
                })
                .collect()
        }
        ObstacleKind::Circle => {
            let radius = 40.0 + rng.between(0.0, 60.0);
            let sides = 12 + rng.int_between(0, 8);
            (0..sides)
                .map(|i| {
                    let angle = i as f64 / sides as f64 * TAU;
                    (x + angle.cos() * radius, y + angle.sin() * radius)
                })
                .collect()
        }
    }
}

fn close_outline(points: &[(f64, f64)]) -> Vec<Segment> {
    (0..points.len())
        .map(|i| {
            let (x1, y1) = points[i];
            let (x2, y2) = points[(i + 1) % points.len()];
            Segment::wall(x1, y1, x2, y2)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(seed: u64) -> LevelData {
        LevelGenerator::new(4000.0, 3000.0, LevelType::Open).generate(seed)
    }

    fn technical(seed: u64) -> LevelData {
        LevelGenerator::new(4000.0, 3000.0, LevelType::Technical).generate(seed)
    }

    #[test]
    fn test_generation_is_deterministic() {
        for seed in [0, 1, 12345, 1_700_000_000_000] {
            let a = open(seed);
            let b = open(seed);
            assert_eq!(a, b);
            assert_eq!(
                serde_json::to_string(&a).unwrap(),
                serde_json::to_string(&b).unwrap()
            );

            assert_eq!(technical(seed), technical(seed));
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        assert_ne!(open(1).segments, open(2).segments);
    }

    #[test]
    fn test_boundary_closure() {
        for level in [open(99), technical(99)] {
            let boundary: Vec<&Segment> = level.boundary_segments().collect();
            assert_eq!(boundary.len(), 4);
            assert_eq!(&level.segments[..4].iter().collect::<Vec<_>>(), &boundary);

            let (w, h) = (level.width, level.height);
            let expected = [
                (0.0, 0.0, w, 0.0),
                (0.0, h, w, h),
                (0.0, 0.0, 0.0, h),
                (w, 0.0, w, h),
            ];
            for (segment, (x1, y1, x2, y2)) in boundary.iter().zip(expected) {
                assert_eq!((segment.x1, segment.y1, segment.x2, segment.y2), (x1, y1, x2, y2));
                assert!(segment.permanent);
                assert_eq!(segment.thickness, Some(BOUNDARY_THICKNESS));
            }

            // Only the bottom edge is the floor
            assert!(boundary[1].is_floor);
            assert_eq!(boundary.iter().filter(|s| s.is_floor).count(), 1);

            // Nothing else claims to be a boundary
            assert!(level.segments[4..].iter().all(|s| !s.is_boundary && !s.permanent));
        }
    }

    #[test]
    fn test_open_level_scenario() {
        let level = open(12345);
        assert_eq!(level.obstacles.len(), OPEN_OBSTACLE_COUNT);

        for obstacle in &level.obstacles {
            assert!(obstacle.segments.len() >= 4);
            for segment in &obstacle.segments {
                for (x, y) in [(segment.x1, segment.y1), (segment.x2, segment.y2)] {
                    let d = (x - 2000.0).hypot(y - 1500.0);
                    assert!(d >= SAFE_ZONE_RADIUS, "vertex ({x}, {y}) inside spawn zone");
                }
            }
        }

        let flattened: usize = level.obstacles.iter().map(|o| o.segments.len()).sum();
        assert_eq!(level.segments.len(), 4 + flattened);
    }

    #[test]
    fn test_obstacles_are_closed_outlines() {
        let level = open(777);
        for obstacle in &level.obstacles {
            let segments = &obstacle.segments;
            for pair in segments.windows(2) {
                assert_eq!((pair[0].x2, pair[0].y2), (pair[1].x1, pair[1].y1));
            }
            let first = &segments[0];
            let last = &segments[segments.len() - 1];
            assert_eq!((last.x2, last.y2), (first.x1, first.y1));

            let expected_sides = match obstacle.kind {
                ObstacleKind::ThickLine => 4..=4,
                ObstacleKind::Polygon => 5..=8,
                ObstacleKind::Star => 10..=14,
                ObstacleKind::Circle => 12..=20,
            };
            assert!(expected_sides.contains(&segments.len()));
        }
    }

    #[test]
    fn test_technical_level_has_corridors() {
        let level = technical(4242);
        assert_eq!(level.obstacles.len(), TECHNICAL_OBSTACLE_COUNT);

        let corridor_walls = level.segments.len()
            - 4
            - level.obstacles.iter().map(|o| o.segments.len()).sum::<usize>();
        assert!(corridor_walls > 0);
        assert_eq!(corridor_walls % 2, 0, "every wall is split by a gap");

        let wall_segments = &level.segments[4..4 + corridor_walls];
        for segment in wall_segments {
            assert!(segment.x1 == segment.x2 || segment.y1 == segment.y2);
        }
    }

    #[test]
    fn test_regenerate_obstacles_keeps_boundaries() {
        let generator = LevelGenerator::new(4000.0, 3000.0, LevelType::Open);
        let level = generator.generate(1);
        let refreshed = generator.regenerate_obstacles(&level, 2);

        let before: Vec<&Segment> = level.segments.iter().filter(|s| s.permanent).collect();
        let after: Vec<&Segment> = refreshed.segments.iter().filter(|s| s.permanent).collect();
        assert_eq!(before, after);
        assert_eq!(&refreshed.segments[..4], &level.segments[..4]);

        assert_eq!(refreshed.seed, 2);
        assert_ne!(refreshed.segments[4..], level.segments[4..]);
        assert_eq!(refreshed.obstacles, generator.generate(2).obstacles);
    }

    #[test]
    fn test_wire_format_field_names() {
        let level = LevelData::empty(100.0, 50.0);
        let json = serde_json::to_value(&level).unwrap();

        let first = &json["segments"][0];
        assert_eq!(first["isBoundary"], true);
        assert_eq!(first["permanent"], true);
        assert_eq!(first["thickness"], 20.0);
        assert!(first.get("isFloor").is_none());
        assert_eq!(json["segments"][1]["isFloor"], true);
        assert!(json.get("obstacles").is_none());

        let parsed: LevelData = serde_json::from_str(
            r#"{"width":10,"height":10,"segments":[{"x1":0,"y1":0,"x2":5,"y2":5}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.segments[0], Segment::wall(0.0, 0.0, 5.0, 5.0));
        assert_eq!(parsed.seed, 0);
    }

    #[test]
    fn test_level_type_parsing() {
        assert_eq!("open".parse::<LevelType>().unwrap(), LevelType::Open);
        assert_eq!(" Technical ".parse::<LevelType>().unwrap(), LevelType::Technical);
        assert!("maze".parse::<LevelType>().is_err());
    }
}
