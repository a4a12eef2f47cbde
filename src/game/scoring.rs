//! Point values, match timings and win evaluation

/// Awarded for flying through the active checkpoint
pub const CHECKPOINT_POINTS: u32 = 1;
/// Awarded to the owner of a ball that destroys a ship
pub const DESTROY_POINTS: u32 = 5;
/// Deducted for a hard wall or ship collision
pub const CRASH_PENALTY: u32 = 2;

/// Deduct `penalty`, never going below zero
pub fn apply_penalty(points: u32, penalty: u32) -> u32 {
    points.saturating_sub(penalty)
}

/// Match rules and lifecycle timings
#[derive(Debug, Clone)]
pub struct MatchRules {
    pub points_to_win: u32,
    /// Lead over second place required at the threshold
    pub min_point_difference: u32,
    pub match_duration_ms: u64,
    /// Free-fly countdown before a match, in seconds
    pub pre_match_countdown: u32,
    /// Announced countdown handing off to the match, in seconds
    pub final_countdown: u32,
    /// Pause between the final zero and the match going live
    pub go_delay_ms: u64,
    pub celebration_ms: u64,
    /// Spawn and respawn protection
    pub invincibility_ms: u64,
    /// Delay between the first join and the automatic countdown
    pub auto_start_delay_ms: u64,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            points_to_win: 11,
            min_point_difference: 2,
            match_duration_ms: 300_000,
            pre_match_countdown: 30,
            final_countdown: 5,
            go_delay_ms: 1000,
            celebration_ms: 5000,
            invincibility_ms: 5000,
            auto_start_delay_ms: 3000,
        }
    }
}

impl MatchRules {
    /// Player who has won outright, if any
    ///
    /// The leader needs `points_to_win` and a lead of `min_point_difference`
    /// over second place. A lone player only needs the threshold.
    pub fn evaluate_win<I: Copy>(&self, standings: &[(I, u32)]) -> Option<I> {
        let mut ranked: Vec<_> = standings.to_vec();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let (leader, top) = *ranked.first()?;
        if top < self.points_to_win {
            return None;
        }

        match ranked.get(1) {
            Some(&(_, second)) if top - second < self.min_point_difference => None,
            _ => Some(leader),
        }
    }
}

/// Everyone tied for the top score when time runs out
pub fn timeout_winners<I: Copy>(standings: &[(I, u32)]) -> Vec<I> {
    let Some(best) = standings.iter().map(|(_, p)| *p).max() else {
        return Vec::new();
    };
    standings
        .iter()
        .filter(|(_, p)| *p == best)
        .map(|(id, _)| *id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_penalty_floor() {
        assert_eq!(apply_penalty(5, CRASH_PENALTY), 3);
        assert_eq!(apply_penalty(1, CRASH_PENALTY), 0);

        let mut points = 3;
        for _ in 0..10 {
            points = apply_penalty(points, CRASH_PENALTY);
        }
        assert_eq!(points, 0);
    }

    #[test]
    fn test_clear_lead_wins() {
        let rules = MatchRules::default();
        assert_eq!(rules.evaluate_win(&[(1, 11), (2, 8)]), Some(1));
        assert_eq!(rules.evaluate_win(&[(2, 8), (1, 11)]), Some(1));
    }

    #[test]
    fn test_narrow_lead_keeps_playing() {
        let rules = MatchRules::default();
        assert_eq!(rules.evaluate_win(&[(1, 11), (2, 10)]), None);
        assert_eq!(rules.evaluate_win(&[(1, 12), (2, 10)]), Some(1));
        assert_eq!(rules.evaluate_win(&[(1, 10), (2, 0)]), None);
    }

    #[test]
    fn test_lone_player_needs_threshold_only() {
        let rules = MatchRules::default();
        assert_eq!(rules.evaluate_win(&[(1, 11)]), Some(1));
        assert_eq!(rules.evaluate_win(&[(1, 10)]), None);
        assert_eq!(rules.evaluate_win::<u32>(&[]), None);
    }

    #[test]
    fn test_timeout_ties_share_the_win() {
        let mut winners = timeout_winners(&[(1, 7), (2, 7), (3, 5)]);
        winners.sort();
        assert_eq!(winners, vec![1, 2]);
        assert!(timeout_winners::<u32>(&[]).is_empty());
    }
}
