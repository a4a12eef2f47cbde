//! Wire views of server-side player records

use crate::ws::protocol::{PlayerView, Winner};

use super::r#match::PlayerRecord;

/// Public view of one player
pub fn player_view(record: &PlayerRecord) -> PlayerView {
    PlayerView {
        id: record.id,
        x: record.x,
        y: record.y,
        rotation: record.rotation,
        vx: record.vx,
        vy: record.vy,
        color: record.color.clone(),
        name: record.name.clone(),
        points: record.points,
        invincible: record.is_invincible(),
    }
}

/// All players in join order
pub fn roster<'a>(records: impl Iterator<Item = &'a PlayerRecord>) -> Vec<PlayerView> {
    let mut records: Vec<&PlayerRecord> = records.collect();
    records.sort_by_key(|r| r.seq);
    records.into_iter().map(player_view).collect()
}

pub fn winner(record: &PlayerRecord) -> Winner {
    Winner {
        id: record.id,
        name: record.name.clone(),
        color: record.color.clone(),
        points: record.points,
    }
}
