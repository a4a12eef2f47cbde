//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::level::LevelData;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    /// Latest local ship state (throttled client side)
    PositionUpdate {
        x: f64,
        y: f64,
        rotation: f64,
        vx: f64,
        vy: f64,
    },

    /// Points total after a checkpoint
    PointUpdate { points: u32 },

    /// Own ship had a hard collision; costs the crash penalty
    Collision,

    /// Own ship was lost to a wrecking ball or outside a match
    ShipLost,

    /// Own ball destroyed another ship
    DestroyShip { target_id: Uuid },

    /// Ask for a countdown when the room is idle
    RequestGameStart,

    /// Rebuilt ship after destruction
    Respawn,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    /// Sent once to a new connection
    Init {
        id: Uuid,
        players: Vec<PlayerView>,
        color: String,
        game_in_progress: bool,
        countdown_active: bool,
        celebration_active: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level_data: Option<LevelData>,
    },

    PlayerJoined(PlayerView),

    PlayerLeft { id: Uuid },

    /// Another player's position, relayed as received
    PlayerMoved {
        id: Uuid,
        x: f64,
        y: f64,
        rotation: f64,
        vx: f64,
        vy: f64,
        invincible: bool,
    },

    PlayerPoints { id: Uuid, points: u32 },

    /// Authoritative score change for the receiving player
    PointsEarned {
        /// Negative for penalties
        amount: i64,
        total: u32,
        reason: PointsReason,
    },

    /// The receiving player's ship was destroyed
    ShipDestroyed { destroyer_id: Uuid },

    /// A countdown began (or is already running, for late joiners)
    CountdownStart { countdown: u32, is_pre_match: bool },

    CountdownUpdate { countdown: u32, is_pre_match: bool },

    FinalCountdownStart { countdown: u32 },

    GameStart {
        /// Milliseconds
        match_duration: u64,
        level_data: LevelData,
    },

    /// Milliseconds left in the match
    TimeUpdate { time_remaining: u64 },

    GameEnd { winners: Vec<Winner> },

    /// Match aborted by an operator
    GameStopped { message: String },

    /// The receiving player's invincibility expired
    InvincibilityEnded,

    PlayerInvincibility { id: Uuid, invincible: bool },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },

    /// Error message
    Error { code: String, message: String },
}

/// Public view of a connected player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: Uuid,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub vx: f64,
    pub vy: f64,
    pub color: String,
    pub name: String,
    pub points: u32,
    pub invincible: bool,
}

/// Entry in the `game-end` winner list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Winner {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub points: u32,
}

/// Why a player's score changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PointsReason {
    /// Destroyed another ship
    Destroy,
    /// Hard collision penalty
    Crash,
}

/// Inbound frame errors
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Binary frames are not supported")]
    Binary,
}

impl ProtocolError {
    /// Machine-readable code for the `error` reply
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::Malformed(_) => "malformed_message",
            ProtocolError::Binary => "unsupported_frame",
        }
    }

    pub fn to_server_msg(&self) -> ServerMsg {
        ServerMsg::Error {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

impl ClientMsg {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_messages_parse() {
        let target = Uuid::new_v4();
        let cases = [
            (
                json!({"type": "position-update", "x": 1.5, "y": 2.0, "rotation": 0.3, "vx": -1.0, "vy": 0.0}),
                ClientMsg::PositionUpdate {
                    x: 1.5,
                    y: 2.0,
                    rotation: 0.3,
                    vx: -1.0,
                    vy: 0.0,
                },
            ),
            (json!({"type": "point-update", "points": 4}), ClientMsg::PointUpdate { points: 4 }),
            (json!({"type": "collision"}), ClientMsg::Collision),
            (json!({"type": "ship-lost"}), ClientMsg::ShipLost),
            (
                json!({"type": "destroy-ship", "targetId": target}),
                ClientMsg::DestroyShip { target_id: target },
            ),
            (json!({"type": "request-game-start"}), ClientMsg::RequestGameStart),
            (json!({"type": "respawn"}), ClientMsg::Respawn),
            (json!({"type": "ping", "t": 99}), ClientMsg::Ping { t: 99 }),
        ];

        for (value, expected) in cases {
            assert_eq!(ClientMsg::parse(&value.to_string()).unwrap(), expected);
        }
    }

    #[test]
    fn test_malformed_frames_are_rejected() {
        for text in [
            "not json",
            r#"{"type": "teleport"}"#,
            r#"{"type": "point-update", "points": -3}"#,
            r#"{"type": "destroy-ship"}"#,
        ] {
            let err = ClientMsg::parse(text).unwrap_err();
            assert_eq!(err.code(), "malformed_message");
            assert!(matches!(err.to_server_msg(), ServerMsg::Error { .. }));
        }
    }

    #[test]
    fn test_server_message_wire_names() {
        let id = Uuid::new_v4();

        let value = serde_json::to_value(ServerMsg::CountdownUpdate {
            countdown: 12,
            is_pre_match: true,
        })
        .unwrap();
        assert_eq!(value, json!({"type": "countdown-update", "countdown": 12, "isPreMatch": true}));

        let value = serde_json::to_value(ServerMsg::ShipDestroyed { destroyer_id: id }).unwrap();
        assert_eq!(value, json!({"type": "ship-destroyed", "destroyerId": id}));

        let value = serde_json::to_value(ServerMsg::InvincibilityEnded).unwrap();
        assert_eq!(value, json!({"type": "invincibility-ended"}));

        let value = serde_json::to_value(ServerMsg::PointsEarned {
            amount: -2,
            total: 0,
            reason: PointsReason::Crash,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"type": "points-earned", "amount": -2, "total": 0, "reason": "crash"})
        );
    }

    #[test]
    fn test_player_joined_is_flat() {
        let view = PlayerView {
            id: Uuid::nil(),
            x: 2000.0,
            y: 1500.0,
            rotation: 0.0,
            vx: 0.0,
            vy: 0.0,
            color: "#e74c3c".into(),
            name: "Player 1".into(),
            points: 0,
            invincible: false,
        };
        let value = serde_json::to_value(ServerMsg::PlayerJoined(view.clone())).unwrap();
        assert_eq!(value["type"], "player-joined");
        assert_eq!(value["name"], "Player 1");

        let back: ServerMsg = serde_json::from_value(value).unwrap();
        assert_eq!(back, ServerMsg::PlayerJoined(view));
    }

    #[test]
    fn test_init_omits_missing_level() {
        let value = serde_json::to_value(ServerMsg::Init {
            id: Uuid::nil(),
            players: vec![],
            color: "#3498db".into(),
            game_in_progress: false,
            countdown_active: true,
            celebration_active: false,
            level_data: None,
        })
        .unwrap();
        assert!(value.get("levelData").is_none());
        assert_eq!(value["countdownActive"], true);
    }
}
