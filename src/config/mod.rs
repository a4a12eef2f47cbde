//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::level::LevelType;
use crate::game::scoring::MatchRules;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Allowed client origins for CORS; empty allows any
    pub client_origins: Vec<String>,
    /// Bearer token for the admin routes; admin is disabled when unset
    pub admin_token: Option<String>,

    /// Arena width
    pub level_width: f64,
    /// Arena height
    pub level_height: f64,
    pub level_type: LevelType,

    /// Active match length in seconds
    pub match_duration_secs: u64,
    pub points_to_win: u32,
    /// Lead required over second place at the threshold
    pub min_point_difference: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosted platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:3001".to_string()),
        };

        let client_origins = lookup("CLIENT_ORIGIN")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            client_origins,
            admin_token: lookup("ADMIN_TOKEN").filter(|t| !t.is_empty()),

            level_width: parse_or(&lookup, "LEVEL_WIDTH", 4000.0)?,
            level_height: parse_or(&lookup, "LEVEL_HEIGHT", 3000.0)?,
            level_type: parse_or(&lookup, "LEVEL_TYPE", LevelType::Technical)?,

            match_duration_secs: parse_or(&lookup, "MATCH_DURATION_SECS", 300)?,
            points_to_win: parse_or(&lookup, "POINTS_TO_WIN", 11)?,
            min_point_difference: parse_or(&lookup, "MIN_POINT_DIFFERENCE", 2)?,
        };

        if !(config.level_width > 0.0 && config.level_height > 0.0) {
            return Err(ConfigError::Invalid {
                key: "LEVEL_WIDTH/LEVEL_HEIGHT",
                value: format!("{}x{}", config.level_width, config.level_height),
            });
        }
        if config.match_duration_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "MATCH_DURATION_SECS",
                value: "0".to_string(),
            });
        }
        if config.points_to_win == 0 {
            return Err(ConfigError::Invalid {
                key: "POINTS_TO_WIN",
                value: "0".to_string(),
            });
        }

        Ok(config)
    }

    /// Match rules with the configured overrides
    pub fn match_rules(&self) -> MatchRules {
        MatchRules {
            points_to_win: self.points_to_win,
            min_point_difference: self.min_point_difference,
            match_duration_ms: self.match_duration_secs * 1000,
            ..MatchRules::default()
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = assert_ok!(load(&[]));
        assert_eq!(config.server_addr.port(), 3001);
        assert_eq!(config.log_level, "info");
        assert!(config.client_origins.is_empty());
        assert!(config.admin_token.is_none());
        assert_eq!((config.level_width, config.level_height), (4000.0, 3000.0));
        assert_eq!(config.level_type, LevelType::Technical);

        let rules = config.match_rules();
        assert_eq!(rules.points_to_win, 11);
        assert_eq!(rules.min_point_difference, 2);
        assert_eq!(rules.match_duration_ms, 300_000);
    }

    #[test]
    fn test_port_wins_over_server_addr() {
        let config = assert_ok!(load(&[("PORT", "9000"), ("SERVER_ADDR", "127.0.0.1:5000")]));
        assert_eq!(config.server_addr.port(), 9000);

        let config = assert_ok!(load(&[("SERVER_ADDR", "127.0.0.1:5000")]));
        assert_eq!(config.server_addr.to_string(), "127.0.0.1:5000");
    }

    #[test]
    fn test_overrides() {
        let config = assert_ok!(load(&[
            ("LEVEL_TYPE", "open"),
            ("MATCH_DURATION_SECS", "120"),
            ("POINTS_TO_WIN", "21"),
            ("CLIENT_ORIGIN", "http://a.test, http://b.test"),
            ("ADMIN_TOKEN", "s3cret"),
        ]));
        assert_eq!(config.level_type, LevelType::Open);
        assert_eq!(config.match_rules().match_duration_ms, 120_000);
        assert_eq!(config.points_to_win, 21);
        assert_eq!(config.client_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_invalid_values() {
        assert_err!(load(&[("PORT", "not-a-port")]));
        assert_err!(load(&[("LEVEL_TYPE", "maze")]));
        assert_err!(load(&[("POINTS_TO_WIN", "-1")]));
        assert_err!(load(&[("LEVEL_WIDTH", "0")]));
        assert_err!(load(&[("MATCH_DURATION_SECS", "0")]));
        assert_err!(load(&[("POINTS_TO_WIN", "0")]));
        assert_ok!(load(&[("MIN_POINT_DIFFERENCE", "0")]));
    }
}
