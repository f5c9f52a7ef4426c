//! Runtime configuration loaded from the environment.
//!
//! Every accessor has a sane default and `from_env` never panics: a missing
//! or malformed variable falls back silently rather than aborting startup,
//! matching the degraded-but-running posture the rest of the replica takes
//! toward a partitioned peer.

use std::env;

const DEFAULT_MAX_CHANGES: u64 = 100;
const DEFAULT_SYNC_DELTA_SECS: i64 = 300;
const DEFAULT_PLANNING_WINDOW_SECS: i64 = 31 * 24 * 3600;
const DEFAULT_PLANNING_INTERVAL_SECS: i64 = 3600;
const DEFAULT_SHARES: u32 = 100;

#[derive(Debug, Clone)]
pub struct Config {
    pub peers: Vec<String>,
    pub peer_secret: String,
    pub peer_strict: bool,
    pub host_id: String,
    pub max_changes: u64,
    pub sync_delta_secs: i64,
    pub planning_window_secs: i64,
    pub planning_interval_secs: i64,
    pub shares: u32,
    pub time_offset_secs: i64,
    pub rust_log: String,
}

impl Config {
    /// Build a `Config` from the process environment. Unset or unparsable
    /// values fall back to their documented defaults.
    pub fn from_env() -> Self {
        Self {
            peers: parse_peers(env::var("PEERS").ok()),
            peer_secret: env::var("PEER_SECRET").unwrap_or_default(),
            peer_strict: parse_bool(env::var("PEER_STRICT").ok(), false),
            host_id: env::var("HOST_ID").unwrap_or_else(|_| default_host_id()),
            max_changes: parse_or(env::var("MAX_CHANGES").ok(), DEFAULT_MAX_CHANGES),
            sync_delta_secs: parse_or(env::var("SYNC_DELTA").ok(), DEFAULT_SYNC_DELTA_SECS),
            planning_window_secs: parse_or(
                env::var("PLANNING_WINDOW").ok(),
                DEFAULT_PLANNING_WINDOW_SECS,
            ),
            planning_interval_secs: parse_or(
                env::var("PLANNING_INTERVAL").ok(),
                DEFAULT_PLANNING_INTERVAL_SECS,
            ),
            shares: parse_or(env::var("SHARES").ok(), DEFAULT_SHARES),
            time_offset_secs: parse_or(env::var("TIME_OFFSET").ok(), 0),
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

fn default_host_id() -> String {
    format!("horao-{}", uuid::Uuid::new_v4())
}

fn parse_peers(raw: Option<String>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_bool(raw: Option<String>, default: bool) -> bool {
    raw.and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_vars_fall_back_to_defaults() {
        let config = Config {
            peers: parse_peers(None),
            peer_secret: env::var("PEER_SECRET_NONEXISTENT_KEY").unwrap_or_default(),
            peer_strict: parse_bool(None, false),
            host_id: "host-a".to_string(),
            max_changes: parse_or(None, DEFAULT_MAX_CHANGES),
            sync_delta_secs: parse_or(None, DEFAULT_SYNC_DELTA_SECS),
            planning_window_secs: parse_or(None, DEFAULT_PLANNING_WINDOW_SECS),
            planning_interval_secs: parse_or(None, DEFAULT_PLANNING_INTERVAL_SECS),
            shares: parse_or(None, DEFAULT_SHARES),
            time_offset_secs: parse_or(None, 0),
            rust_log: "info".to_string(),
        };

        assert!(config.peers.is_empty());
        assert!(config.peer_secret.is_empty());
        assert!(!config.peer_strict);
        assert_eq!(config.max_changes, 100);
        assert_eq!(config.sync_delta_secs, 300);
        assert_eq!(config.planning_window_secs, 31 * 24 * 3600);
        assert_eq!(config.planning_interval_secs, 3600);
        assert_eq!(config.shares, 100);
    }

    #[test]
    fn peers_list_is_comma_split_and_trimmed() {
        let peers = parse_peers(Some(" http://a:8080 , http://b:8080,,http://c:8080 ".to_string()));
        assert_eq!(
            peers,
            vec![
                "http://a:8080".to_string(),
                "http://b:8080".to_string(),
                "http://c:8080".to_string(),
            ]
        );
    }

    #[test]
    fn malformed_numeric_value_falls_back_rather_than_panicking() {
        let max_changes: u64 = parse_or(Some("not-a-number".to_string()), DEFAULT_MAX_CHANGES);
        assert_eq!(max_changes, DEFAULT_MAX_CHANGES);
    }

    #[test]
    fn bool_parses_true_and_false_case_sensitively_via_fromstr() {
        assert!(parse_bool(Some("true".to_string()), false));
        assert!(!parse_bool(Some("false".to_string()), true));
        assert!(!parse_bool(Some("garbage".to_string()), false));
    }
}
