use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::crypto::Network;

/// Sender name reserved for mining rewards. Transactions from it skip
/// signature and balance checks.
pub const MINING_SENDER: &str = "THE BLOCKCHAIN";

/// Consensus policy knobs. Defaults are the compatibility values.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusParams {
    /// Leading hex zeros required when the chain is "on pace".
    pub baseline_difficulty: u32,
    /// Mining faster than this (seconds) raises difficulty.
    pub fast_threshold_secs: f64,
    /// Mining slower than this (seconds) lowers difficulty.
    pub slow_threshold_secs: f64,
    /// Wall-clock budget for one nonce search.
    pub pow_timeout: Duration,
    pub mining_reward: f64,
    /// Blocks from this index on must carry a valid proof in `valid_chain`.
    pub proof_check_from: usize,
    /// Random extra delay added to the mining-speed estimate between attempts.
    pub mining_jitter_secs: (f64, f64),
    /// Mining-speed estimate above which the slow band pulls it back down.
    pub mining_speed_ceiling: f64,
    pub network: Network,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            baseline_difficulty: 3,
            fast_threshold_secs: 0.0478,
            slow_threshold_secs: 0.5957,
            pow_timeout: Duration::from_secs(10),
            mining_reward: 1.0,
            proof_check_from: 1,
            mining_jitter_secs: (9.8, 10.3),
            mining_speed_ceiling: 5.5,
            network: Network::Mainnet,
        }
    }
}

/// Process-level settings for one node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    /// `host:port` other nodes use to reach us.
    pub public_addr: String,
    pub core_peers: Vec<String>,
    pub mining_enabled: bool,
    pub sync_interval: Duration,
    pub consensus: ConsensusParams,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            public_addr: "127.0.0.1:8080".to_string(),
            core_peers: Vec::new(),
            mining_enabled: true,
            sync_interval: Duration::from_secs(20),
            consensus: ConsensusParams::default(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Seconds as a `Duration`; negative, non-finite or unparsable input gives
/// `default`.
fn parse_secs(raw: &str, default: Duration) -> Duration {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(default)
}

fn secs_or(key: &str, default: Duration) -> Duration {
    env::var(key)
        .map(|v| parse_secs(&v, default))
        .unwrap_or(default)
}

fn parse_peers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

impl NodeConfig {
    /// Read settings from the environment (after `.env` has been loaded).
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = NodeConfig::default();
        let consensus_defaults = ConsensusParams::default();

        let host = env::var("HOST").unwrap_or(defaults.host);
        let port: u16 = env_or("PORT", defaults.port);
        let public_addr = env::var("PUBLIC_ADDR").unwrap_or_else(|_| format!("{host}:{port}"));
        let core_peers = env::var("CORE_PEERS")
            .map(|v| parse_peers(&v))
            .unwrap_or_default();

        let consensus = ConsensusParams {
            baseline_difficulty: env_or("BASELINE_DIFFICULTY", consensus_defaults.baseline_difficulty)
                .max(1),
            fast_threshold_secs: env_or("FAST_THRESHOLD_SECS", consensus_defaults.fast_threshold_secs),
            slow_threshold_secs: env_or("SLOW_THRESHOLD_SECS", consensus_defaults.slow_threshold_secs),
            pow_timeout: secs_or("POW_TIMEOUT_SECS", consensus_defaults.pow_timeout),
            mining_reward: env_or("MINING_REWARD", consensus_defaults.mining_reward),
            proof_check_from: env_or("PROOF_CHECK_FROM", consensus_defaults.proof_check_from).max(1),
            network: env_or("NETWORK", consensus_defaults.network),
            ..consensus_defaults
        };

        Self {
            host,
            port,
            public_addr,
            core_peers,
            mining_enabled: env_or("MINING_ENABLED", defaults.mining_enabled),
            sync_interval: Duration::from_secs(env_or(
                "SYNC_INTERVAL_SECS",
                defaults.sync_interval.as_secs(),
            )),
            consensus,
        }
    }
}
