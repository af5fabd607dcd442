use std::time::Duration;

/// Runtime configuration. Everything has a default; `from_env` overrides
/// from `QUORUM_*` variables the same way the process would be deployed.
#[derive(Debug, Clone)]
pub struct Config {
    /// When false the decision backend admits everything (SAT, 0 ms).
    pub solver_enabled: bool,
    /// Hard deadline for one feasibility check.
    pub solver_timeout: Duration,
    /// Grid increment for availability search, in minutes.
    pub slot_increment_min: i64,
    /// How often the background checker evaluates unresolved meetings.
    pub checkpoint_interval: Duration,
    /// WAL appends since last compaction that trigger a new compaction.
    pub compact_threshold: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            solver_enabled: true,
            solver_timeout: Duration::from_millis(5000),
            slot_increment_min: 15,
            checkpoint_interval: Duration::from_secs(60),
            compact_threshold: 1000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            solver_enabled: env_parse("QUORUM_SOLVER_ENABLED", defaults.solver_enabled),
            solver_timeout: Duration::from_millis(env_parse(
                "QUORUM_SOLVER_TIMEOUT_MS",
                defaults.solver_timeout.as_millis() as u64,
            )),
            slot_increment_min: env_parse(
                "QUORUM_SLOT_INCREMENT_MINUTES",
                defaults.slot_increment_min,
            ),
            checkpoint_interval: Duration::from_secs(env_parse(
                "QUORUM_CHECKPOINT_INTERVAL_SECS",
                defaults.checkpoint_interval.as_secs(),
            )),
            compact_threshold: env_parse("QUORUM_COMPACT_THRESHOLD", defaults.compact_threshold),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
