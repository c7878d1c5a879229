//! Process-wide configuration resolved once at startup from the environment
//! (see SPEC_FULL.md §6.3). Mirrors the reference stack's builder-with-
//! defaults pattern: every field has a sensible default, and an environment
//! variable present at startup overrides it.

use std::env;
use std::path::PathBuf;

/// `30 days` expressed in milliseconds, used by the recency term in scoring.
pub const RECENCY_HALF_LIFE_MS: i64 = 30 * 24 * 3600 * 1000;

/// How long a lock holder may go without refreshing before a contender may
/// forcibly reclaim the lock.
pub const LOCK_STALE_TIMEOUT_MS: u64 = 10_000;

/// The interval at which a lock holder should refresh ("touch") the lock.
/// Must stay below [`LOCK_STALE_TIMEOUT_MS`].
pub const LOCK_REFRESH_INTERVAL_MS: u64 = 5_000;

/// Maximum number of acquisition attempts before surfacing
/// `LockAcquisitionFailed`.
pub const LOCK_MAX_RETRIES: u32 = 5;

/// Exponential backoff bounds between lock acquisition attempts.
pub const LOCK_BACKOFF_MIN_MS: u64 = 100;
pub const LOCK_BACKOFF_MAX_MS: u64 = 2_000;
pub const LOCK_BACKOFF_FACTOR: u64 = 2;

/// Resolved, immutable process configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Path to the single-file store.
    pub memory_file_path: PathBuf,
    /// Max distinct entities selected per query term.
    pub search_top_per_token: usize,
    /// Per-term cutoff as a fraction of that term's top score.
    pub search_min_relative_score: f64,
    /// Hop cap for pairwise shortest paths.
    pub search_max_path_length: usize,
    /// Cap on the number of nodes returned by a search.
    pub search_max_total_nodes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_file_path: default_memory_file_path(),
            search_top_per_token: 1,
            search_min_relative_score: 0.3,
            search_max_path_length: 5,
            search_max_total_nodes: 50,
        }
    }
}

fn default_memory_file_path() -> PathBuf {
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("data")
        .join("memory.jsonl")
}

impl Config {
    /// Resolve configuration from the process environment, falling back to
    /// defaults for any variable that is absent or unparsable.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            memory_file_path: env::var("MEMORY_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.memory_file_path),
            search_top_per_token: env_parse("SEARCH_TOP_PER_TOKEN")
                .unwrap_or(defaults.search_top_per_token),
            search_min_relative_score: env_parse("SEARCH_MIN_RELATIVE_SCORE")
                .unwrap_or(defaults.search_min_relative_score),
            search_max_path_length: env_parse("SEARCH_MAX_PATH_LENGTH")
                .unwrap_or(defaults.search_max_path_length),
            search_max_total_nodes: env_parse("SEARCH_MAX_TOTAL_NODES")
                .unwrap_or(defaults.search_max_total_nodes),
        }
    }

    /// Builder entry point for tests and the CLI's `--memory-file` override.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Builder for [`Config`], used by the CLI to layer per-invocation
/// overrides (e.g. `--memory-file`) on top of the environment-resolved base.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    base: Option<Config>,
    memory_file_path: Option<PathBuf>,
}

impl ConfigBuilder {
    pub fn from_env(mut self) -> Self {
        self.base = Some(Config::from_env());
        self
    }

    pub fn memory_file_path(mut self, path: PathBuf) -> Self {
        self.memory_file_path = Some(path);
        self
    }

    pub fn build(self) -> Config {
        let mut config = self.base.unwrap_or_default();
        if let Some(path) = self.memory_file_path {
            config.memory_file_path = path;
        }
        config
    }
}
