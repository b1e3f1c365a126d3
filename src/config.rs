use std::env;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_CACHE_TTL_MS: u64 = 2000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    Espn,
    Fake,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub game_id: Option<String>,
    pub source: FeedSource,
    pub league: String,
    pub poll_interval: Duration,
    pub cache_ttl: Duration,
    pub fetch_parallelism: usize,
    pub request_timeout: Duration,
    pub log_file: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            game_id: None,
            source: FeedSource::Espn,
            league: "nfl".to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            cache_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            fetch_parallelism: 6,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            log_file: "gridiron_terminal.log".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let source = match opt_env("FEED_SOURCE")
            .map(|val| val.to_lowercase())
            .as_deref()
        {
            Some("fake") | Some("demo") => FeedSource::Fake,
            _ => FeedSource::Espn,
        };
        Self {
            game_id: opt_env("GAME_ID"),
            source,
            league: opt_env("ESPN_LEAGUE").unwrap_or(defaults.league),
            poll_interval: Duration::from_millis(
                env_u64("POLL_INTERVAL_MS")
                    .unwrap_or(DEFAULT_POLL_INTERVAL_MS)
                    .max(500),
            ),
            cache_ttl: Duration::from_millis(
                env_u64("HTTP_CACHE_TTL_MS").unwrap_or(DEFAULT_CACHE_TTL_MS),
            ),
            fetch_parallelism: env_u64("FETCH_PARALLELISM")
                .map(|val| val as usize)
                .unwrap_or(defaults.fetch_parallelism)
                .clamp(2, 32),
            request_timeout: request_timeout(env_u64("REQUEST_TIMEOUT_SECS")),
            log_file: opt_env("LOG_FILE").unwrap_or(defaults.log_file),
        }
    }
}

fn request_timeout(secs: Option<u64>) -> Duration {
    Duration::from_secs(secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS).max(1))
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|val| {
        if val.trim().is_empty() {
            None
        } else {
            Some(val.trim().to_string())
        }
    })
}

fn env_u64(key: &str) -> Option<u64> {
    opt_env(key).and_then(|val| val.parse::<u64>().ok())
}
