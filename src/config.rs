//! Application-level configuration loading, including race timings and input bounds.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::ruleset::{RaceFormat, Ruleset};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "RACE_LOBBY_CONFIG_PATH";

const DEFAULT_START_DELAY: Duration = Duration::from_secs(10);
const DEFAULT_SOLO_START_DELAY: Duration = Duration::from_secs(3);
const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(30 * 60);
const DEFAULT_CUSTOM_TIME_LIMIT: Duration = Duration::from_secs(4 * 60 * 60);
const DEFAULT_PERSIST_TIMEOUT: Duration = Duration::from_secs(5);

/// Delays driving the time-based race lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceTimings {
    /// Countdown between "everyone ready" and the race start.
    pub start_delay: Duration,
    /// Countdown used instead of `start_delay` for solo races.
    pub solo_start_delay: Duration,
    /// Time limit after which remaining racers are forced to quit.
    pub time_limit: Duration,
    /// Time limit for custom (multi-character) races.
    pub custom_time_limit: Duration,
}

impl RaceTimings {
    /// Countdown applying to a race with the given ruleset.
    pub fn start_delay_for(&self, ruleset: &Ruleset) -> Duration {
        if ruleset.solo {
            self.solo_start_delay
        } else {
            self.start_delay
        }
    }

    /// Time limit applying to a race with the given ruleset.
    pub fn time_limit_for(&self, ruleset: &Ruleset) -> Duration {
        if ruleset.format == RaceFormat::Custom {
            self.custom_time_limit
        } else {
            self.time_limit
        }
    }
}

impl Default for RaceTimings {
    fn default() -> Self {
        Self {
            start_delay: DEFAULT_START_DELAY,
            solo_start_delay: DEFAULT_SOLO_START_DELAY,
            time_limit: DEFAULT_TIME_LIMIT,
            custom_time_limit: DEFAULT_CUSTOM_TIME_LIMIT,
        }
    }
}

/// Bounds applied to user-provided values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceLimits {
    /// Highest valid item identifier (also bounds the instant-start item).
    pub max_item_id: u32,
    /// Highest valid starting build identifier.
    pub max_build_id: u32,
    /// Number of live races a single identity may captain at once.
    pub max_captained_races: usize,
    /// Maximum comment length, in characters.
    pub max_comment_length: usize,
}

impl Default for RaceLimits {
    fn default() -> Self {
        Self {
            max_item_id: 732,
            max_build_id: 33,
            max_captained_races: 2,
            max_comment_length: 150,
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    timings: RaceTimings,
    limits: RaceLimits,
    persist_timeout: Option<Duration>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        timings = ?app_config.timings,
                        "loaded race configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Replace the lifecycle timings (used by tests to shorten countdowns).
    pub fn with_timings(mut self, timings: RaceTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Replace the bound on persistence gateway calls.
    pub fn with_persist_timeout(mut self, persist_timeout: Duration) -> Self {
        self.persist_timeout = Some(persist_timeout);
        self
    }

    /// Lifecycle timings.
    pub fn timings(&self) -> &RaceTimings {
        &self.timings
    }

    /// Input bounds.
    pub fn limits(&self) -> &RaceLimits {
        &self.limits
    }

    /// Upper bound on a single persistence gateway call.
    pub fn persist_timeout(&self) -> Duration {
        self.persist_timeout.unwrap_or(DEFAULT_PERSIST_TIMEOUT)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    start_delay_secs: Option<u64>,
    solo_start_delay_secs: Option<u64>,
    time_limit_secs: Option<u64>,
    custom_time_limit_secs: Option<u64>,
    max_item_id: Option<u32>,
    max_build_id: Option<u32>,
    max_captained_races: Option<usize>,
    max_comment_length: Option<usize>,
    persist_timeout_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = RaceTimings::default();
        let timings = RaceTimings {
            start_delay: value
                .start_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.start_delay),
            solo_start_delay: value
                .solo_start_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.solo_start_delay),
            time_limit: value
                .time_limit_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.time_limit),
            custom_time_limit: value
                .custom_time_limit_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.custom_time_limit),
        };

        let defaults = RaceLimits::default();
        let limits = RaceLimits {
            max_item_id: value.max_item_id.unwrap_or(defaults.max_item_id),
            max_build_id: value.max_build_id.unwrap_or(defaults.max_build_id),
            max_captained_races: value
                .max_captained_races
                .unwrap_or(defaults.max_captained_races),
            max_comment_length: value
                .max_comment_length
                .unwrap_or(defaults.max_comment_length),
        };

        Self {
            timings,
            limits,
            persist_timeout: value.persist_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
