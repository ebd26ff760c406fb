//! Application-level configuration loading: gameplay timings and the deck directory.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "HEADS_UP_BACK_CONFIG_PATH";
/// Directory scanned for deck definitions when the config does not name one.
const DEFAULT_DECKS_DIR: &str = "public/decks/data";

/// Timings driving a game session.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GameplayConfig {
    /// Pause between deck selection and the pile being dealt.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "play_start_delay_ms")]
    pub play_start_delay: Duration,
    /// Length of the play countdown.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "session_duration_ms")]
    pub session_duration: Duration,
    /// Length of the ready countdown.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "ready_countdown_ms")]
    pub ready_countdown: Duration,
    /// How long "time up" stays on screen before the session ends.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "time_up_ms")]
    pub time_up: Duration,
    /// How long answer feedback is shown before the verdict is recorded.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "feedback_ms")]
    pub feedback: Duration,
    /// Cooldown of the gesture debounce.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "gesture_debounce_ms")]
    pub gesture_debounce: Duration,
    /// Window at the end of the play countdown that raises the final-seconds cue.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "final_seconds_ms")]
    pub final_seconds: Duration,
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            play_start_delay: Duration::from_millis(1000),
            session_duration: Duration::from_millis(15_000),
            ready_countdown: Duration::from_millis(3000),
            time_up: Duration::from_millis(5000),
            feedback: Duration::from_millis(1000),
            gesture_debounce: Duration::from_millis(1000),
            final_seconds: Duration::from_millis(10_000),
        }
    }
}

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Session timings.
    #[serde(flatten)]
    pub gameplay: GameplayConfig,
    /// Directory holding one JSON file per deck.
    pub decks_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gameplay: GameplayConfig::default(),
            decks_dir: PathBuf::from(DEFAULT_DECKS_DIR),
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        decks_dir = %config.decks_dir.display(),
                        "loaded configuration"
                    );
                    config
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

    /// Parse a configuration document. Missing fields keep their defaults.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str(contents)
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
