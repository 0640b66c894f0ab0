//! Application configuration
//!
//! Stored as TOML under the user's config directory
//! (`~/.config/padwatch/config.toml` on Linux). A missing file is replaced by
//! the defaults on first start, so the file always documents every setting.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Level};

use crate::haptics::Waveform;
use crate::platform::ButtonType;

const CONFIG_DIR: &str = "padwatch";
const CONFIG_FILE: &str = "config.toml";

// Config errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// What the poll loop reports and drives
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PollMode {
    /// Log every new input reading
    Timestamps,
    /// Log rising edges of the tracked button
    Edges,
    /// Rising edges cycle the haptic channel driven by the waveform
    #[default]
    Haptics,
}

/// Sleep between two poll ticks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PollInterval {
    Fixed { fixed_ms: u64 },
    Randomized { min_ms: u64, max_ms: u64 },
}

impl Default for PollInterval {
    fn default() -> Self {
        PollInterval::Fixed { fixed_ms: 100 }
    }
}

impl PollInterval {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            PollInterval::Fixed { fixed_ms: 0 } => Err(ConfigError::Invalid(
                "poll interval must be greater than 0 ms".to_string(),
            )),
            PollInterval::Randomized { min_ms, max_ms } if min_ms == 0 || min_ms > max_ms => {
                Err(ConfigError::Invalid(format!(
                    "randomized poll interval needs 0 < min_ms <= max_ms, got {}..{}",
                    min_ms, max_ms
                )))
            }
            _ => Ok(()),
        }
    }

    /// Duration of the next sleep
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match *self {
            PollInterval::Fixed { fixed_ms } => Duration::from_millis(fixed_ms),
            PollInterval::Randomized { min_ms, max_ms } => {
                Duration::from_millis(rng.gen_range(min_ms..=max_ms))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub mode: PollMode,
    pub tracked_button: ButtonType,
    pub stats_interval_secs: u64,
    // Kept last, it serializes as a sub-table
    pub interval: PollInterval,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            mode: PollMode::default(),
            tracked_button: ButtonType::A,
            stats_interval_secs: 10,
            interval: PollInterval::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HapticsConfig {
    pub amplitude: f64,
    pub frequency_hz: f64,
    pub phase: f64,
    pub offset: f64,
    /// Zero the other channels whenever one is driven
    pub reset_inactive_channels: bool,
}

impl Default for HapticsConfig {
    fn default() -> Self {
        let wave = Waveform::default();
        Self {
            amplitude: wave.amplitude,
            frequency_hz: wave.frequency_hz,
            phase: wave.phase,
            offset: wave.offset,
            reset_inactive_channels: false,
        }
    }
}

impl HapticsConfig {
    pub fn waveform(&self) -> Waveform {
        Waveform {
            amplitude: self.amplitude,
            frequency_hz: self.frequency_hz,
            phase: self.phase,
            offset: self.offset,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.frequency_hz.is_finite() && self.frequency_hz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "haptics frequency must be positive, got {}",
                self.frequency_hz
            )));
        }
        let wave = self.waveform();
        if !(wave.min() >= 0.0 && wave.max() <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "haptics waveform must stay within [0, 1], got [{}, {}]",
                wave.min(),
                wave.max()
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn level(&self) -> Result<Level, ConfigError> {
        self.level
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level '{}'", self.level)))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub poll: PollConfig,
    pub haptics: HapticsConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.poll.interval.validate()?;
        self.haptics.validate()?;
        self.logging.level()?;
        Ok(())
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reads and validates the config file at `path`
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml(&content)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(path, self.to_toml()?)
            .await
            .map_err(io_err)?;
        info!("Config saved to {}", path.display());
        Ok(())
    }

    /// Writes the default config to `path` unless a file already exists.
    /// Returns true if the file was created.
    pub async fn ensure_default_config(path: &Path) -> Result<bool, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if exists {
            return Ok(false);
        }
        Self::default().save(path).await?;
        Ok(true)
    }
}

/// Location of the config file when none is given on the command line
pub fn default_config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| {
        warn!("Could not determine config directory, using current directory");
        PathBuf::from(".")
    });
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.poll.mode, PollMode::Haptics);
        assert_eq!(config.poll.tracked_button, ButtonType::A);
        assert_eq!(config.poll.interval, PollInterval::Fixed { fixed_ms: 100 });
        assert_eq!(config.haptics.waveform(), Waveform::default());
        assert!(!config.haptics.reset_inactive_channels);
        assert_eq!(config.logging.level().ok(), Some(Level::INFO));
    }

    #[test]
    fn parses_randomized_interval_and_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [poll]
            mode = "edges"
            tracked_button = "B"
            interval = { min_ms = 50, max_ms = 100 }
            "#,
        )
        .expect("valid config");

        assert_eq!(config.poll.mode, PollMode::Edges);
        assert_eq!(config.poll.tracked_button, ButtonType::B);
        assert_eq!(
            config.poll.interval,
            PollInterval::Randomized {
                min_ms: 50,
                max_ms: 100
            }
        );
        assert_eq!(config.poll.stats_interval_secs, 10);
        assert_eq!(config.haptics, HapticsConfig::default());
    }

    #[test]
    fn toml_round_trip_keeps_settings() {
        let mut config = AppConfig::default();
        config.poll.interval = PollInterval::Randomized {
            min_ms: 60,
            max_ms: 90,
        };
        config.haptics.reset_inactive_channels = true;

        let text = config.to_toml().expect("serializable");
        assert_eq!(AppConfig::from_toml(&text).expect("parsable"), config);
    }

    #[test]
    fn rejects_invalid_values() {
        let zero = AppConfig::from_toml("[poll]\ninterval = { fixed_ms = 0 }\n");
        assert!(matches!(zero, Err(ConfigError::Invalid(_))));

        let inverted = AppConfig::from_toml("[poll]\ninterval = { min_ms = 90, max_ms = 50 }\n");
        assert!(matches!(inverted, Err(ConfigError::Invalid(_))));

        let loud = AppConfig::from_toml("[haptics]\namplitude = 0.9\n");
        assert!(matches!(loud, Err(ConfigError::Invalid(_))));

        let level = AppConfig::from_toml("[logging]\nlevel = \"chatty\"\n");
        assert!(matches!(level, Err(ConfigError::Invalid(_))));

        let garbage = AppConfig::from_toml("[poll\n");
        assert!(matches!(garbage, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn randomized_delay_stays_in_range() {
        let interval = PollInterval::Randomized {
            min_ms: 50,
            max_ms: 100,
        };
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let delay = interval.next_delay(&mut rng);
            assert!(delay >= Duration::from_millis(50));
            assert!(delay <= Duration::from_millis(100));
        }

        let fixed = PollInterval::Fixed { fixed_ms: 200 };
        let mut step = StepRng::new(0, 1);
        assert_eq!(fixed.next_delay(&mut step), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn ensure_default_config_writes_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(CONFIG_FILE);

        assert!(AppConfig::ensure_default_config(&path).await.expect("created"));
        assert!(!AppConfig::ensure_default_config(&path).await.expect("exists"));

        let loaded = AppConfig::load(&path).await.expect("loadable");
        assert_eq!(loaded, AppConfig::default());
    }

    #[tokio::test]
    async fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = AppConfig::load(&dir.path().join("missing.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
