use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VoiceLabError};

/// Model name passed to the Coqui `tts` command when no local weights are configured.
pub const XTTS_MODEL_NAME: &str = "tts_models/multilingual/multi-dataset/xtts_v2";

/// Parameters for configuring the engine and its backends.
///
/// ```rust
/// use std::time::Duration;
/// use voicelab::EngineConfigBuilder;
///
/// let config = EngineConfigBuilder::default()
///     .model_dir("models/xtts_v2")
///     .ready_timeout(Duration::from_secs(120))
///     .build()
///     .unwrap();
/// assert_eq!(config.default_language, "pt");
/// ```
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default)]
#[serde(default)]
pub struct EngineConfig {
    /// Coqui `tts` executable driving the XTTS-v2 model.
    #[builder(setter(into))]
    pub xtts_command: String,
    /// Directory with local XTTS-v2 weights (`model.pth`, `config.json`, `vocab.json`).
    /// `None` lets the tool resolve `model_name` from its own cache.
    #[builder(setter(into, strip_option))]
    pub model_dir: Option<PathBuf>,
    #[builder(setter(into))]
    pub model_name: String,
    /// espeak-ng executable used by the fallback backend.
    #[builder(setter(into))]
    pub espeak_command: String,
    /// How long a request waits for the background load before failing as not ready.
    pub ready_timeout: Duration,
    /// Language used when a request names one the backend does not support.
    #[builder(setter(into))]
    pub default_language: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            xtts_command: "tts".to_string(),
            model_dir: None,
            model_name: XTTS_MODEL_NAME.to_string(),
            espeak_command: "espeak-ng".to_string(),
            ready_timeout: Duration::from_secs(600),
            default_language: "pt".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        if config.ready_timeout.is_zero() {
            return Err(VoiceLabError::Config(
                "ready_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }
}
