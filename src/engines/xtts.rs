//! XTTS-v2 voice-cloning backend.
//!
//! Drives the Coqui `tts` command. Each request clones the speaker from a
//! reference WAV and returns the model output at its native rate (24 kHz).
//!
//! # Model Directory Layout
//!
//! ```text
//! models/xtts_v2/
//! ├── model.pth      # Model weights (~1.8 GB)
//! ├── config.json    # Model configuration
//! └── vocab.json     # Tokenizer vocabulary
//! ```
//!
//! Without a model directory the tool resolves
//! [`XTTS_MODEL_NAME`](crate::config::XTTS_MODEL_NAME) from its own cache,
//! downloading it on first use.
//!
//! Loading ends with a short warm-up synthesis, so a model that cannot be
//! fetched or run fails the load instead of every later request.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{BackendKind, BackendLoader};
use crate::config::EngineConfig;
use crate::error::{Result, VoiceLabError};
use crate::{SignalBuffer, SynthesisBackend};

/// Language codes XTTS-v2 accepts.
pub const XTTS_LANGUAGES: [&str; 16] = [
    "pt", "en", "es", "fr", "de", "it", "pl", "tr", "ru", "nl", "cs", "ar", "zh-cn", "ja", "hu",
    "ko",
];

const REQUIRED_MODEL_FILES: [&str; 3] = ["model.pth", "config.json", "vocab.json"];

const WARMUP_TEXT: &str = "Ok.";
const WARMUP_RATE: u32 = 24000;

/// Where the model comes from.
#[derive(Debug, Clone, PartialEq)]
enum ModelSource {
    Directory(PathBuf),
    Named(String),
}

/// Loads the XTTS-v2 backend: verifies the weights and the `tts` executable,
/// then runs one warm-up synthesis.
#[derive(Debug, Clone)]
pub struct XttsLoader {
    command: String,
    source: ModelSource,
    default_language: String,
}

impl XttsLoader {
    pub fn from_config(config: &EngineConfig) -> Self {
        let source = match &config.model_dir {
            Some(dir) => ModelSource::Directory(dir.clone()),
            None => ModelSource::Named(config.model_name.clone()),
        };
        Self {
            command: config.xtts_command.clone(),
            source,
            default_language: config.default_language.clone(),
        }
    }

    fn check_weights(dir: &Path) -> Result<()> {
        for name in REQUIRED_MODEL_FILES {
            let path = dir.join(name);
            if !path.is_file() {
                return Err(VoiceLabError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("XTTS-v2 weights incomplete: {} is missing", path.display()),
                )));
            }
        }
        Ok(())
    }

    fn check_command(&self) -> Result<()> {
        let status = Command::new(&self.command)
            .arg("--help")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    VoiceLabError::ToolNotFound(self.command.clone())
                } else {
                    VoiceLabError::Io(e)
                }
            })?;
        if !status.success() {
            return Err(VoiceLabError::ToolNotFound(format!(
                "{} (--help exited with {:?})",
                self.command,
                status.code()
            )));
        }
        Ok(())
    }

    /// One short synthesis against a synthetic reference. This is where a
    /// first run downloads the model.
    fn warm_up(&self, backend: &mut XttsBackend) -> Result<()> {
        let reference = tempfile::Builder::new()
            .prefix("voicelab-warmup-")
            .suffix(".wav")
            .tempfile()?;
        let step = 2.0 * std::f32::consts::PI * 150.0 / WARMUP_RATE as f32;
        let tone: Vec<f32> = (0..WARMUP_RATE).map(|i| 0.3 * (step * i as f32).sin()).collect();
        SignalBuffer::new(tone, WARMUP_RATE).write_wav(reference.path())?;

        let language = self.default_language.clone();
        backend
            .synthesize(WARMUP_TEXT, Some(reference.path()), &language)
            .map(|audio| log::debug!("XTTS-v2 warm-up produced {:.2}s", audio.duration_secs()))
            .map_err(|e| VoiceLabError::InitializationFailed(format!("XTTS-v2 warm-up failed: {e}")))
    }
}

impl BackendLoader for XttsLoader {
    fn kind(&self) -> BackendKind {
        BackendKind::Xtts
    }

    fn load(&self) -> Result<Box<dyn SynthesisBackend>> {
        match &self.source {
            ModelSource::Directory(dir) => {
                log::info!("Loading XTTS-v2 model from {}", dir.display());
                Self::check_weights(dir)?;
            }
            ModelSource::Named(name) => log::info!("Loading XTTS-v2 model '{name}'"),
        }
        self.check_command()?;

        let mut backend = XttsBackend {
            command: self.command.clone(),
            source: self.source.clone(),
            default_language: self.default_language.clone(),
        };
        self.warm_up(&mut backend)?;
        Ok(Box::new(backend))
    }
}

/// XTTS-v2 synthesis backend.
pub struct XttsBackend {
    command: String,
    source: ModelSource,
    default_language: String,
}

impl XttsBackend {
    /// The language to request: `language` if XTTS-v2 supports it, else the default.
    pub fn resolve_language<'a>(&'a self, language: &'a str) -> &'a str {
        if XTTS_LANGUAGES.contains(&language) {
            language
        } else {
            &self.default_language
        }
    }

    fn command(&self, text: &str, speaker_wav: &Path, language: &str, out_path: &Path) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.arg("--text").arg(text);
        match &self.source {
            ModelSource::Directory(dir) => {
                cmd.arg("--model_path")
                    .arg(dir)
                    .arg("--config_path")
                    .arg(dir.join("config.json"));
            }
            ModelSource::Named(name) => {
                cmd.arg("--model_name").arg(name);
            }
        }
        cmd.arg("--speaker_wav")
            .arg(speaker_wav)
            .arg("--language_idx")
            .arg(language)
            .arg("--out_path")
            .arg(out_path)
            .stdin(Stdio::null())
            .env("COQUI_TOS_AGREED", "1");
        cmd
    }
}

impl SynthesisBackend for XttsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Xtts
    }

    fn synthesize(
        &mut self,
        text: &str,
        reference_audio: Option<&Path>,
        language: &str,
    ) -> Result<SignalBuffer> {
        let speaker_wav = reference_audio.ok_or_else(|| {
            VoiceLabError::BackendSynthesisFailed(
                "XTTS-v2 requires a reference recording to clone".to_string(),
            )
        })?;
        let lang = self.resolve_language(language);
        log::info!("XTTS-v2 generate: lang={lang}");

        let out_file = tempfile::Builder::new()
            .prefix("voicelab-xtts-")
            .suffix(".wav")
            .tempfile()?;
        let output = self
            .command(text, speaker_wav, lang, out_file.path())
            .output()
            .map_err(|e| VoiceLabError::BackendSynthesisFailed(format!("{}: {e}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceLabError::BackendSynthesisFailed(format!(
                "{} exited with code {:?}: {stderr}",
                self.command,
                output.status.code()
            )));
        }

        let audio = SignalBuffer::read_wav(out_file.path())?;
        if audio.is_empty() {
            return Err(VoiceLabError::BackendSynthesisFailed(format!(
                "XTTS-v2 produced no audio for {text:?}"
            )));
        }
        Ok(audio)
    }
}
