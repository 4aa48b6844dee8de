//! espeak-ng fallback backend.
//!
//! Offline formant synthesis with no voice cloning: the reference recording
//! is ignored. Raw output is resampled to 44100 Hz and peak-normalized to
//! [`FALLBACK_PEAK`](crate::effects::FALLBACK_PEAK).
//!
//! # System Requirements
//!
//! **espeak-ng** must be installed on your system:
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: Download installer from <https://espeak-ng.org/download>

use std::path::Path;
use std::process::{Command, Stdio};

use super::{BackendKind, BackendLoader};
use crate::effects::normalize_fallback_output;
use crate::error::{Result, VoiceLabError};
use crate::{SignalBuffer, SynthesisBackend};

const DEFAULT_VOICE: &str = "pt-br";

/// Map a request language code to an espeak-ng voice.
pub fn espeak_voice(language: &str) -> &'static str {
    match language {
        "pt" => "pt-br",
        "en" => "en-us",
        "es" => "es",
        "fr" => "fr",
        "de" => "de",
        "it" => "it",
        "pl" => "pl",
        "tr" => "tr",
        "ru" => "ru",
        "nl" => "nl",
        "cs" => "cs",
        "ar" => "ar",
        "zh-cn" => "cmn",
        "ja" => "ja",
        "hu" => "hu",
        "ko" => "ko",
        _ => DEFAULT_VOICE,
    }
}

fn spawn_error(command: &str, e: std::io::Error) -> VoiceLabError {
    if e.kind() == std::io::ErrorKind::NotFound {
        VoiceLabError::ToolNotFound(command.to_string())
    } else {
        VoiceLabError::Io(e)
    }
}

/// Probes for the espeak-ng executable.
#[derive(Debug, Clone)]
pub struct EspeakLoader {
    command: String,
}

impl EspeakLoader {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// True when the executable can be spawned.
    pub fn is_available(&self) -> bool {
        self.probe().is_ok()
    }

    fn probe(&self) -> Result<()> {
        let output = Command::new(&self.command)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(&self.command, e))?;
        if !output.status.success() {
            return Err(VoiceLabError::ToolNotFound(format!(
                "{} (--version exited with {:?})",
                self.command,
                output.status.code()
            )));
        }
        Ok(())
    }
}

impl Default for EspeakLoader {
    fn default() -> Self {
        Self::new("espeak-ng")
    }
}

impl BackendLoader for EspeakLoader {
    fn kind(&self) -> BackendKind {
        BackendKind::Espeak
    }

    fn load(&self) -> Result<Box<dyn SynthesisBackend>> {
        self.probe()?;
        Ok(Box::new(EspeakBackend {
            command: self.command.clone(),
        }))
    }
}

/// espeak-ng synthesis backend.
pub struct EspeakBackend {
    command: String,
}

impl EspeakBackend {
    fn run(&self, text: &str, voice: &str, wav_path: &Path) -> Result<()> {
        let output = Command::new(&self.command)
            .arg("-v")
            .arg(voice)
            .arg("-w")
            .arg(wav_path)
            .arg("--")
            .arg(text)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(&self.command, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceLabError::BackendSynthesisFailed(format!(
                "espeak-ng exited with code {:?}: {stderr}",
                output.status.code()
            )));
        }
        Ok(())
    }
}

impl SynthesisBackend for EspeakBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Espeak
    }

    fn synthesize(
        &mut self,
        text: &str,
        _reference_audio: Option<&Path>,
        language: &str,
    ) -> Result<SignalBuffer> {
        let voice = espeak_voice(language);
        log::info!("espeak-ng generate: voice={voice}");

        let raw_file = tempfile::Builder::new()
            .prefix("voicelab-espeak-")
            .suffix(".wav")
            .tempfile()?;
        self.run(text, voice, raw_file.path())?;

        let raw = SignalBuffer::read_wav(raw_file.path())?;
        if raw.is_empty() {
            return Err(VoiceLabError::BackendSynthesisFailed(format!(
                "espeak-ng produced no audio for {text:?}"
            )));
        }
        log::debug!("espeak-ng produced {} samples at {} Hz", raw.len(), raw.sample_rate);
        normalize_fallback_output(&raw)
    }
}
