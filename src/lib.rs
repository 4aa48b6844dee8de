//! # voicelab
//!
//! Voice-cloning speech synthesis behind a managed engine, with an offline
//! fallback backend and a deterministic mood effect chain.
//!
//! ## Features
//!
//! - **Background model load**: [`EngineController::initialize`] returns
//!   immediately while the XTTS-v2 backend loads on a worker thread
//! - **Automatic fallback**: when the cloning model is unusable, espeak-ng is
//!   selected instead (no cloning, always offline)
//! - **Mood effects**: pitch shift, time-stretch, gain and soft-clip driven by
//!   a mood name and an intensity from 1 to 5
//! - **Fixed interchange format**: 16-bit PCM mono WAV at 44100 Hz
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use voicelab::{effects, EngineConfig, EngineController};
//!
//! let engine = EngineController::new(EngineConfig::default());
//! engine.initialize();
//!
//! let raw = engine.synthesize("Olá, mundo!", Some(Path::new("ref.wav")), "pt")?;
//! let out = effects::apply_mood(&raw, "upbeat", 3)?;
//! out.write_wav(Path::new("output.wav"))?;
//! # Ok::<(), voicelab::VoiceLabError>(())
//! ```

pub mod analysis;
pub mod audio;
pub mod config;
pub mod effects;
pub mod engines;
pub mod error;
pub mod studio;
pub mod voices;

use std::path::Path;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use engines::controller::{BackendState, EngineController, EngineStatus};
pub use engines::BackendKind;
pub use error::{Result, VoiceLabError};

/// Sample rate of every buffer leaving the effect chain.
pub const TARGET_SAMPLE_RATE: u32 = 44100;

/// Mono audio samples plus their sample rate.
///
/// The unit every synthesis backend produces and every effect stage
/// consumes. Sample values are only guaranteed to lie in `[-1, 1]` after a
/// normalization stage.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBuffer {
    /// Raw audio samples as f32 values
    pub samples: Vec<f32>,
    /// Sample rate of the audio in Hz
    pub sample_rate: u32,
}

impl SignalBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest absolute sample value, 0.0 for an empty buffer.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Decode a WAV file into a mono buffer.
    pub fn read_wav(path: &Path) -> Result<Self> {
        audio::read_wav(path)
    }

    /// Decode any supported audio file (WAV, MP3, M4A, OGG, FLAC) into a mono buffer.
    pub fn read(path: &Path) -> Result<Self> {
        audio::read_audio(path)
    }

    /// Write the audio as a 16-bit PCM mono WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        audio::write_wav(self, path)
    }
}

/// Common interface for the synthesis backends the engine orchestrates.
///
/// Backends are constructed once by a [`engines::BackendLoader`] and then
/// invoked one request at a time; `&mut self` lets an implementation keep
/// per-model state without its own locking.
pub trait SynthesisBackend: Send {
    /// Which backend this is, for status reporting.
    fn kind(&self) -> BackendKind;

    /// Synthesize speech from the given text.
    ///
    /// `reference_audio` is the recording to clone; backends without cloning
    /// support ignore it.
    fn synthesize(
        &mut self,
        text: &str,
        reference_audio: Option<&Path>,
        language: &str,
    ) -> Result<SignalBuffer>;

    /// Synthesize speech and write it to a WAV file.
    ///
    /// Default implementation calls `synthesize()` then `SignalBuffer::write_wav()`.
    fn synthesize_to_file(
        &mut self,
        text: &str,
        reference_audio: Option<&Path>,
        language: &str,
        wav_path: &Path,
    ) -> Result<()> {
        self.synthesize(text, reference_audio, language)?
            .write_wav(wav_path)
    }
}
