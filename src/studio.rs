//! Request-level flows on top of the engine: generate speech for a stored
//! voice, and import a new reference recording.
//!
//! A failed mood pass is not fatal here: the unprocessed synthesis is
//! written instead and the result records that no mood was applied.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analysis::{detect_gender, Gender};
use crate::effects::{apply_mood, normalize_for_storage};
use crate::engines::controller::{BackendState, EngineController};
use crate::engines::BackendKind;
use crate::error::{Result, VoiceLabError};
use crate::voices::VoiceStore;
use crate::SignalBuffer;

/// A speech generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub text: String,
    pub voice_id: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_mood")]
    pub mood: String,
    #[serde(default = "default_intensity")]
    pub intensity: i32,
}

fn default_language() -> String {
    "pt".to_string()
}

fn default_mood() -> String {
    "normal".to_string()
}

fn default_intensity() -> i32 {
    3
}

/// Where a generated utterance was written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedAudio {
    pub path: PathBuf,
    pub backend: BackendKind,
    /// False when the mood pass failed and the raw synthesis was written.
    pub mood_applied: bool,
    pub duration_secs: f64,
}

/// A reference recording prepared for storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedReference {
    pub path: PathBuf,
    pub gender: Gender,
    pub duration_secs: f64,
}

pub struct Studio {
    engine: EngineController,
    voices: Box<dyn VoiceStore>,
    output_dir: PathBuf,
}

impl Studio {
    pub fn new(
        engine: EngineController,
        voices: Box<dyn VoiceStore>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            engine,
            voices,
            output_dir,
        })
    }

    pub fn engine(&self) -> &EngineController {
        &self.engine
    }

    /// Synthesize `request` with its voice, apply the mood and write a WAV.
    ///
    /// Fails fast while the engine is still loading instead of blocking the
    /// caller.
    pub fn generate(&self, request: &GenerateRequest) -> Result<GeneratedAudio> {
        let backend = match self.engine.state() {
            BackendState::Ready(kind) => kind,
            BackendState::Error { message, .. } => {
                return Err(VoiceLabError::InitializationFailed(message))
            }
            _ => return Err(VoiceLabError::EngineNotReady),
        };

        if self.voices.get(&request.voice_id)?.is_none() {
            return Err(VoiceLabError::VoiceNotFound(request.voice_id.clone()));
        }
        let reference = self
            .voices
            .reference_audio_path(&request.voice_id)?
            .ok_or_else(|| {
                VoiceLabError::VoiceNotFound(format!(
                    "{} (reference audio missing)",
                    request.voice_id
                ))
            })?;

        let raw = self
            .engine
            .synthesize(&request.text, Some(&reference), &request.language)
            .inspect_err(|e| log::error!("TTS generation error: {e}"))?;

        let (audio, mood_applied) = match apply_mood(&raw, &request.mood, request.intensity) {
            Ok(processed) => (processed, true),
            Err(e) => {
                log::error!("Mood processing error: {e}. Writing unprocessed audio.");
                (raw, false)
            }
        };

        let path = self.unique_output_path()?;
        audio.write_wav(&path)?;
        log::info!("Generated {}", path.display());

        Ok(GeneratedAudio {
            path,
            backend,
            mood_applied,
            duration_secs: audio.duration_secs(),
        })
    }

    fn unique_output_path(&self) -> Result<PathBuf> {
        let (_file, path) = tempfile::Builder::new()
            .prefix("voice-")
            .suffix(".wav")
            .tempfile_in(&self.output_dir)?
            .keep()
            .map_err(|e| VoiceLabError::Io(e.error))?;
        Ok(path)
    }

    /// Normalize an uploaded recording for cloning and write it to `output`.
    ///
    /// Gender detection is skipped when `classify` is false.
    pub fn import_reference(
        &self,
        input: &Path,
        output: &Path,
        classify: bool,
    ) -> Result<ImportedReference> {
        let recording = SignalBuffer::read(input)?;
        if recording.is_empty() {
            return Err(VoiceLabError::UnsupportedFormat(format!(
                "{}: no audio samples",
                input.display()
            )));
        }
        let normalized = normalize_for_storage(&recording)?;
        normalized.write_wav(output)?;

        let gender = if classify {
            detect_gender(&normalized)
        } else {
            Gender::Unknown
        };
        log::info!(
            "Imported reference {} ({:.1}s, {})",
            output.display(),
            normalized.duration_secs(),
            gender.as_str()
        );

        Ok(ImportedReference {
            path: output.to_path_buf(),
            gender,
            duration_secs: normalized.duration_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::REFERENCE_PEAK;
    use crate::engines::BackendLoader;
    use crate::voices::{JsonVoiceStore, VoiceProfile};
    use crate::{SynthesisBackend, TARGET_SAMPLE_RATE};
    use std::f32::consts::PI;
    use std::time::Duration;

    fn tone(freq: f32, amplitude: f32, sample_rate: u32, len: usize) -> SignalBuffer {
        let samples = (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        SignalBuffer::new(samples, sample_rate)
    }

    /// Returns a short tone, or an empty buffer for text "silence".
    struct ToneBackend;

    impl SynthesisBackend for ToneBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Xtts
        }

        fn synthesize(
            &mut self,
            text: &str,
            reference_audio: Option<&Path>,
            _language: &str,
        ) -> Result<SignalBuffer> {
            assert!(reference_audio.is_some());
            if text == "silence" {
                return Ok(SignalBuffer::new(vec![], 24000));
            }
            Ok(tone(200.0, 0.5, 24000, 12000))
        }
    }

    struct ToneLoader;

    impl BackendLoader for ToneLoader {
        fn kind(&self) -> BackendKind {
            BackendKind::Xtts
        }

        fn load(&self) -> Result<Box<dyn SynthesisBackend>> {
            Ok(Box::new(ToneBackend))
        }
    }

    struct Unavailable;

    impl BackendLoader for Unavailable {
        fn kind(&self) -> BackendKind {
            BackendKind::Espeak
        }

        fn load(&self) -> Result<Box<dyn SynthesisBackend>> {
            Err(VoiceLabError::ToolNotFound("espeak-ng".to_string()))
        }
    }

    struct MemoryStore {
        voice: VoiceProfile,
        reference: PathBuf,
    }

    impl VoiceStore for MemoryStore {
        fn get(&self, voice_id: &str) -> Result<Option<VoiceProfile>> {
            Ok((voice_id == self.voice.id).then(|| self.voice.clone()))
        }

        fn reference_audio_path(&self, voice_id: &str) -> Result<Option<PathBuf>> {
            Ok((voice_id == self.voice.id).then(|| self.reference.clone()))
        }
    }

    fn studio(dir: &Path) -> Studio {
        let reference = dir.join("ref.wav");
        tone(150.0, 0.5, 44100, 4410).write_wav(&reference).unwrap();
        let store = MemoryStore {
            voice: VoiceProfile {
                id: "v1".to_string(),
                name: "Ana".to_string(),
                gender: Gender::Female,
                language: "pt".to_string(),
                description: String::new(),
                reference_file: PathBuf::from("ref.wav"),
                created_at: String::new(),
            },
            reference,
        };
        let engine = EngineController::with_loaders(
            Box::new(ToneLoader),
            Box::new(Unavailable),
            Duration::from_secs(5),
        );
        Studio::new(engine, Box::new(store), dir.join("generated")).unwrap()
    }

    fn request(text: &str, voice_id: &str) -> GenerateRequest {
        serde_json::from_value(serde_json::json!({
            "text": text,
            "voice_id": voice_id,
            "mood": "upbeat",
        }))
        .unwrap()
    }

    #[test]
    fn request_defaults() {
        let req = request("Olá", "v1");
        assert_eq!(req.language, "pt");
        assert_eq!(req.intensity, 3);
    }

    #[test]
    fn not_ready_engine_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let studio = studio(dir.path());
        let err = studio.generate(&request("Olá", "v1")).unwrap_err();
        assert!(matches!(err, VoiceLabError::EngineNotReady));
    }

    #[test]
    fn generates_processed_wav() {
        let dir = tempfile::tempdir().unwrap();
        let studio = studio(dir.path());
        studio.engine().ensure_ready().unwrap();

        let out = studio.generate(&request("Olá", "v1")).unwrap();
        assert!(out.mood_applied);
        assert_eq!(out.backend, BackendKind::Xtts);
        assert!(out.path.starts_with(dir.path().join("generated")));

        let spec = hound::WavReader::open(&out.path).unwrap().spec();
        assert_eq!(spec.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(spec.bits_per_sample, 16);
    }

    #[test]
    fn failed_mood_pass_writes_raw_audio() {
        let dir = tempfile::tempdir().unwrap();
        let studio = studio(dir.path());
        studio.engine().ensure_ready().unwrap();

        let out = studio.generate(&request("silence", "v1")).unwrap();
        assert!(!out.mood_applied);
        assert_eq!(out.duration_secs, 0.0);
        assert!(out.path.exists());
    }

    #[test]
    fn unknown_voice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let studio = studio(dir.path());
        studio.engine().ensure_ready().unwrap();
        let err = studio.generate(&request("Olá", "nope")).unwrap_err();
        assert!(matches!(err, VoiceLabError::VoiceNotFound(_)));
    }

    #[test]
    fn imports_reference_at_storage_level() {
        let dir = tempfile::tempdir().unwrap();
        let studio = studio(dir.path());
        let input = dir.path().join("upload.wav");
        tone(110.0, 0.2, 22050, 11025).write_wav(&input).unwrap();

        let output = dir.path().join("stored.wav");
        let imported = studio.import_reference(&input, &output, true).unwrap();
        assert_eq!(imported.gender, Gender::Male);

        let stored = SignalBuffer::read_wav(&output).unwrap();
        assert_eq!(stored.sample_rate, TARGET_SAMPLE_RATE);
        assert!((stored.peak() - REFERENCE_PEAK).abs() < 1e-3);
    }

    #[test]
    fn import_rejects_unknown_upload_format() {
        let dir = tempfile::tempdir().unwrap();
        let studio = studio(dir.path());
        let err = studio
            .import_reference(Path::new("upload.aiff"), &dir.path().join("out.wav"), false)
            .unwrap_err();
        assert!(matches!(err, VoiceLabError::UnsupportedFormat(_)));
    }

    #[test]
    fn works_with_json_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data/references")).unwrap();
        tone(150.0, 0.5, 44100, 4410)
            .write_wav(&dir.path().join("data/references/v9.wav"))
            .unwrap();
        std::fs::write(
            dir.path().join(JsonVoiceStore::INDEX_FILE),
            r#"{ "voices": [ { "id": "v9", "name": "Rui", "reference_file": "data/references/v9.wav" } ] }"#,
        )
        .unwrap();

        let engine = EngineController::with_loaders(
            Box::new(ToneLoader),
            Box::new(Unavailable),
            Duration::from_secs(5),
        );
        engine.ensure_ready().unwrap();
        let studio = Studio::new(
            engine,
            Box::new(JsonVoiceStore::new(dir.path())),
            dir.path().join("out"),
        )
        .unwrap();
        assert!(studio.generate(&request("Oi", "v9")).unwrap().mood_applied);
    }
}
