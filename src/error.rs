/// Errors produced by the engine, the synthesis backends and the effect chain.
#[derive(thiserror::Error, Debug)]
pub enum VoiceLabError {
    /// The backend is still loading. Transient, the caller may retry later.
    #[error("TTS engine not ready")]
    EngineNotReady,
    /// No backend ever became available. Permanent for the process lifetime.
    #[error("TTS engine failed to initialize: {0}")]
    InitializationFailed(String),
    #[error("Synthesis failed: {0}")]
    BackendSynthesisFailed(String),
    #[error("Effect stage '{stage}' failed: {reason}")]
    EffectStageFailed { stage: &'static str, reason: String },
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("Voice '{0}' not found")]
    VoiceNotFound(String),
    #[error("'{0}' not found on PATH")]
    ToolNotFound(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VoiceLabError {
    pub(crate) fn stage(stage: &'static str, reason: impl Into<String>) -> Self {
        VoiceLabError::EffectStageFailed {
            stage,
            reason: reason.into(),
        }
    }

    /// True for failures the caller can retry once the engine finishes loading.
    pub fn is_transient(&self) -> bool {
        matches!(self, VoiceLabError::EngineNotReady)
    }
}

pub type Result<T> = std::result::Result<T, VoiceLabError>;
