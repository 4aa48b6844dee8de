//! Speech synthesis backends and the engine that selects between them.
//!
//! # Available Backends
//!
//! - [`xtts`] - XTTS-v2 voice cloning through the Coqui `tts` command
//!   (primary, needs model weights)
//! - [`espeak`] - espeak-ng formant synthesis (fallback, no cloning)
//!
//! A backend is constructed by its [`BackendLoader`] exactly once; the
//! [`controller::EngineController`] decides which loader wins.

pub mod controller;
pub mod espeak;
pub mod xtts;

#[cfg(all(test, unix))]
pub(crate) mod test_support;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::SynthesisBackend;

/// Which backend the engine selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Cloning-capable model backend.
    Xtts,
    /// Offline, non-cloning backend.
    Espeak,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Xtts => "xtts",
            BackendKind::Espeak => "espeak",
        }
    }

    pub fn supports_cloning(&self) -> bool {
        matches!(self, BackendKind::Xtts)
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constructs a backend. May be slow (model load) and may fail for any reason
/// the backend cannot work in this environment.
pub trait BackendLoader: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn load(&self) -> Result<Box<dyn SynthesisBackend>>;
}
