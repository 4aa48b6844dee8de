//! Backend lifecycle: load once in the background, fall back once, serve forever.
//!
//! ```text
//! Idle -> Loading -> Ready(xtts)
//!                 -> Ready(espeak)   primary failed, fallback present
//!                 -> Error           nothing usable
//! ```
//!
//! `Ready` and `Error` are terminal. A failed primary load is never retried
//! within the same controller.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::espeak::EspeakLoader;
use super::xtts::XttsLoader;
use super::{BackendKind, BackendLoader};
use crate::config::EngineConfig;
use crate::error::{Result, VoiceLabError};
use crate::{SignalBuffer, SynthesisBackend};

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendState {
    Idle,
    Loading,
    Ready(BackendKind),
    Error {
        message: String,
        fallback_available: bool,
    },
}

impl BackendState {
    pub fn label(&self) -> &'static str {
        match self {
            BackendState::Idle => "idle",
            BackendState::Loading => "loading",
            BackendState::Ready(_) => "ready",
            BackendState::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BackendState::Ready(_) | BackendState::Error { .. })
    }
}

/// Health snapshot for status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub state: &'static str,
    pub ready: bool,
    pub backend: Option<BackendKind>,
    pub error: Option<String>,
}

struct Lifecycle {
    state: BackendState,
    /// Why the primary backend was not used, kept after falling back.
    last_error: Option<String>,
}

struct Shared {
    lifecycle: Mutex<Lifecycle>,
    settled: Condvar,
    /// Separate from `lifecycle` so status reads never wait on a synthesis.
    backend: Mutex<Option<Box<dyn SynthesisBackend>>>,
    primary: Box<dyn BackendLoader>,
    fallback: Box<dyn BackendLoader>,
    ready_timeout: Duration,
    loader: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Run a loader, reporting a panic as an ordinary load failure.
fn load_guarded(
    loader: &dyn BackendLoader,
) -> std::result::Result<Box<dyn SynthesisBackend>, String> {
    match panic::catch_unwind(AssertUnwindSafe(|| loader.load())) {
        Ok(Ok(backend)) => Ok(backend),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!(
            "{} loader panicked: {}",
            loader.kind(),
            panic_message(payload.as_ref())
        )),
    }
}

impl Shared {
    /// `Idle -> Loading`. Only the caller that gets `true` runs the load.
    fn claim(&self) -> bool {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.state != BackendState::Idle {
            return false;
        }
        lifecycle.state = BackendState::Loading;
        true
    }

    /// `Loading -> Idle` when an attempt never ran. Waiters wake and retry inline.
    fn release(&self) {
        lock(&self.lifecycle).state = BackendState::Idle;
        self.settled.notify_all();
    }

    fn settle(&self, state: BackendState, last_error: Option<String>) {
        let mut lifecycle = lock(&self.lifecycle);
        lifecycle.state = state;
        lifecycle.last_error = last_error;
        drop(lifecycle);
        self.settled.notify_all();
    }

    fn install(&self, backend: Box<dyn SynthesisBackend>) -> BackendKind {
        let kind = backend.kind();
        *lock(&self.backend) = Some(backend);
        kind
    }

    /// The single load attempt. Must only run after a successful `claim`.
    fn run_load(&self) {
        log::info!("Loading {} backend…", self.primary.kind());
        let primary_error = match load_guarded(self.primary.as_ref()) {
            Ok(backend) => {
                let kind = self.install(backend);
                log::info!("{kind} backend loaded");
                self.settle(BackendState::Ready(kind), None);
                return;
            }
            Err(e) => e,
        };

        log::warn!(
            "{} unavailable: {primary_error}. Falling back to {}.",
            self.primary.kind(),
            self.fallback.kind()
        );
        match load_guarded(self.fallback.as_ref()) {
            Ok(backend) => {
                let kind = self.install(backend);
                log::info!("Using {kind} fallback");
                self.settle(BackendState::Ready(kind), Some(primary_error));
            }
            Err(fallback_error) => {
                log::error!("No TTS backend available: {primary_error} ({fallback_error})");
                self.settle(
                    BackendState::Error {
                        message: primary_error.clone(),
                        fallback_available: false,
                    },
                    Some(primary_error),
                );
            }
        }
    }
}

/// Owns backend selection and serves synthesis requests.
///
/// Cloning the controller yields another handle to the same engine, so one
/// instance can be shared across request handlers.
///
/// ```rust,no_run
/// use voicelab::{EngineConfig, EngineController};
///
/// let engine = EngineController::new(EngineConfig::default());
/// engine.initialize();
/// println!("{:?}", engine.status());
/// ```
#[derive(Clone)]
pub struct EngineController {
    shared: Arc<Shared>,
}

impl EngineController {
    /// XTTS-v2 as primary, espeak-ng as fallback.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_loaders(
            Box::new(XttsLoader::from_config(&config)),
            Box::new(EspeakLoader::new(config.espeak_command.clone())),
            config.ready_timeout,
        )
    }

    pub fn with_loaders(
        primary: Box<dyn BackendLoader>,
        fallback: Box<dyn BackendLoader>,
        ready_timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                lifecycle: Mutex::new(Lifecycle {
                    state: BackendState::Idle,
                    last_error: None,
                }),
                settled: Condvar::new(),
                backend: Mutex::new(None),
                primary,
                fallback,
                ready_timeout,
                loader: Mutex::new(None),
            }),
        }
    }

    /// Start loading in the background and return immediately.
    ///
    /// No-op once loading has started or finished.
    pub fn initialize(&self) {
        if !self.shared.claim() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let spawned = std::thread::Builder::new()
            .name("voicelab-loader".to_string())
            .spawn(move || shared.run_load());
        match spawned {
            Ok(handle) => *lock(&self.shared.loader) = Some(handle),
            Err(e) => {
                // The attempt never started; let the next request load inline.
                log::error!("Failed to spawn loader thread: {e}");
                self.shared.release();
            }
        }
    }

    /// Wait for a terminal state and return the selected backend.
    ///
    /// Loads inline when nothing has started the load yet. Waits at most
    /// the configured ready timeout for a load in progress.
    pub fn ensure_ready(&self) -> Result<BackendKind> {
        let deadline = Instant::now() + self.shared.ready_timeout;
        loop {
            if self.shared.claim() {
                self.shared.run_load();
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let lifecycle = lock(&self.shared.lifecycle);
            let (lifecycle, _) = self
                .shared
                .settled
                .wait_timeout_while(lifecycle, remaining, |l| l.state == BackendState::Loading)
                .unwrap_or_else(PoisonError::into_inner);

            match &lifecycle.state {
                BackendState::Ready(kind) => return Ok(*kind),
                BackendState::Error { message, .. } => {
                    return Err(VoiceLabError::InitializationFailed(message.clone()))
                }
                // A background attempt was abandoned before it ran.
                BackendState::Idle if Instant::now() < deadline => continue,
                state => {
                    log::warn!(
                        "Engine still {} after {:?}",
                        state.label(),
                        self.shared.ready_timeout
                    );
                    return Err(VoiceLabError::EngineNotReady);
                }
            }
        }
    }

    /// Synthesize `text` with whichever backend was selected.
    ///
    /// Requests are serialized on the backend; status reads proceed meanwhile.
    pub fn synthesize(
        &self,
        text: &str,
        reference_audio: Option<&Path>,
        language: &str,
    ) -> Result<SignalBuffer> {
        let kind = self.ensure_ready()?;
        let mut slot = lock(&self.shared.backend);
        let backend = slot.as_mut().ok_or(VoiceLabError::EngineNotReady)?;

        log::info!("Synthesizing {} chars with {kind} (lang={language})", text.chars().count());
        backend
            .synthesize(text, reference_audio, language)
            .map_err(|e| match e {
                VoiceLabError::BackendSynthesisFailed(_) => e,
                other => VoiceLabError::BackendSynthesisFailed(other.to_string()),
            })
    }

    /// Snapshot of the current lifecycle state.
    pub fn state(&self) -> BackendState {
        lock(&self.shared.lifecycle).state.clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state(), BackendState::Ready(_))
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared.lifecycle).last_error.clone()
    }

    pub fn selected_backend(&self) -> Option<BackendKind> {
        match self.state() {
            BackendState::Ready(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn status(&self) -> EngineStatus {
        let lifecycle = lock(&self.shared.lifecycle);
        let backend = match lifecycle.state {
            BackendState::Ready(kind) => Some(kind),
            _ => None,
        };
        EngineStatus {
            state: lifecycle.state.label(),
            ready: backend.is_some(),
            backend,
            error: lifecycle.last_error.clone(),
        }
    }

    /// Wait for the background loader thread, if one was started, to finish.
    pub fn shutdown(&self) {
        let handle = lock(&self.shared.loader).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Loader thread panicked");
            }
        }
    }
}
