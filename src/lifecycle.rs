//! Detector readiness state machine and the background model loader.
//!
//! One mutex guards the (state, message) pair so readers never observe a
//! stale message next to a fresh state. Writers are the load worker and the
//! enable/disable toggles; readers are the frame loop and the GUI seam.

use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use log::{error, info};

use crate::detect::neural::NeuralDetector;

/// Detector readiness states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DetectorState {
    /// No load attempted, or the model was unloaded.
    #[default]
    Off,
    /// A load is in progress.
    Loading,
    /// Model loaded; detection available but not running.
    Ready,
    /// Detection running.
    Active,
    /// Load or unrecoverable failure; sticky until a fresh load.
    Error,
}

impl DetectorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorState::Off => "off",
            DetectorState::Loading => "loading",
            DetectorState::Ready => "ready",
            DetectorState::Active => "active",
            DetectorState::Error => "error",
        }
    }
}

impl fmt::Display for DetectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct LifecycleInner {
    state: DetectorState,
    message: Option<String>,
}

/// Thread-safe lifecycle cell shared by the active detector, the load
/// worker, and the frame loop.
#[derive(Debug, Default)]
pub struct DetectorLifecycle {
    inner: Mutex<LifecycleInner>,
}

impl DetectorLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LifecycleInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, state: DetectorState, message: Option<String>) {
        let mut inner = self.lock();
        if inner.state != state {
            info!("detector state changed: {} -> {}", inner.state, state);
        }
        inner.state = state;
        inner.message = message;
    }

    /// Read state and error message as one atomic pair.
    pub fn snapshot(&self) -> (DetectorState, Option<String>) {
        let inner = self.lock();
        (inner.state, inner.message.clone())
    }

    pub fn state(&self) -> DetectorState {
        self.lock().state
    }

    /// Enter Loading from any state; a fresh load attempt clears a previous
    /// error.
    pub fn begin_loading(&self) {
        self.transition(DetectorState::Loading, None);
    }

    pub fn mark_ready(&self) {
        self.transition(DetectorState::Ready, None);
    }

    pub fn mark_error(&self, message: impl Into<String>) {
        let message = message.into();
        error!("detector error: {}", message);
        self.transition(DetectorState::Error, Some(message));
    }

    pub fn set_off(&self) {
        self.transition(DetectorState::Off, None);
    }

    /// Ready -> Active. Idempotent when already Active; any other state is
    /// an invalid transition.
    pub fn enable(&self) -> Result<()> {
        let mut inner = self.lock();
        match inner.state {
            DetectorState::Ready => {
                info!("detector state changed: ready -> active");
                inner.state = DetectorState::Active;
                Ok(())
            }
            DetectorState::Active => Ok(()),
            other => Err(anyhow!("cannot enable detection from state '{}'", other)),
        }
    }

    /// Active -> Ready. No-op in any other state.
    pub fn disable(&self) {
        let mut inner = self.lock();
        if inner.state == DetectorState::Active {
            info!("detector state changed: active -> ready");
            inner.state = DetectorState::Ready;
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state() == DetectorState::Loading
    }

    pub fn is_ready(&self) -> bool {
        self.state() == DetectorState::Ready
    }

    pub fn is_active(&self) -> bool {
        self.state() == DetectorState::Active
    }

    pub fn is_error(&self) -> bool {
        self.state() == DetectorState::Error
    }
}

/// Outcome of a background load, delivered once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Ready,
    Failed(String),
}

/// Background worker that loads model weights off the per-frame path.
///
/// The worker owns no lock during the load itself beyond the engine mutex;
/// the lifecycle transitions happen inside `NeuralDetector::load`, so the
/// one-shot outcome is observable only after the state has settled.
pub struct ModelLoader {
    handle: JoinHandle<()>,
    rx: Receiver<LoadOutcome>,
}

impl ModelLoader {
    pub fn spawn(engine: Arc<Mutex<NeuralDetector>>, model_path: PathBuf) -> Result<Self> {
        let (tx, rx) = mpsc::sync_channel(1);
        let handle = thread::Builder::new()
            .name("model-loader".to_string())
            .spawn(move || {
                info!("starting model load in background: {}", model_path.display());
                let started = Instant::now();
                let lifecycle = {
                    let guard = engine.lock().unwrap_or_else(PoisonError::into_inner);
                    guard.lifecycle()
                };
                let loaded = {
                    let mut guard = engine.lock().unwrap_or_else(PoisonError::into_inner);
                    guard.load(&model_path)
                };
                let outcome = if loaded {
                    info!(
                        "model loaded in {:.2}s",
                        started.elapsed().as_secs_f64()
                    );
                    LoadOutcome::Ready
                } else {
                    let (_, message) = lifecycle.snapshot();
                    LoadOutcome::Failed(
                        message.unwrap_or_else(|| "unknown error loading model".to_string()),
                    )
                };
                let _ = tx.send(outcome);
            })
            .context("failed to spawn model loader thread")?;
        Ok(Self { handle, rx })
    }

    /// Non-blocking poll for the load outcome.
    pub fn try_outcome(&self) -> Option<LoadOutcome> {
        self.rx.try_recv().ok()
    }

    /// Block until the load finishes and return its outcome.
    pub fn wait(self) -> LoadOutcome {
        let outcome = self
            .rx
            .recv()
            .unwrap_or_else(|_| LoadOutcome::Failed("model loader exited without reporting".to_string()));
        let _ = self.handle.join();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_off_with_no_message() {
        let lifecycle = DetectorLifecycle::new();
        assert_eq!(lifecycle.snapshot(), (DetectorState::Off, None));
    }

    #[test]
    fn load_failure_is_sticky_until_fresh_load() {
        let lifecycle = DetectorLifecycle::new();
        lifecycle.begin_loading();
        lifecycle.mark_error("model file not found");

        let (state, message) = lifecycle.snapshot();
        assert_eq!(state, DetectorState::Error);
        assert_eq!(message.as_deref(), Some("model file not found"));
        assert!(lifecycle.enable().is_err());

        lifecycle.begin_loading();
        assert_eq!(lifecycle.snapshot(), (DetectorState::Loading, None));
    }

    #[test]
    fn toggling_is_idempotent() {
        let lifecycle = DetectorLifecycle::new();
        lifecycle.begin_loading();
        lifecycle.mark_ready();

        for _ in 0..2 {
            lifecycle.enable().unwrap();
            assert!(lifecycle.is_active());
            lifecycle.disable();
            assert!(lifecycle.is_ready());
            lifecycle.enable().unwrap();
        }
        assert_eq!(lifecycle.snapshot(), (DetectorState::Active, None));
    }

    #[test]
    fn enable_requires_ready() {
        let lifecycle = DetectorLifecycle::new();
        assert!(lifecycle.enable().is_err());
        lifecycle.begin_loading();
        assert!(lifecycle.enable().is_err());
    }

    #[test]
    fn disable_outside_active_is_a_noop() {
        let lifecycle = DetectorLifecycle::new();
        lifecycle.disable();
        assert_eq!(lifecycle.state(), DetectorState::Off);
    }
}
