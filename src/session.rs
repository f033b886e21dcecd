//! Monitoring session control: start/stop the capture worker, expose the level.
//!
//! The worker thread owns the device for the whole session and hands it back
//! on join, so the device is always released after the worker has exited.
//! Start and stop serialize on the session slot; `get_current_level` never
//! takes a lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audio::detector::AdaptiveDetector;
use crate::audio::device::{AudioBackend, AudioDevice};
use crate::audio::level::LevelEstimator;
use crate::audio::{run_capture_loop, BlockProcessor};
use crate::cancellation::StopHandle;
use crate::config::MicConfig;
use crate::error::MicError;
use crate::level_cell::LevelCell;
use crate::metrics::{metric_names, MetricSummary, MetricsRegistry};
use crate::state_machine::{SessionState, StateMachine};

struct ActiveSession {
    id: Uuid,
    stop: StopHandle,
    worker: JoinHandle<Box<dyn AudioDevice>>,
}

pub struct MicService {
    backend: Box<dyn AudioBackend>,
    config: MicConfig,
    state: StateMachine,
    level: Arc<LevelCell>,
    metrics: Arc<MetricsRegistry>,
    active: Mutex<Option<ActiveSession>>,
}

impl MicService {
    pub fn new(backend: impl AudioBackend + 'static, config: MicConfig) -> Result<Self, MicError> {
        config
            .validate()
            .map_err(|e| MicError::InvalidInput(e.to_string()))?;
        Ok(Self {
            backend: Box::new(backend),
            config,
            state: StateMachine::new(),
            level: Arc::new(LevelCell::new()),
            metrics: Arc::new(MetricsRegistry::new()),
            active: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &MicConfig {
        &self.config
    }

    /// Acquire the device and start the capture worker.
    ///
    /// Succeeds without side effects if a session is already running. On
    /// failure nothing is left behind: no open device, no worker.
    pub fn start_session(&self) -> Result<(), MicError> {
        let span = self.metrics.span(metric_names::SESSION_START);
        let mut slot = self.active.lock();
        if let Some(session) = slot.as_ref() {
            debug!(session = %session.id, "monitoring already active");
            return Ok(());
        }

        if let Err(e) = self.backend.check_permission() {
            warn!(error = %e, "monitoring start refused");
            return Err(e);
        }

        self.enter(SessionState::Starting);

        let device = match self.backend.open(&self.config.audio) {
            Ok(device) => device,
            Err(e) => {
                warn!(error = %e, "audio device init failed");
                self.state.force_idle();
                return Err(e);
            }
        };

        let processor = BlockProcessor::new(
            LevelEstimator::new(&self.config.level),
            AdaptiveDetector::new(self.config.detector.clone()),
            Arc::clone(&self.level),
            Arc::clone(&self.metrics),
        );

        let id = Uuid::new_v4();
        let stop = StopHandle::new();
        let signal = stop.signal();
        let audio_config = self.config.audio.clone();

        // If the spawn fails the closure, and the device in it, is dropped here.
        let worker = std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || run_capture_loop(device, processor, &audio_config, signal, id))
            .map_err(|e| {
                self.state.force_idle();
                MicError::DeviceInitFailed(format!("failed to spawn capture thread: {e}"))
            })?;

        *slot = Some(ActiveSession { id, stop, worker });
        self.enter(SessionState::Active);
        drop(slot);

        let elapsed_us = span.finish();
        info!(session = %id, elapsed_us, "monitoring started");
        Ok(())
    }

    /// Stop the worker and release the device.
    ///
    /// A no-op success when nothing is running. Whatever the outcome, the
    /// session is inactive afterwards.
    pub fn stop_session(&self) -> Result<(), MicError> {
        let span = self.metrics.span(metric_names::SESSION_STOP);
        let mut slot = self.active.lock();
        let Some(session) = slot.take() else {
            return Ok(());
        };

        self.enter(SessionState::Stopping);
        let requested = Instant::now();
        session.stop.trigger();

        let result = match session.worker.join() {
            Ok(device) => {
                self.metrics.record(
                    metric_names::CANCEL_LATENCY,
                    requested.elapsed().as_micros() as f64,
                );
                device.release()
            }
            Err(_) => Err(MicError::DeviceStopFailed("capture worker panicked".into())),
        };

        self.state.force_idle();
        drop(slot);
        span.finish();

        match &result {
            Ok(()) => info!(session = %session.id, "monitoring stopped"),
            Err(e) => warn!(session = %session.id, error = %e, "monitoring stopped with error"),
        }
        result
    }

    /// Forward transition under the session slot lock. The slot is the source
    /// of truth; a rejected transition means the two disagree, so realign.
    fn enter(&self, next: SessionState) {
        if let Err(e) = self.state.transition(next) {
            error!(error = %e, "session state out of sync with session slot");
            self.state.force(next);
        }
    }

    /// Most recent detection score, 0 if none was ever produced.
    pub fn get_current_level(&self) -> f64 {
        self.level.get()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    /// Push stream of detection scores, one per processed block.
    pub fn subscribe_level(&self) -> watch::Receiver<f64> {
        self.level.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Shared handle for readers that should not hold the whole service.
    pub fn level_handle(&self) -> Arc<LevelCell> {
        Arc::clone(&self.level)
    }

    pub fn metrics_summary(&self) -> HashMap<String, MetricSummary> {
        self.metrics.summary()
    }
}

impl Drop for MicService {
    fn drop(&mut self) {
        if let Err(e) = self.stop_session() {
            warn!(error = %e, "teardown stop failed");
        }
    }
}
