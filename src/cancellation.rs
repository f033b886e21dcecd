//! Stop signalling for the capture worker.
//! A flag polled once per iteration, plus a pause that wakes as soon as stop
//! is requested: the trigger drops the only sender of a zero-capacity channel,
//! which disconnects every pending `recv_timeout`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel as cb;
use parking_lot::Mutex;

/// Owner side, held by the session controller.
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    wake_tx: Mutex<Option<cb::Sender<()>>>,
    wake_rx: cb::Receiver<()>,
}

/// Observer side, cloned into the worker and device reads.
#[derive(Clone)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
    wake_rx: cb::Receiver<()>,
}

impl StopHandle {
    pub fn new() -> Self {
        let (tx, rx) = cb::bounded(0);
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
            wake_tx: Mutex::new(Some(tx)),
            wake_rx: rx,
        }
    }

    pub fn signal(&self) -> StopSignal {
        StopSignal {
            stopped: Arc::clone(&self.stopped),
            wake_rx: self.wake_rx.clone(),
        }
    }

    /// Request stop. Idempotent.
    pub fn trigger(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.wake_tx.lock().take();
    }

    pub fn is_triggered(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Sleep for `dur` unless stop is requested first.
    /// Returns `true` if the full pause elapsed, `false` if interrupted.
    pub fn pause(&self, dur: Duration) -> bool {
        if self.is_stopped() {
            return false;
        }
        match self.wake_rx.recv_timeout(dur) {
            Err(cb::RecvTimeoutError::Timeout) => !self.is_stopped(),
            _ => false,
        }
    }
}
