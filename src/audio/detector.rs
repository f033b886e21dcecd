//! Adaptive detector: tracks ambient loudness and scores spikes above it.
//!
//! Quiet blocks (below `quiet_ceiling`) feed a bounded FIFO of recent levels;
//! its mean is the noise floor. A block is significant only when it exceeds
//! the floor by more than `margin`, and the excess is scaled so that `range`
//! units above the floor saturate at 100. Loud blocks never enter the history,
//! so the floor keeps tracking the room instead of the event.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Upper bound on `history_capacity`; the history is preallocated.
pub const MAX_HISTORY_CAPACITY: usize = 1 << 16;

/// Detector tuning. The defaults are empirical.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Levels strictly below this are treated as ambient and recorded.
    pub quiet_ceiling: f64,
    /// Required excess over the floor for a block to count.
    pub margin: f64,
    /// Excess over the floor that maps to a score of 100.
    pub range: f64,
    /// Maximum number of ambient levels kept.
    pub history_capacity: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            quiet_ceiling: 70.0,
            margin: 10.0,
            range: 60.0,
            history_capacity: 20,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.history_capacity == 0 || self.history_capacity > MAX_HISTORY_CAPACITY {
            return Err(format!("history_capacity must be in 1..={MAX_HISTORY_CAPACITY}"));
        }
        if self.range.is_nan() || self.range <= 0.0 {
            return Err("range must be > 0".into());
        }
        if !self.margin.is_finite() || !self.quiet_ceiling.is_finite() {
            return Err("margin and quiet_ceiling must be finite".into());
        }
        Ok(())
    }
}

/// Stateful detector. Single writer: only the capture worker calls `update`.
#[derive(Debug)]
pub struct AdaptiveDetector {
    config: DetectorConfig,
    history: VecDeque<f64>,
}

impl AdaptiveDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let history = VecDeque::with_capacity(config.history_capacity.min(MAX_HISTORY_CAPACITY));
        Self { config, history }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Discard all ambient history. Safe to call at any time.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Mean of the ambient history, or 0 when empty.
    pub fn noise_floor(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().sum::<f64>() / self.history.len() as f64
    }

    /// Ambient history in arrival order, oldest first.
    pub fn history(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.history.iter().copied()
    }

    /// Score a loudness value in [0, 100], then record it if it is quiet.
    ///
    /// The floor used for scoring is the one built from earlier blocks only.
    pub fn update(&mut self, loudness: f64) -> f64 {
        let score = self.score(loudness, self.noise_floor());
        self.record_if_quiet(loudness);
        score
    }

    fn record_if_quiet(&mut self, loudness: f64) {
        if loudness < self.config.quiet_ceiling {
            self.history.push_back(loudness);
            while self.history.len() > self.config.history_capacity {
                self.history.pop_front();
            }
        }
    }

    /// Pure scoring step, separated so the floor can be held fixed.
    pub fn score(&self, loudness: f64, noise_floor: f64) -> f64 {
        if loudness > noise_floor + self.config.margin {
            (((loudness - noise_floor) / self.config.range) * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

impl Default for AdaptiveDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
