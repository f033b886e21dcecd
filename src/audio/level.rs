//! Level estimation: RMS of a PCM i16 block mapped onto a decibel-like scale.
//! Absolute calibration is not a goal; values are only compared against the
//! adaptive noise floor.

use serde::{Deserialize, Serialize};

use crate::error::MicError;

/// Level estimator parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Added to the RMS amplitude before `log10`, keeping silent blocks finite.
    pub db_offset: f64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self { db_offset: 1.0 }
    }
}

/// Sum of squares over a frame, accumulated in f64 (i16² overflows i32 quickly).
#[inline]
pub fn sum_of_squares(samples: &[i16]) -> f64 {
    samples
        .iter()
        .map(|&s| {
            let f = s as f64;
            f * f
        })
        .sum()
}

/// Stateless loudness estimator.
#[derive(Debug, Clone)]
pub struct LevelEstimator {
    db_offset: f64,
}

impl LevelEstimator {
    pub fn new(config: &LevelConfig) -> Self {
        Self {
            db_offset: config.db_offset,
        }
    }

    /// Loudness of the first `count` samples as `20 * log10(rms + offset)`.
    ///
    /// Returns `Ok(None)` when the block carries no energy or maps to a
    /// non-positive level: the caller must skip the detector update for this
    /// block. A zero `count`, or one larger than the buffer, is `InvalidInput`.
    pub fn estimate(&self, samples: &[i16], count: usize) -> Result<Option<f64>, MicError> {
        if count == 0 {
            return Err(MicError::InvalidInput("sample count must be > 0".into()));
        }
        if count > samples.len() {
            return Err(MicError::InvalidInput(format!(
                "sample count {count} exceeds buffer length {}",
                samples.len()
            )));
        }

        let sum = sum_of_squares(&samples[..count]);
        if sum <= 0.0 {
            return Ok(None);
        }

        let rms = (sum / count as f64).sqrt();
        let db = 20.0 * (rms + self.db_offset).log10();
        if !db.is_finite() || db <= 0.0 {
            return Ok(None);
        }
        Ok(Some(db))
    }
}

impl Default for LevelEstimator {
    fn default() -> Self {
        Self::new(&LevelConfig::default())
    }
}

/// Convenience wrapper using the default offset.
pub fn estimate_loudness(samples: &[i16], count: usize) -> Result<Option<f64>, MicError> {
    LevelEstimator::default().estimate(samples, count)
}
