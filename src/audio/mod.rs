//! Audio pipeline: device → ring buffer → level estimator → adaptive detector → level cell.
//! Capture runs on the device's callback thread (or inside the device read).
//! Processing runs on one dedicated worker thread per session.

pub mod detector;
pub mod device;
pub mod level;
pub mod ring_buffer;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cancellation::StopSignal;
use crate::level_cell::LevelCell;
use crate::metrics::{metric_names, MetricsRegistry};
use detector::AdaptiveDetector;
use device::AudioDevice;
use level::LevelEstimator;

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per processing block.
    pub frame_size: usize,
    /// Pause between reads when no backlog is waiting.
    pub read_pause_ms: u64,
    pub ring_buffer_secs: f32,
    /// Input device name; `None` uses the host default.
    pub device_name: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            frame_size: 1024, // ~23ms at 44.1kHz
            read_pause_ms: 20,
            ring_buffer_secs: 2.0,
            device_name: None,
        }
    }
}

impl AudioConfig {
    pub fn read_pause(&self) -> Duration {
        Duration::from_millis(self.read_pause_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample_rate must be > 0".into());
        }
        if self.channels != 1 {
            return Err(format!("only mono capture is supported, got {} channels", self.channels));
        }
        if self.frame_size == 0 {
            return Err("frame_size must be > 0".into());
        }
        Ok(())
    }
}

/// Per-block transform: PCM → loudness → score, published to the level cell.
pub struct BlockProcessor {
    estimator: LevelEstimator,
    detector: AdaptiveDetector,
    level: Arc<LevelCell>,
    metrics: Arc<MetricsRegistry>,
}

impl BlockProcessor {
    /// The detector is reset here; every session starts from an empty floor.
    pub fn new(
        estimator: LevelEstimator,
        mut detector: AdaptiveDetector,
        level: Arc<LevelCell>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        detector.reset();
        Self {
            estimator,
            detector,
            level,
            metrics,
        }
    }

    pub fn detector(&self) -> &AdaptiveDetector {
        &self.detector
    }

    /// Process the first `count` samples. Returns the published score, or
    /// `None` when the block carried no signal and nothing changed.
    pub fn process(&mut self, samples: &[i16], count: usize) -> Option<f64> {
        let span = self.metrics.span(metric_names::BLOCK_PROCESS);
        let loudness = match self.estimator.estimate(samples, count) {
            Ok(Some(db)) => db,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "skipping block");
                return None;
            }
        };

        let floor = self.detector.noise_floor();
        let score = self.detector.update(loudness);
        self.level.publish(score);
        span.finish();

        if score > 0.0 {
            self.metrics.record(metric_names::EVENT_SCORE, score);
            debug!(loudness, noise_floor = floor, score, "impulse_detected");
        }
        Some(score)
    }
}

/// Capture loop: reads blocks in capture order until stopped.
/// Returns the device so the caller can release it after the loop has exited.
pub fn run_capture_loop(
    mut device: Box<dyn AudioDevice>,
    mut processor: BlockProcessor,
    config: &AudioConfig,
    stop: StopSignal,
    session_id: Uuid,
) -> Box<dyn AudioDevice> {
    let mut frame_buf = vec![0i16; config.frame_size];
    let read_pause = config.read_pause();
    let mut read_failing = false;
    let mut blocks: u64 = 0;
    let started = Instant::now();

    info!(session = %session_id, "capture loop started");

    loop {
        if stop.is_stopped() {
            break;
        }

        match device.read(&mut frame_buf, &stop) {
            Ok(0) => {}
            Ok(n) => {
                read_failing = false;
                blocks += 1;
                processor.process(&frame_buf, n);
            }
            Err(e) => {
                // Log once per failure streak; the host decides whether to restart.
                if !read_failing {
                    warn!(session = %session_id, error = %e, "device read failed");
                    read_failing = true;
                }
            }
        }

        if device.pending() < config.frame_size && !stop.pause(read_pause) {
            break;
        }
    }

    info!(
        session = %session_id,
        blocks,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "capture loop stopping"
    );
    device
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::detector::DetectorConfig;
    use crate::audio::device::scripted::{ScriptedBackend, Step};
    use crate::audio::device::AudioBackend;
    use crate::cancellation::StopHandle;
    use std::sync::atomic::Ordering;

    fn processor() -> (BlockProcessor, Arc<LevelCell>) {
        let level = Arc::new(LevelCell::new());
        let p = BlockProcessor::new(
            LevelEstimator::default(),
            AdaptiveDetector::new(DetectorConfig::default()),
            Arc::clone(&level),
            Arc::new(MetricsRegistry::new()),
        );
        (p, level)
    }

    /// Constant block whose loudness is exactly `20 * log10(amp + 1)`.
    fn tone(amp: i16, len: usize) -> Vec<i16> {
        vec![amp; len]
    }

    #[test]
    fn silent_block_changes_nothing() {
        let (mut p, level) = processor();
        p.process(&tone(99, 64), 64); // 40 dB, becomes the floor
        level.publish(12.0);
        let before: Vec<f64> = p.detector().history().collect();

        assert_eq!(p.process(&tone(0, 64), 64), None);
        assert_eq!(p.detector().history().collect::<Vec<_>>(), before);
        assert_eq!(level.get(), 12.0);
    }

    #[test]
    fn spike_over_quiet_room_is_scored() {
        let (mut p, level) = processor();
        for _ in 0..5 {
            p.process(&tone(9, 256), 256); // 20 dB room
        }
        let score = p.process(&tone(9999, 256), 256).unwrap(); // 80 dB
        assert!((score - 100.0).abs() < 1e-9);
        assert_eq!(level.get(), score);
        // the spike is above the ceiling and must not raise the floor
        assert!((p.detector().noise_floor() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn zero_count_is_skipped() {
        let (mut p, level) = processor();
        assert_eq!(p.process(&tone(500, 8), 0), None);
        assert_eq!(level.get(), 0.0);
    }

    #[test]
    fn loop_processes_in_order_and_returns_device() {
        let backend = ScriptedBackend::with_blocks([tone(9, 128), tone(9, 128), tone(999, 128)]);
        let counters = Arc::clone(&backend.counters);
        let config = AudioConfig {
            frame_size: 128,
            read_pause_ms: 1,
            ..AudioConfig::default()
        };
        let device = backend.open(&config).unwrap();
        let (p, level) = processor();
        let handle = StopHandle::new();
        let signal = handle.signal();
        let cfg = config.clone();
        let worker = std::thread::spawn(move || run_capture_loop(device, p, &cfg, signal, Uuid::new_v4()));

        let deadline = Instant::now() + Duration::from_secs(5);
        while counters.reads.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        handle.trigger();
        let device = worker.join().unwrap();
        device.release().unwrap();

        assert_eq!(counters.reads.load(Ordering::SeqCst), 3);
        // floor 20 dB, last block 60 dB: (40 / 60) * 100
        assert!((level.get() - 200.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn read_failures_do_not_end_the_loop() {
        let backend = ScriptedBackend::default();
        backend.steps.lock().extend([
            Step::Fail("glitch"),
            Step::Fail("glitch"),
            Step::Block(tone(999, 64)),
        ]);
        let counters = Arc::clone(&backend.counters);
        let config = AudioConfig {
            frame_size: 64,
            read_pause_ms: 1,
            ..AudioConfig::default()
        };
        let device = backend.open(&config).unwrap();
        let (p, level) = processor();
        let handle = StopHandle::new();
        let signal = handle.signal();
        let cfg = config.clone();
        let worker = std::thread::spawn(move || run_capture_loop(device, p, &cfg, signal, Uuid::new_v4()));

        let deadline = Instant::now() + Duration::from_secs(5);
        while counters.reads.load(Ordering::SeqCst) < 1 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        handle.trigger();
        worker.join().unwrap();
        assert!((level.get() - 100.0).abs() < 1e-9);
    }
}
