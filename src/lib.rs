//! shooter-mic: adaptive-threshold impulsive sound detector.
//! Live microphone PCM → RMS loudness → noise-floor-relative 0-100 score.

pub mod audio;
pub mod cancellation;
pub mod commands;
pub mod config;
pub mod error;
pub mod level_cell;
pub mod metrics;
pub mod session;
pub mod state_machine;

pub use audio::detector::{AdaptiveDetector, DetectorConfig};
pub use audio::device::{AudioBackend, AudioDevice, CpalBackend};
pub use audio::level::{estimate_loudness, LevelConfig, LevelEstimator};
pub use audio::AudioConfig;
pub use config::{ConfigError, LoggingConfig, MicConfig};
pub use error::MicError;
pub use session::MicService;
pub use state_machine::SessionState;

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. `RUST_LOG` wins over the config filter.
/// Calling it more than once is harmless.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
