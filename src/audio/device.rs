//! Capture device seam.
//! `AudioBackend` acquires a device; `AudioDevice` hands out PCM blocks until
//! released. The cpal backend captures on cpal's callback thread into a ring
//! buffer that the capture worker drains.

use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::{Condvar, Mutex};
use tracing::{error, info};

use super::ring_buffer::RingBuffer;
use super::AudioConfig;
use crate::cancellation::StopSignal;
use crate::error::MicError;

/// How long a blocked read sleeps before re-checking the stop signal.
const READ_POLL: Duration = Duration::from_millis(5);

/// An opened input device producing mono i16 PCM.
pub trait AudioDevice: Send {
    /// Fill `buf` with the next block, oldest samples first.
    ///
    /// Blocks until a full block is available. Returns `Ok(0)` once `stop` is
    /// signalled so a pending read never outlives the session.
    fn read(&mut self, buf: &mut [i16], stop: &StopSignal) -> Result<usize, MicError>;

    /// Samples already captured but not yet read.
    fn pending(&self) -> usize {
        0
    }

    /// Stop capture and give the device back to the OS.
    /// Errors are reported as `DeviceStopFailed`.
    fn release(self: Box<Self>) -> Result<(), MicError>;
}

/// Source of input devices (platform audio host, or a scripted one in tests).
pub trait AudioBackend: Send + Sync {
    /// Whether microphone access is authorized, checked before any device is opened.
    ///
    /// Only backends with an explicit permission model refuse here, with
    /// `PermissionDenied`. `CpalBackend` always returns `Ok`: desktop hosts
    /// refuse while the stream is built, so `open` reports `DeviceInitFailed`.
    fn check_permission(&self) -> Result<(), MicError>;

    /// Open the device at exactly the configured rate/format.
    fn open(&self, config: &AudioConfig) -> Result<Box<dyn AudioDevice>, MicError>;
}

/// Platform input via cpal.
pub struct CpalBackend {
    device_name: Option<String>,
}

impl CpalBackend {
    /// `None` selects the host's default input device.
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    fn resolve_device(&self) -> Result<cpal::Device, MicError> {
        let host = cpal::default_host();
        let device = match self.device_name.as_deref() {
            Some(name) => host
                .input_devices()
                .map_err(|e| MicError::DeviceInitFailed(format!("failed to enumerate input devices: {e}")))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| MicError::DeviceInitFailed(format!("input device not found: {name}")))?,
            None => host
                .default_input_device()
                .ok_or_else(|| MicError::DeviceInitFailed("no audio input device available".into()))?,
        };
        let dev_name = device.name().unwrap_or_else(|_| "unknown".into());
        info!(device = %dev_name, "selected input device");
        Ok(device)
    }
}

/// List available input device names.
pub fn list_input_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    if let Ok(devices) = host.input_devices() {
        for dev in devices {
            if let Ok(name) = dev.name() {
                names.push(name);
            }
        }
    }
    names
}

impl AudioBackend for CpalBackend {
    /// Desktop hosts gate microphone access when the stream is built; a refusal
    /// there surfaces as `DeviceInitFailed`.
    fn check_permission(&self) -> Result<(), MicError> {
        Ok(())
    }

    fn open(&self, config: &AudioConfig) -> Result<Box<dyn AudioDevice>, MicError> {
        let device = self.resolve_device()?;

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        // At least two blocks of headroom, whatever ring_buffer_secs says.
        let ring = RingBuffer::new(config.sample_rate, config.ring_buffer_secs, config.frame_size * 2);
        let shared = Arc::new(SharedCapture {
            ring: Mutex::new(ring),
            ready: Condvar::new(),
            failure: Mutex::new(None),
        });

        let shared_cb = Arc::clone(&shared);
        let shared_err = Arc::clone(&shared);
        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    // Audio callback: just write to ring buffer. No allocation, no blocking.
                    shared_cb.ring.lock().write(data);
                    shared_cb.ready.notify_one();
                },
                move |err| {
                    error!(error = %err, "audio capture error");
                    *shared_err.failure.lock() = Some(err.to_string());
                    shared_err.ready.notify_one();
                },
                None,
            )
            .map_err(|e| MicError::DeviceInitFailed(format!("failed to build input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| MicError::DeviceInitFailed(format!("failed to start input stream: {e}")))?;

        info!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            frame_size = config.frame_size,
            "audio capture stream started"
        );

        Ok(Box::new(CpalDevice {
            stream: StreamGuard(stream),
            shared,
        }))
    }
}

/// State shared between the cpal callback and the capture worker.
struct SharedCapture {
    ring: Mutex<RingBuffer>,
    ready: Condvar,
    failure: Mutex<Option<String>>,
}

/// Owns the stream handle; it is only paused and dropped, never used for I/O.
struct StreamGuard(cpal::Stream);

// Safety: the wrapped stream is never shared; it moves with its device between
// the controller and the capture worker, and is only paused and dropped.
unsafe impl Send for StreamGuard {}

struct CpalDevice {
    stream: StreamGuard,
    shared: Arc<SharedCapture>,
}

impl AudioDevice for CpalDevice {
    fn read(&mut self, buf: &mut [i16], stop: &StopSignal) -> Result<usize, MicError> {
        let mut ring = self.shared.ring.lock();
        loop {
            if stop.is_stopped() {
                return Ok(0);
            }
            if let Some(msg) = self.shared.failure.lock().take() {
                return Err(MicError::DeviceReadFailed(msg));
            }
            if ring.available() >= buf.len() {
                return Ok(ring.read(buf));
            }
            self.shared.ready.wait_for(&mut ring, READ_POLL);
        }
    }

    fn pending(&self) -> usize {
        self.shared.ring.lock().available()
    }

    fn release(self: Box<Self>) -> Result<(), MicError> {
        let overrun = self.shared.ring.lock().overrun();
        self.stream
            .0
            .pause()
            .map_err(|e| MicError::DeviceStopFailed(format!("failed to pause input stream: {e}")))?;
        drop(self.stream);
        info!(overrun_samples = overrun, "audio capture stream released");
        Ok(())
    }
}
