//! Capture adapter: the monitor of the default output sink, via cpal.

use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};

use crate::config::SyncConfig;
use crate::error::{SourceError, SyncError};
use crate::source::SampleSource;

/// How much interleaved audio the callback-side ring can hold.
const RING_SECONDS: usize = 4;

/// How long `read` sleeps between polls of an empty ring.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long `read` tolerates a completely silent ring before reporting
/// the stream as stalled. Monitor sources emit zeros even when nothing is
/// playing, so a dry ring means the stream itself died.
const STALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Error slot shared with the cpal callbacks.
#[derive(Default)]
struct CaptureStatus {
    error: Mutex<Option<String>>,
}

/// A running capture stream.
///
/// Capture continues while this guard exists and stops when it is
/// dropped. The underlying cpal stream is not `Send`, so the guard stays
/// on the supervisor thread while the [`CaptureSource`] half moves to the
/// producer thread.
pub struct CaptureStream {
    // Held only for RAII cleanup.
    _stream: cpal::Stream,
}

/// The producer-side half of the capture adapter.
///
/// Drains the callback ring, downmixes interleaved frames to mono, and
/// surfaces callback errors as [`SourceError`]s.
pub struct CaptureSource {
    ring: HeapCons<f32>,
    channels: usize,
    status: Arc<CaptureStatus>,
    staging: Vec<f32>,
}

impl CaptureSource {
    /// Connects to the monitor of the default output sink and starts
    /// capturing.
    ///
    /// Prefers an input device advertising itself as a monitor source and
    /// falls back to the default input device. The device must support the
    /// configured sample rate in f32; mismatches are rejected, never
    /// resampled.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if no device is available, the rate is
    /// unsupported, or the stream cannot be built and started.
    pub fn open(config: &SyncConfig) -> Result<(CaptureStream, CaptureSource), SyncError> {
        let host = cpal::default_host();
        let device = find_monitor_device(&host)?;
        let name = device
            .name()
            .unwrap_or_else(|_| "unknown".to_string());

        let supported = negotiate_rate(&device, &name, config.sample_rate)?;
        let channels = usize::from(supported.channels());
        let stream_config = supported.config();

        let ring = HeapRb::<f32>::new(config.sample_rate as usize * channels * RING_SECONDS);
        let (mut ring_producer, ring_consumer) = ring.split();

        let status = Arc::new(CaptureStatus::default());
        let callback_status = Arc::clone(&status);

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Non-blocking push; if the producer falls behind the
                    // ring drops the newest audio rather than the callback.
                    let _ = ring_producer.push_slice(data);
                },
                move |err| {
                    tracing::error!(error = %err, "capture stream error");
                    *callback_status.error.lock() = Some(err.to_string());
                },
                None,
            )
            .map_err(|e| SyncError::Backend(e.to_string()))?;
        stream
            .play()
            .map_err(|e| SyncError::Backend(e.to_string()))?;

        tracing::info!(
            device = %name,
            channels,
            rate = config.sample_rate,
            "capture stream started"
        );

        Ok((
            CaptureStream { _stream: stream },
            CaptureSource {
                ring: ring_consumer,
                channels,
                status,
                staging: Vec::new(),
            },
        ))
    }
}

impl SampleSource for CaptureSource {
    fn read(&mut self, out: &mut [f32]) -> Result<usize, SourceError> {
        let mut waited = Duration::ZERO;
        loop {
            if let Some(reason) = self.status.error.lock().take() {
                return Err(SourceError::Backend { reason });
            }

            let frames = (self.ring.occupied_len() / self.channels).min(out.len());
            if frames > 0 {
                let interleaved = frames * self.channels;
                self.staging.resize(interleaved, 0.0);
                let popped = self.ring.pop_slice(&mut self.staging[..interleaved]);
                let whole_frames = popped / self.channels;
                downmix(&self.staging[..whole_frames * self.channels], self.channels, out);
                return Ok(whole_frames);
            }

            if waited >= STALL_TIMEOUT {
                return Err(SourceError::backend("capture stream produced no samples"));
            }
            std::thread::sleep(POLL_INTERVAL);
            waited += POLL_INTERVAL;
        }
    }
}

/// Averages interleaved frames into mono samples.
fn downmix(interleaved: &[f32], channels: usize, out: &mut [f32]) {
    for (frame, sample) in interleaved.chunks_exact(channels).zip(out.iter_mut()) {
        *sample = frame.iter().sum::<f32>() / channels as f32;
    }
}

/// Finds the monitor of the default sink among the input devices, falling
/// back to the default input device.
fn find_monitor_device(host: &cpal::Host) -> Result<Device, SyncError> {
    let devices = host
        .input_devices()
        .map_err(|e| SyncError::Backend(e.to_string()))?;
    for device in devices {
        if let Ok(name) = device.name() {
            if name.to_ascii_lowercase().contains("monitor") {
                tracing::debug!(device = %name, "using monitor source");
                return Ok(device);
            }
        }
    }
    host.default_input_device()
        .ok_or(SyncError::NoCaptureDevice)
}

/// Picks an f32 input configuration at exactly the required rate.
fn negotiate_rate(
    device: &Device,
    name: &str,
    rate: u32,
) -> Result<cpal::SupportedStreamConfig, SyncError> {
    let ranges = device
        .supported_input_configs()
        .map_err(|e| SyncError::Backend(e.to_string()))?;
    for range in ranges {
        if range.sample_format() == SampleFormat::F32
            && range.min_sample_rate().0 <= rate
            && rate <= range.max_sample_rate().0
        {
            return Ok(range.with_sample_rate(SampleRate(rate)));
        }
    }
    Err(SyncError::UnsupportedSampleRate {
        requested: rate,
        device: name.to_string(),
    })
}
