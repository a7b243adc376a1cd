use anyhow::Result;
use tokio::sync::mpsc;

/// Sample rate the recognizer expects (16kHz PCM).
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Maximum samples per emitted frame; longer device callbacks are split.
pub const MAX_FRAME_SAMPLES: usize = 4096;

/// Capture channel depth. When the control side falls behind, new frames
/// are dropped rather than blocking the audio callback.
pub const FRAME_CHANNEL_CAPACITY: usize = 64;

/// Capture configuration, immutable for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate in Hz (recognizer expects 16kHz)
    pub sample_rate: u32,
    /// Target channel count (mono)
    pub channels: u16,
    /// Echo cancellation hint for the capture device
    pub echo_cancellation: bool,
    /// Noise suppression hint for the capture device
    pub noise_suppression: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: TARGET_SAMPLE_RATE,
            channels: 1,
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// One unit of encoded audio handed to the transport (16-bit PCM, mono).
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Audio capture backend trait
///
/// Implementations run the device callback off the control task and hand
/// frames over through a bounded channel. Frame order is preserved; under
/// channel saturation the newest frame is dropped rather than blocking
/// capture.
#[async_trait::async_trait]
pub trait AudioCapture: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames. Each call
    /// produces a fresh, independent frame sequence.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing and release the device. Idempotent: stopping an
    /// already-stopped capture is a no-op.
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio capture factory
pub struct AudioCaptureFactory;

impl AudioCaptureFactory {
    /// Create the capture backend for this platform.
    pub fn create(config: CaptureConfig) -> Result<Box<dyn AudioCapture>> {
        let backend = super::microphone::MicrophoneCapture::new(config)?;
        Ok(Box::new(backend))
    }
}
