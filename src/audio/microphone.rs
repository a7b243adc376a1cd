// Microphone capture backend using cpal.
//
// cpal streams are not Send, so the device and stream live on a dedicated
// OS thread for the duration of a capture. Frames cross to the control task
// through a bounded tokio channel; the audio callback never blocks on it.

use anyhow::{bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::thread;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use super::capture::{
    AudioCapture, AudioFrame, CaptureConfig, FRAME_CHANNEL_CAPACITY, MAX_FRAME_SAMPLES,
    TARGET_SAMPLE_RATE,
};
use super::encoder::{downmix_mono, PcmEncoder};

/// List available input device names (for the CLI).
pub fn list_input_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    if let Ok(inputs) = host.input_devices() {
        for (index, device) in inputs.enumerate() {
            names.push(
                device
                    .name()
                    .unwrap_or_else(|_| format!("Input {}", index + 1)),
            );
        }
    }
    names
}

/// Microphone capture backend
///
/// Selects one of two stream variants based on the device's native sample
/// format: a float callback that quantizes through the PCM encoder, or a
/// 16-bit callback that feeds the same path pre-scaled. Both preserve frame
/// order and emit frames capped at [`MAX_FRAME_SAMPLES`] samples.
pub struct MicrophoneCapture {
    config: CaptureConfig,
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
    thread_handle: Option<thread::JoinHandle<()>>,
    capturing: bool,
}

impl MicrophoneCapture {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        info!(
            "Microphone backend initialized ({}Hz, {} channels, echo_cancellation={}, noise_suppression={})",
            config.sample_rate, config.channels, config.echo_cancellation, config.noise_suppression
        );

        Ok(Self {
            config,
            stop_tx: None,
            thread_handle: None,
            capturing: false,
        })
    }
}

#[async_trait::async_trait]
impl AudioCapture for MicrophoneCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.capturing {
            bail!("Already capturing");
        }

        info!(
            "Starting microphone capture ({}Hz target, {} channel)",
            self.config.sample_rate, self.config.channels
        );

        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();

        let handle = thread::spawn(move || {
            let stream = match build_stream(frame_tx) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(e).context("Failed to start input stream"));
                return;
            }

            let _ = ready_tx.send(Ok(()));

            // Park until stop; dropping the stream releases the device and
            // closes the frame channel.
            let _ = stop_rx.recv();
            drop(stream);
        });

        // Await readiness without blocking the control task; the capture
        // thread reports exactly once.
        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = tokio::task::spawn_blocking(move || handle.join()).await;
                return Err(e);
            }
            Err(_) => {
                let _ = tokio::task::spawn_blocking(move || handle.join()).await;
                bail!("Capture thread exited before the stream was ready");
            }
        }

        self.stop_tx = Some(stop_tx);
        self.thread_handle = Some(handle);
        self.capturing = true;

        info!("Microphone capture started successfully");

        Ok(frame_rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.capturing {
            return Ok(());
        }

        info!("Stopping microphone capture");

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(handle) = self.thread_handle.take() {
            tokio::task::spawn_blocking(move || {
                if handle.join().is_err() {
                    warn!("Capture thread panicked");
                }
            })
            .await
            .context("Failed to join capture thread")?;
        }

        self.capturing = false;

        info!("Microphone capture stopped");

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

fn build_stream(frame_tx: mpsc::Sender<AudioFrame>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("No input device available")?;

    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let supported = device
        .default_input_config()
        .context("Input device refused to report a configuration")?;

    let sample_format = supported.sample_format();
    let stream_config: StreamConfig = supported.config();
    let input_rate = stream_config.sample_rate.0;
    let input_channels = stream_config.channels as usize;

    info!(
        "Opening input device '{}' ({}Hz, {} channels, {:?})",
        device_name, input_rate, input_channels, sample_format
    );

    let err_fn = |err| tracing::error!("Audio stream error: {}", err);

    let stream = match sample_format {
        SampleFormat::F32 => {
            let mut emitter = FrameEmitter::new(frame_tx, input_rate, input_channels);
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    emitter.push(data);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::I16 if input_rate == TARGET_SAMPLE_RATE && input_channels == 1 => {
            // Device output already matches the wire format; forward the
            // samples untouched rather than round-tripping through float.
            let mut emitter = FrameEmitter::new(frame_tx, input_rate, input_channels);
            device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    emitter.push_i16(data);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::I16 => {
            let mut emitter = FrameEmitter::new(frame_tx, input_rate, input_channels);
            device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let floats: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                    emitter.push(&floats);
                },
                err_fn,
                None,
            )?
        }
        format => bail!("Unsupported input sample format: {:?}", format),
    };

    Ok(stream)
}

/// Shared callback state: downmix, resample, quantize, split, hand off.
struct FrameEmitter {
    frame_tx: mpsc::Sender<AudioFrame>,
    encoder: PcmEncoder,
    channels: usize,
    started: Instant,
    dropped: u64,
}

impl FrameEmitter {
    fn new(frame_tx: mpsc::Sender<AudioFrame>, input_rate: u32, channels: usize) -> Self {
        Self {
            frame_tx,
            encoder: PcmEncoder::new(input_rate),
            channels,
            started: Instant::now(),
            dropped: 0,
        }
    }

    fn push(&mut self, interleaved: &[f32]) {
        let mono = downmix_mono(interleaved, self.channels);
        let samples = self.encoder.encode(&mono);
        self.emit(&samples);
    }

    /// Device samples already at the target rate, mono, 16-bit: no
    /// conversion, no quantization loss.
    fn push_i16(&mut self, samples: &[i16]) {
        self.emit(samples);
    }

    fn emit(&mut self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }

        let timestamp_ms = self.started.elapsed().as_millis() as u64;

        for chunk in samples.chunks(MAX_FRAME_SAMPLES) {
            let frame = AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: TARGET_SAMPLE_RATE,
                channels: 1,
                timestamp_ms,
            };

            // Never block the audio callback: drop when the control side
            // is saturated.
            if self.frame_tx.try_send(frame).is_err() {
                self.dropped += 1;
                if self.dropped % 100 == 1 {
                    warn!("Frame channel saturated, dropped {} frames", self.dropped);
                }
            }
        }
    }
}
