pub mod capture;
pub mod encoder;
pub mod microphone;

pub use capture::{
    AudioCapture, AudioCaptureFactory, AudioFrame, CaptureConfig, MAX_FRAME_SAMPLES,
    TARGET_SAMPLE_RATE,
};
pub use microphone::{list_input_devices, MicrophoneCapture};
