use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Base WebSocket URL of the recognizer (e.g. "ws://127.0.0.1:5000");
    /// the language path segment is appended per session.
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

#[derive(Debug, Deserialize)]
pub struct HistoryConfig {
    /// Path of the JSON history blob.
    pub path: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
