//! Streaming music generation.
//!
//! A request flows through four stages: the [`controller`] negotiates a live
//! session with a [`session::MusicBackend`] and accumulates streamed PCM into an
//! [`buffer::AudioBuffer`] under a deadline, the [`wav`] encoder wraps the PCM in
//! a RIFF/WAVE container, and the [`publisher`] hands the file to object storage
//! (or reports the local path when storage is unavailable). [`generator`] ties
//! the stages together for one request.

pub mod buffer;
pub mod config;
pub mod controller;
pub mod error;
pub mod generator;
pub mod lyria;
pub mod publisher;
pub mod s3;
pub mod session;
pub mod wav;

use std::time::Duration;

use serde::Deserialize;

pub use buffer::AudioBuffer;
pub use config::{LyriaConfig, MusicConfig, StorageConfig};
pub use controller::{GenerationController, SessionState, StreamOutcome};
pub use error::{MusicError, StorageError};
pub use generator::{GenerationReport, MusicGenerator};
pub use publisher::{ArtifactPublisher, PublishResult};
pub use session::{GenerationConfig, MusicBackend, MusicSession, SessionEvent, WeightedPrompt};
pub use wav::{AudioFormat, EncodedArtifact, StagedArtifact, PCM_FORMAT};

pub const MIN_DURATION_SECS: u32 = 1;
pub const MAX_DURATION_SECS: u32 = 120;
pub const DEFAULT_DURATION_SECS: i64 = 30;
pub const MIN_BPM: u32 = 60;
pub const MAX_BPM: u32 = 200;
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

/// Time allowed beyond the requested duration for backend start-up latency.
pub const DEADLINE_GRACE: Duration = Duration::from_secs(5);

/// Caller-supplied generation parameters, exactly as received.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRequest {
    pub description: String,
    #[serde(default = "default_duration")]
    pub duration_seconds: i64,
    #[serde(default)]
    pub bpm: Option<i64>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_duration() -> i64 {
    DEFAULT_DURATION_SECS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl GenerationRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            duration_seconds: DEFAULT_DURATION_SECS,
            bpm: None,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_duration(mut self, seconds: i64) -> Self {
        self.duration_seconds = seconds;
        self
    }

    pub fn with_bpm(mut self, bpm: i64) -> Self {
        self.bpm = Some(bpm);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Clamp duration and tempo into their valid ranges. Out-of-range values
    /// are never rejected. Temperature is passed through for the backend to judge.
    pub fn clamped(&self) -> GenerationParams {
        let duration_secs = self
            .duration_seconds
            .clamp(MIN_DURATION_SECS as i64, MAX_DURATION_SECS as i64) as u32;
        let bpm = self
            .bpm
            .map(|bpm| bpm.clamp(MIN_BPM as i64, MAX_BPM as i64) as u32);

        GenerationParams {
            description: self.description.clone(),
            duration_secs,
            bpm,
            temperature: self.temperature,
        }
    }
}

/// Validated parameters for one generation session.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub description: String,
    pub duration_secs: u32,
    pub bpm: Option<u32>,
    pub temperature: f32,
}

impl GenerationParams {
    /// Number of PCM bytes that make up the requested duration.
    pub fn target_bytes(&self, format: AudioFormat) -> usize {
        self.duration_secs as usize * format.bytes_per_second()
    }

    /// Overall wall-clock budget for the streaming phase.
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.duration_secs as u64) + DEADLINE_GRACE
    }
}
