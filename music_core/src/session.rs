//! Seams between the controller and a live music model.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::MusicError;

/// A text prompt with its influence on generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedPrompt {
    pub text: String,
    pub weight: f32,
}

/// Generation settings sent during negotiation.
///
/// `bpm` is only serialized when the caller chose a tempo, leaving the choice
/// to the model otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm: Option<u32>,
}

/// Typed events read from a live session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// One or more raw PCM frames, in stream order.
    Audio(Vec<Vec<u8>>),
    /// The backend refused to continue for this prompt.
    Filtered { reason: String },
    /// The backend closed the stream.
    Closed,
}

/// Opens live generation sessions.
#[async_trait]
pub trait MusicBackend: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn MusicSession>, MusicError>;
}

/// One open, bidirectional generation session.
#[async_trait]
pub trait MusicSession: Send {
    async fn set_weighted_prompts(&mut self, prompts: &[WeightedPrompt]) -> Result<(), MusicError>;

    async fn set_generation_config(&mut self, config: &GenerationConfig) -> Result<(), MusicError>;

    async fn play(&mut self) -> Result<(), MusicError>;

    /// Next event from the backend. Must be cancel safe: the controller drops
    /// this future when the deadline fires.
    async fn next_event(&mut self) -> SessionEvent;

    async fn stop(&mut self) -> Result<(), MusicError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_omits_unset_bpm() {
        let config = GenerationConfig {
            temperature: 1.0,
            bpm: None,
        };
        assert_eq!(serde_json::to_value(&config).unwrap(), serde_json::json!({"temperature": 1.0}));

        let config = GenerationConfig {
            temperature: 1.5,
            bpm: Some(90),
        };
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            serde_json::json!({"temperature": 1.5, "bpm": 90})
        );
    }
}
