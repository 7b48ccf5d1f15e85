//! Common utilities for integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
    Router,
};
use lyrics_core::LyricsGenerator;
use music_core::{
    ArtifactPublisher, GenerationConfig, MusicBackend, MusicError, MusicGenerator, MusicSession,
    SessionEvent, WeightedPrompt,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use server::config::ServerConfig;
use server::AppState;

pub const FAKE_LYRICS: &str = "[Verse 1]\nNeon rain on empty streets\n\n[Chorus]\nWe glow";

/// Lyrics generator that echoes a fixed song, or fails when asked to.
pub struct FakeLyrics {
    pub fail: bool,
    pub seen: Mutex<Vec<String>>,
}

impl LyricsGenerator for FakeLyrics {
    fn generate(&self, description: &str) -> anyhow::Result<String> {
        self.seen.lock().unwrap().push(description.to_string());
        if self.fail {
            anyhow::bail!("Gemini API error: 500 Internal Server Error");
        }
        Ok(FAKE_LYRICS.to_string())
    }
}

/// What every session opened by [`FakeMusic`] does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Behavior {
    /// Four seconds of audio in a single frame, then end of stream.
    Full,
    Filtered,
    Silent,
    RefuseConnect,
}

pub struct FakeMusic {
    pub behavior: Behavior,
}

#[async_trait]
impl MusicBackend for FakeMusic {
    async fn connect(&self) -> Result<Box<dyn MusicSession>, MusicError> {
        if self.behavior == Behavior::RefuseConnect {
            return Err(MusicError::negotiation("connection refused"));
        }
        Ok(Box::new(FakeSession {
            behavior: self.behavior,
            sent: false,
        }))
    }
}

struct FakeSession {
    behavior: Behavior,
    sent: bool,
}

#[async_trait]
impl MusicSession for FakeSession {
    async fn set_weighted_prompts(&mut self, _prompts: &[WeightedPrompt]) -> Result<(), MusicError> {
        Ok(())
    }

    async fn set_generation_config(&mut self, _config: &GenerationConfig) -> Result<(), MusicError> {
        Ok(())
    }

    async fn play(&mut self) -> Result<(), MusicError> {
        Ok(())
    }

    async fn next_event(&mut self) -> SessionEvent {
        if self.sent {
            return SessionEvent::Closed;
        }
        self.sent = true;
        match self.behavior {
            Behavior::Full => SessionEvent::Audio(vec![vec![0u8; 4 * 192_000]]),
            Behavior::Filtered => SessionEvent::Filtered {
                reason: "artist name".to_string(),
            },
            Behavior::Silent | Behavior::RefuseConnect => SessionEvent::Closed,
        }
    }

    async fn stop(&mut self) -> Result<(), MusicError> {
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub lyrics: Arc<FakeLyrics>,
    pub staging: TempDir,
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(Behavior::Full, false)
}

pub fn create_test_app_with(behavior: Behavior, lyrics_fail: bool) -> TestApp {
    let staging = tempfile::tempdir().unwrap();
    let lyrics = Arc::new(FakeLyrics {
        fail: lyrics_fail,
        seen: Mutex::new(Vec::new()),
    });
    let music = Arc::new(MusicGenerator::new(
        Arc::new(FakeMusic { behavior }),
        ArtifactPublisher::local_only(),
        staging.path(),
    ));
    let state = AppState::new(lyrics.clone(), music, ServerConfig::default());
    TestApp {
        router: server::router(state.clone()),
        state,
        lyrics,
        staging,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    post_raw(uri, body.to_string())
}

pub fn post_raw(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}
