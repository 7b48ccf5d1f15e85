//! Scripted in-memory backend and object store for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use music_core::publisher::ObjectStore;
use music_core::{
    GenerationConfig, MusicBackend, MusicError, MusicSession, SessionEvent, StorageError,
    WeightedPrompt,
};

pub enum Step {
    Event(SessionEvent),
    Wait(Duration),
}

pub fn audio(len: usize, fill: u8) -> Step {
    Step::Event(SessionEvent::Audio(vec![vec![fill; len]]))
}

pub fn wait_secs(secs: u64) -> Step {
    Step::Wait(Duration::from_secs(secs))
}

#[derive(Debug, Default)]
pub struct Calls {
    pub connects: usize,
    pub prompts: Vec<WeightedPrompt>,
    pub configs: Vec<GenerationConfig>,
    pub played: bool,
    pub events_read: usize,
    pub stops: usize,
}

#[derive(Default)]
pub struct ScriptedBackend {
    pub steps: Mutex<Vec<Step>>,
    pub calls: Arc<Mutex<Calls>>,
    pub fail_connect: bool,
    pub fail_config: bool,
    pub hang_on_stop: bool,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> std::sync::MutexGuard<'_, Calls> {
        self.calls.lock().unwrap()
    }
}

#[async_trait]
impl MusicBackend for ScriptedBackend {
    async fn connect(&self) -> Result<Box<dyn MusicSession>, MusicError> {
        self.calls.lock().unwrap().connects += 1;
        if self.fail_connect {
            return Err(MusicError::negotiation("connection refused"));
        }
        let steps: VecDeque<Step> = std::mem::take(&mut *self.steps.lock().unwrap()).into();
        Ok(Box::new(ScriptedSession {
            steps,
            calls: self.calls.clone(),
            fail_config: self.fail_config,
            hang_on_stop: self.hang_on_stop,
        }))
    }
}

struct ScriptedSession {
    steps: VecDeque<Step>,
    calls: Arc<Mutex<Calls>>,
    fail_config: bool,
    hang_on_stop: bool,
}

#[async_trait]
impl MusicSession for ScriptedSession {
    async fn set_weighted_prompts(&mut self, prompts: &[WeightedPrompt]) -> Result<(), MusicError> {
        self.calls.lock().unwrap().prompts.extend_from_slice(prompts);
        Ok(())
    }

    async fn set_generation_config(&mut self, config: &GenerationConfig) -> Result<(), MusicError> {
        if self.fail_config {
            return Err(MusicError::negotiation("invalid config"));
        }
        self.calls.lock().unwrap().configs.push(config.clone());
        Ok(())
    }

    async fn play(&mut self) -> Result<(), MusicError> {
        self.calls.lock().unwrap().played = true;
        Ok(())
    }

    async fn next_event(&mut self) -> SessionEvent {
        loop {
            match self.steps.pop_front() {
                Some(Step::Event(event)) => {
                    self.calls.lock().unwrap().events_read += 1;
                    return event;
                }
                Some(Step::Wait(d)) => tokio::time::sleep(d).await,
                // A silent backend: only the deadline ends this
                None => std::future::pending::<()>().await,
            }
        }
    }

    async fn stop(&mut self) -> Result<(), MusicError> {
        self.calls.lock().unwrap().stops += 1;
        if self.hang_on_stop {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub bucket_checks: AtomicUsize,
    pub fail_bucket: bool,
    pub fail_put: bool,
    pub stall_put: bool,
}

impl MemoryStore {
    pub fn failing_put() -> Self {
        Self {
            fail_put: true,
            ..Self::default()
        }
    }

    /// Accepts the upload and never answers.
    pub fn stalled() -> Self {
        Self {
            stall_put: true,
            ..Self::default()
        }
    }

    pub fn failing_bucket() -> Self {
        Self {
            fail_bucket: true,
            ..Self::default()
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn ensure_bucket(&self) -> Result<(), StorageError> {
        self.bucket_checks.fetch_add(1, Ordering::SeqCst);
        if self.fail_bucket {
            return Err(StorageError::Status {
                operation: "HeadBucket",
                status: 403,
                body: String::new(),
            });
        }
        Ok(())
    }

    async fn put_object(
        &self,
        name: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        if self.stall_put {
            std::future::pending::<()>().await;
        }
        if self.fail_put {
            return Err(StorageError::Status {
                operation: "PutObject",
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        self.objects.lock().unwrap().insert(name.to_string(), body);
        Ok(())
    }

    fn locator(&self, name: &str) -> String {
        format!("https://storage.test/music-mcp/{name}")
    }
}

pub fn files_in(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Fields of the canonical 44-byte WAV header.
#[derive(Debug, PartialEq, Eq)]
pub struct Header {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

pub fn wav_header(bytes: &[u8]) -> Header {
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WAVE");
    assert_eq!(&bytes[36..40], b"data");
    let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
    let u32_at = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
    Header {
        channels: u16_at(22),
        sample_rate: u32_at(24),
        bits_per_sample: u16_at(34),
        data_len: u32_at(40),
    }
}
