//! Lifecycle of one streaming generation request.
//!
//! `Idle → Negotiating → Streaming → {Completed | Filtered | TimedOutEmpty |
//! TimedOutPartial} → Closed`. The session is stopped on every exit path,
//! including negotiation failure, and the stop itself is bounded so a stuck
//! backend cannot hold the request.

use std::fmt;
use std::time::Duration;

use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::buffer::AudioBuffer;
use crate::error::MusicError;
use crate::session::{GenerationConfig, MusicBackend, MusicSession, SessionEvent, WeightedPrompt};
use crate::wav::AudioFormat;
use crate::GenerationParams;

/// Upper bound on waiting for the backend to acknowledge a stop.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// Weight given to the caller's description.
pub const PROMPT_WEIGHT: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Negotiating,
    Streaming,
    Completed,
    Filtered,
    TimedOutEmpty,
    TimedOutPartial,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Negotiating => "negotiating",
            SessionState::Streaming => "streaming",
            SessionState::Completed => "completed",
            SessionState::Filtered => "filtered",
            SessionState::TimedOutEmpty => "timed_out_empty",
            SessionState::TimedOutPartial => "timed_out_partial",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Terminal result of the streaming phase.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// Target reached; PCM is exactly the target length.
    Completed(Vec<u8>),
    /// Deadline or end of stream before the target; PCM is everything received.
    Partial(Vec<u8>),
    /// Moderation stopped the session. Buffered audio is discarded.
    Filtered { reason: String },
    /// Deadline or end of stream without a single byte of audio.
    Empty,
}

impl StreamOutcome {
    pub fn state(&self) -> SessionState {
        match self {
            StreamOutcome::Completed(_) => SessionState::Completed,
            StreamOutcome::Partial(_) => SessionState::TimedOutPartial,
            StreamOutcome::Filtered { .. } => SessionState::Filtered,
            StreamOutcome::Empty => SessionState::TimedOutEmpty,
        }
    }
}

/// Drives one session from negotiation to close.
pub struct GenerationController<'a> {
    backend: &'a dyn MusicBackend,
    format: AudioFormat,
    state: SessionState,
}

impl<'a> GenerationController<'a> {
    pub fn new(backend: &'a dyn MusicBackend, format: AudioFormat) -> Self {
        Self {
            backend,
            format,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session state {} -> {}", self.state, next);
        self.state = next;
    }

    /// Run the session. Only negotiation failures are returned as errors.
    pub async fn run(&mut self, params: &GenerationParams) -> Result<StreamOutcome, MusicError> {
        // Computed once; never revisited mid-stream.
        let target_bytes = params.target_bytes(self.format);

        self.transition(SessionState::Negotiating);
        let mut session = match self.backend.connect().await {
            Ok(session) => session,
            Err(e) => {
                warn!("Failed to open session: {e}");
                self.transition(SessionState::Closed);
                return Err(e);
            }
        };

        if let Err(e) = negotiate(session.as_mut(), params).await {
            warn!("Negotiation failed: {e}");
            close(session.as_mut()).await;
            self.transition(SessionState::Closed);
            return Err(e);
        }

        self.transition(SessionState::Streaming);
        let deadline = Instant::now() + params.deadline();
        let outcome = self.stream(session.as_mut(), target_bytes, deadline).await;
        self.transition(outcome.state());

        close(session.as_mut()).await;
        self.transition(SessionState::Closed);

        Ok(outcome)
    }

    async fn stream(
        &self,
        session: &mut dyn MusicSession,
        target_bytes: usize,
        deadline: Instant,
    ) -> StreamOutcome {
        let mut buffer = AudioBuffer::with_capacity(target_bytes);

        loop {
            match timeout_at(deadline, session.next_event()).await {
                Ok(SessionEvent::Audio(frames)) => {
                    for frame in &frames {
                        buffer.append(frame);
                    }
                    if buffer.len() >= target_bytes {
                        debug!("Reached {} of {} target bytes", buffer.len(), target_bytes);
                        return StreamOutcome::Completed(buffer.into_truncated(target_bytes));
                    }
                }
                Ok(SessionEvent::Filtered { reason }) => {
                    warn!(
                        "Prompt was filtered after {} buffered bytes: {}",
                        buffer.len(),
                        reason
                    );
                    return StreamOutcome::Filtered { reason };
                }
                Ok(SessionEvent::Closed) => {
                    info!("Backend closed the stream after {} bytes", buffer.len());
                    return Self::short(buffer, target_bytes);
                }
                Err(_) => {
                    if buffer.is_empty() {
                        warn!("Deadline expired with no audio received");
                    } else {
                        warn!("Timed out after collecting {} bytes", buffer.len());
                    }
                    return Self::short(buffer, target_bytes);
                }
            }
        }
    }

    fn short(buffer: AudioBuffer, target_bytes: usize) -> StreamOutcome {
        if buffer.is_empty() {
            StreamOutcome::Empty
        } else {
            StreamOutcome::Partial(buffer.into_truncated(target_bytes))
        }
    }
}

async fn negotiate(session: &mut dyn MusicSession, params: &GenerationParams) -> Result<(), MusicError> {
    let prompts = [WeightedPrompt {
        text: params.description.clone(),
        weight: PROMPT_WEIGHT,
    }];
    session.set_weighted_prompts(&prompts).await?;

    let config = GenerationConfig {
        temperature: params.temperature,
        bpm: params.bpm,
    };
    session.set_generation_config(&config).await?;

    session.play().await
}

/// Best-effort, bounded stop. Failure here never fails the request.
async fn close(session: &mut dyn MusicSession) {
    match timeout(STOP_TIMEOUT, session.stop()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to stop session: {e}"),
        Err(_) => warn!("Session stop timed out after {:?}", STOP_TIMEOUT),
    }
}
