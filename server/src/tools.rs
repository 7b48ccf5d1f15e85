//! The two tools this server exposes and their argument handling.

use std::time::Instant;

use music_core::{GenerationRequest, MAX_BPM, MAX_DURATION_SECS, MIN_BPM, MIN_DURATION_SECS};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::ApiError;
use crate::validation::validate_description;
use crate::AppState;

pub const LYRICS_TOOL: &str = "lyrics.generate";
pub const MUSIC_TOOL: &str = "music.generate";

pub const SERVER_INSTRUCTIONS: &str = "Song lyrics and instrumental music generator. \
    Use lyrics.generate with a description of a song (title, artist, mood, theme, genre) \
    to receive original lyrics. Use music.generate with a description of the music you \
    want (genre, mood, instruments, style) to receive a downloadable WAV file.";

#[derive(Debug, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Text result of a tool call. `is_error` marks expected failures such as a
/// filtered prompt, which are reported to the caller as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

#[derive(Debug, Deserialize)]
struct LyricsArgs {
    description: String,
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: LYRICS_TOOL,
            description: "Generate original song lyrics inspired by the given description. \
                Returns lyrics with labeled sections (Verse, Chorus, Bridge, etc.).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "description": {
                        "type": "string",
                        "description": "Description of the song to draw inspiration from: \
                            title, artist, mood, theme, genre, tempo."
                    }
                },
                "required": ["description"]
            }),
        },
        ToolDefinition {
            name: MUSIC_TOOL,
            description: "Generate instrumental music from a text description. \
                Returns a download link (or local path) with duration, format and size.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "description": {
                        "type": "string",
                        "description": "Genre, mood, instruments and style, e.g. \
                            \"chill lo-fi hip hop with warm piano and vinyl crackle\"."
                    },
                    "duration_seconds": {
                        "type": "integer",
                        "default": 30,
                        "minimum": MIN_DURATION_SECS,
                        "maximum": MAX_DURATION_SECS
                    },
                    "bpm": {
                        "type": ["integer", "null"],
                        "minimum": MIN_BPM,
                        "maximum": MAX_BPM,
                        "description": "Beats per minute. Omit to let the model decide."
                    },
                    "temperature": {
                        "type": "number",
                        "default": 1.0,
                        "description": "Creativity / randomness (0.0-3.0). Higher = more varied."
                    }
                },
                "required": ["description"]
            }),
        },
    ]
}

fn parse_args<T: for<'de> Deserialize<'de>>(arguments: Value) -> Result<T, ApiError> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments)
        .map_err(|e| ApiError::InvalidInput(format!("Invalid arguments: {e}")))
}

/// Dispatch a tool call by name.
pub async fn call_tool(state: &AppState, name: &str, arguments: Value) -> Result<ToolOutput, ApiError> {
    match name {
        LYRICS_TOOL => {
            let args: LyricsArgs = parse_args(arguments)?;
            let text = generate_lyrics(state, &args.description).await?;
            Ok(ToolOutput {
                text,
                is_error: false,
            })
        }
        MUSIC_TOOL => {
            let request: GenerationRequest = parse_args(arguments)?;
            generate_music(state, &request).await
        }
        other => Err(ApiError::UnknownTool(other.to_string())),
    }
}

pub async fn generate_lyrics(state: &AppState, description: &str) -> Result<String, ApiError> {
    state.metrics.request_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    validate_description(description)?;
    let start_time = Instant::now();

    // The lyrics client blocks; keep it off the async runtime
    let result = tokio::time::timeout(
        state.config.lyrics_timeout(),
        tokio::task::spawn_blocking({
            let lyrics = state.lyrics.clone();
            let description = description.to_string();
            move || lyrics.generate(&description)
        }),
    )
    .await;

    let latency_ms = start_time.elapsed().as_millis() as u64;
    state.metrics.lyrics.record_request(latency_ms);

    match result {
        Ok(Ok(Ok(lyrics))) => {
            info!("Lyrics generated in {}ms, length={}", latency_ms, lyrics.len());
            Ok(lyrics)
        }
        Ok(Ok(Err(e))) => {
            state.metrics.lyrics.record_error();
            Err(ApiError::Lyrics(format!("{e:#}")))
        }
        Ok(Err(join_err)) => {
            error!("Lyrics task join error: {join_err}");
            state.metrics.lyrics.record_error();
            Err(ApiError::InternalError(format!("Task join error: {join_err}")))
        }
        Err(_) => {
            let timeout_secs = state.config.lyrics_timeout().as_secs();
            error!("Lyrics request timed out after {} seconds", timeout_secs);
            state.metrics.lyrics.record_error();
            Err(ApiError::Lyrics(format!(
                "Request timed out after {} seconds. Please try again.",
                timeout_secs
            )))
        }
    }
}

pub async fn generate_music(state: &AppState, request: &GenerationRequest) -> Result<ToolOutput, ApiError> {
    state.metrics.request_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    validate_description(&request.description)?;
    let start_time = Instant::now();

    let result = state.music.generate(request).await;
    state
        .metrics
        .music
        .record_request(start_time.elapsed().as_millis() as u64);

    match result {
        Ok(report) => {
            state.metrics.music_outcomes.record(&report);
            Ok(ToolOutput {
                text: report.to_string(),
                is_error: report.is_error(),
            })
        }
        Err(e) => {
            state.metrics.music.record_error();
            Err(ApiError::Music(e))
        }
    }
}
