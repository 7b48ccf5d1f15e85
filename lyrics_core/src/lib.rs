use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const LYRICS_TEMPERATURE: f32 = 0.9;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Fixed instruction sent ahead of every description.
pub const SYSTEM_PROMPT: &str = "\
You are a talented songwriter and lyricist.  The user will describe an existing \
song: its title, artist, mood, theme, genre, or any combination of these.  \
Your job is to compose **original** lyrics inspired by that description.

Guidelines:
- Write complete lyrics with verses, a chorus, and optionally a bridge.
- Label each section (e.g. [Verse 1], [Chorus], [Bridge]).
- Match the mood, theme, and genre described.
- The lyrics must be **original**. Do NOT reproduce copyrighted lyrics.
- Keep it concise: aim for 3-4 minutes of singing time.
";

/// Anything that can turn a song description into lyrics.
///
/// Implementations block; callers on an async runtime should use
/// `spawn_blocking`.
pub trait LyricsGenerator: Send + Sync {
    fn generate(&self, description: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct LyricsConfig {
    pub model: String,
    pub api_key: String,
    pub endpoint: String,
    /// Whole-request limit for one Gemini call.
    pub timeout: Duration,
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl LyricsConfig {
    pub fn from_env() -> Self {
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .unwrap_or_default();
        let endpoint =
            std::env::var("GEMINI_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.into());
        Self {
            model,
            api_key,
            endpoint,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Structure for the Gemini generateContent request
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

/// Structure for the Gemini generateContent response
#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

pub struct GeminiLyricsClient {
    config: LyricsConfig,
}

impl GeminiLyricsClient {
    pub fn new(config: LyricsConfig) -> Self {
        Self { config }
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }
}

impl LyricsGenerator for GeminiLyricsClient {
    /// Single round trip: system instruction + description in, lyrics out.
    fn generate(&self, description: &str) -> Result<String> {
        let preview: String = description.chars().take(120).collect();
        info!("Generating lyrics for: {}", preview);

        let req_body = build_request(description);

        // The blocking client owns a runtime of its own; build and drop it on
        // the calling (blocking) thread.
        let client = Client::builder().timeout(self.config.timeout).build()?;
        let response = client
            .post(self.url())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&req_body)
            .send()?
            .error_for_status()? // convert non-200 into error
            .json::<GenerateResponse>()?;

        extract_text(response)
    }
}

fn build_request(description: &str) -> GenerateRequest<'_> {
    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: SYSTEM_PROMPT,
            }],
        },
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part { text: description }],
        }],
        generation_config: GenerationConfig {
            temperature: LYRICS_TEMPERATURE,
        },
    }
}

fn extract_text(response: GenerateResponse) -> Result<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(anyhow!("Model returned no lyrics"));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let value = serde_json::to_value(build_request("a rainy city ballad")).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "a rainy city ballad");
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], SYSTEM_PROMPT);
        assert!(value["systemInstruction"].get("role").is_none());
        assert!((value["generationConfig"]["temperature"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_extract_joins_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"[Verse 1]\n"},{"text":"la la"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "[Verse 1]\nla la");
    }

    #[test]
    fn test_extract_empty_is_error() {
        let response: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(extract_text(response).is_err());

        let response: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert!(extract_text(response).is_err());
    }

    #[test]
    fn test_url() {
        let client = GeminiLyricsClient::new(LyricsConfig {
            endpoint: "https://example.test/v1beta/".to_string(),
            ..LyricsConfig::default()
        });
        assert_eq!(
            client.url(),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_stalled_upstream_times_out() {
        // Accepts the connection and never answers
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let _holder = std::thread::spawn(move || {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept() {
                held.push(socket);
            }
        });

        let client = GeminiLyricsClient::new(
            LyricsConfig {
                endpoint: format!("http://127.0.0.1:{port}/v1beta"),
                api_key: "k".to_string(),
                ..LyricsConfig::default()
            }
            .with_timeout(Duration::from_millis(300)),
        );

        let started = std::time::Instant::now();
        let err = client.generate("a quiet folk song").unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(10), "{err:#}");
    }
}
