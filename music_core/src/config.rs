// Configuration for the music generation pipeline

use std::path::PathBuf;

pub const DEFAULT_LYRIA_MODEL: &str = "models/lyria-realtime-exp";
pub const DEFAULT_LYRIA_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateMusic";

/// Live music model connection settings.
#[derive(Debug, Clone)]
pub struct LyriaConfig {
    pub model: String,
    pub api_key: String,
    pub endpoint: String,
}

impl Default for LyriaConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_LYRIA_MODEL.to_string(),
            api_key: String::new(),
            endpoint: DEFAULT_LYRIA_ENDPOINT.to_string(),
        }
    }
}

impl LyriaConfig {
    pub fn from_env() -> Self {
        let model = std::env::var("LYRIA_MODEL").unwrap_or_else(|_| DEFAULT_LYRIA_MODEL.into());

        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .unwrap_or_default();

        let endpoint =
            std::env::var("LYRIA_ENDPOINT").unwrap_or_else(|_| DEFAULT_LYRIA_ENDPOINT.into());

        Self {
            model,
            api_key,
            endpoint,
        }
    }
}

/// S3-compatible object storage settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Host (and optional port) without scheme, e.g. `minio.example.org:9000`.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Selects TLS for storage requests and the scheme of returned locators.
    pub secure: bool,
    pub region: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "minio.nblotti.org".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket: "music-mcp".to_string(),
            secure: true,
            region: "us-east-1".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let endpoint = std::env::var("MINIO_ENDPOINT").unwrap_or(defaults.endpoint);
        let access_key = std::env::var("MINIO_ACCESS_KEY").unwrap_or_default();
        let secret_key = std::env::var("MINIO_SECRET_KEY").unwrap_or_default();
        let bucket = std::env::var("MINIO_BUCKET").unwrap_or(defaults.bucket);

        let secure = std::env::var("MINIO_SECURE")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(defaults.secure);

        let region = std::env::var("MINIO_REGION").unwrap_or(defaults.region);

        Self {
            endpoint,
            access_key,
            secret_key,
            bucket,
            secure,
            region,
        }
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty() && !self.bucket.trim().is_empty()
    }

    /// Public locator for an object in the configured bucket.
    pub fn locator(&self, object_name: &str) -> String {
        format!(
            "{}://{}/{}/{}",
            self.scheme(),
            self.endpoint,
            self.bucket,
            object_name
        )
    }
}

/// Top-level configuration for [`crate::MusicGenerator`].
#[derive(Debug, Clone)]
pub struct MusicConfig {
    /// Directory where encoded files are staged before upload.
    pub staging_dir: PathBuf,
    pub lyria: LyriaConfig,
    pub storage: StorageConfig,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            staging_dir: std::env::temp_dir().join("music_mcp"),
            lyria: LyriaConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl MusicConfig {
    pub fn from_env() -> Self {
        let output_dir = std::env::var("MUSIC_OUTPUT_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        Self {
            staging_dir: output_dir.join("music_mcp"),
            lyria: LyriaConfig::from_env(),
            storage: StorageConfig::from_env(),
        }
    }
}
