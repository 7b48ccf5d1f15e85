//! One `music.generate` request end to end.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::MusicConfig;
use crate::controller::{GenerationController, StreamOutcome};
use crate::error::MusicError;
use crate::lyria::LyriaBackend;
use crate::publisher::{ArtifactPublisher, PublishResult};
use crate::s3::S3Store;
use crate::session::MusicBackend;
use crate::wav::{encode_wav, AudioFormat, StagedArtifact, PCM_FORMAT};
use crate::GenerationRequest;

const FILTERED_MESSAGE: &str = "Error: your prompt was blocked by the safety filter. \
    Avoid referencing real artist names, copyrighted song titles, or trademarked terms. \
    Describe the musical style instead (e.g. genre, mood, instruments, tempo).";

const NO_AUDIO_MESSAGE: &str = "Error: no audio was generated. The prompt may have been \
    silently filtered. Avoid referencing real artist names or song titles. \
    Describe the musical style instead.";

/// What a generation request produced, rendered for the caller by `Display`.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationReport {
    Filtered {
        reason: String,
    },
    NoAudio,
    Produced {
        artifact: StagedArtifact,
        publish: PublishResult,
        /// Fewer bytes than requested arrived before the deadline.
        partial: bool,
    },
}

impl GenerationReport {
    pub fn is_error(&self) -> bool {
        !matches!(self, GenerationReport::Produced { .. })
    }
}

impl fmt::Display for GenerationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (artifact, publish) = match self {
            GenerationReport::Filtered { .. } => return f.write_str(FILTERED_MESSAGE),
            GenerationReport::NoAudio => return f.write_str(NO_AUDIO_MESSAGE),
            GenerationReport::Produced {
                artifact, publish, ..
            } => (artifact, publish),
        };

        match publish {
            PublishResult::Published { url } => writeln!(f, "Download your music: {url}")?,
            PublishResult::Degraded { local_path, .. } => {
                writeln!(f, "Generated music saved to: {}", local_path.display())?
            }
        }
        write!(
            f,
            "Duration: {:.1}s | Format: {} | Size: {:.0} KB",
            artifact.duration_secs,
            artifact.format.describe(),
            artifact.size_bytes as f64 / 1024.0
        )?;
        if publish.is_degraded() {
            write!(f, "\nWarning: upload failed; file is only available locally.")?;
        }
        Ok(())
    }
}

pub struct MusicGenerator {
    backend: Arc<dyn MusicBackend>,
    publisher: ArtifactPublisher,
    staging_dir: PathBuf,
    format: AudioFormat,
}

impl MusicGenerator {
    pub fn new(
        backend: Arc<dyn MusicBackend>,
        publisher: ArtifactPublisher,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            publisher,
            staging_dir: staging_dir.into(),
            format: PCM_FORMAT,
        }
    }

    /// Live model backend plus S3 publishing, or local-only when storage is unset.
    pub fn from_config(config: &MusicConfig) -> Self {
        let backend = Arc::new(LyriaBackend::new(config.lyria.clone()));
        let publisher = if config.storage.is_configured() {
            match S3Store::new(config.storage.clone()) {
                Ok(store) => ArtifactPublisher::new(Arc::new(store)),
                Err(e) => {
                    warn!("Storage client unavailable, keeping files local: {e}");
                    ArtifactPublisher::local_only()
                }
            }
        } else {
            ArtifactPublisher::local_only()
        };
        Self::new(backend, publisher, config.staging_dir.clone())
    }

    pub fn staging_dir(&self) -> &PathBuf {
        &self.staging_dir
    }

    /// Run one request. Only negotiation and local write failures are errors.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationReport, MusicError> {
        let params = request.clamped();
        info!(
            "Generating {}s of music for: {}",
            params.duration_secs,
            preview(&params.description)
        );

        let mut controller = GenerationController::new(self.backend.as_ref(), self.format);
        let (pcm, partial) = match controller.run(&params).await? {
            StreamOutcome::Completed(pcm) => (pcm, false),
            StreamOutcome::Partial(pcm) => (pcm, true),
            StreamOutcome::Filtered { reason } => return Ok(GenerationReport::Filtered { reason }),
            StreamOutcome::Empty => return Ok(GenerationReport::NoAudio),
        };

        let artifact = encode_wav(&pcm, self.format);
        let file_name = format!("music_{}.wav", Uuid::new_v4().simple());
        let staged = artifact.stage(&self.staging_dir, &file_name).await?;
        info!(
            "Saved {} ({:.1}s, {:.0} KB)",
            staged.path.display(),
            staged.duration_secs,
            staged.size_bytes as f64 / 1024.0
        );

        let publish = self.publisher.publish(&staged).await;
        Ok(GenerationReport::Produced {
            artifact: staged,
            publish,
            partial,
        })
    }
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::PCM_FORMAT;

    fn staged(path: &str) -> StagedArtifact {
        StagedArtifact {
            path: PathBuf::from(path),
            object_name: "music_x.wav".to_string(),
            size_bytes: 192_044,
            duration_secs: 1.0,
            format: PCM_FORMAT,
        }
    }

    #[test]
    fn test_published_report_text() {
        let report = GenerationReport::Produced {
            artifact: staged("/tmp/music_mcp/music_x.wav"),
            publish: PublishResult::Published {
                url: "https://minio.local/music-mcp/music_x.wav".to_string(),
            },
            partial: false,
        };
        assert_eq!(
            report.to_string(),
            "Download your music: https://minio.local/music-mcp/music_x.wav\n\
             Duration: 1.0s | Format: WAV 48kHz stereo 16-bit | Size: 188 KB"
        );
        assert!(!report.is_error());
    }

    #[test]
    fn test_degraded_report_mentions_path_and_warning() {
        let report = GenerationReport::Produced {
            artifact: staged("/tmp/music_mcp/music_x.wav"),
            publish: PublishResult::Degraded {
                local_path: PathBuf::from("/tmp/music_mcp/music_x.wav"),
                reason: "connection refused".to_string(),
            },
            partial: true,
        };
        let text = report.to_string();
        assert!(text.contains("Generated music saved to: /tmp/music_mcp/music_x.wav"));
        assert!(text.contains("Warning:"));
    }

    #[test]
    fn test_filtered_and_empty_messages_differ() {
        let filtered = GenerationReport::Filtered {
            reason: "artist".to_string(),
        };
        let empty = GenerationReport::NoAudio;
        assert!(filtered.to_string().contains("safety filter"));
        assert!(empty.to_string().contains("no audio was generated"));
        assert_ne!(filtered.to_string(), empty.to_string());
        assert!(filtered.is_error() && empty.is_error());
    }

    #[test]
    fn test_preview_truncates_on_chars() {
        let long = "é".repeat(300);
        assert_eq!(preview(&long).chars().count(), 120);
    }
}
