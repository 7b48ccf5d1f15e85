//! RIFF/WAVE container for raw interleaved PCM.
//!
//! The header is written by hand rather than through a sample writer because
//! streamed PCM can be cut mid-sample: trailing bytes that do not fill a whole
//! frame are kept as-is.

use std::path::{Path, PathBuf};

use crate::error::MusicError;

/// Size of the canonical 44-byte PCM WAV header.
pub const WAV_HEADER_LEN: usize = 44;

/// Layout of the raw PCM produced by the live model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

/// 48 kHz, stereo, 16-bit little-endian linear PCM.
pub const PCM_FORMAT: AudioFormat = AudioFormat {
    sample_rate: 48_000,
    channels: 2,
    bits_per_sample: 16,
};

impl AudioFormat {
    pub fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.block_align() as usize
    }

    pub fn duration_secs(&self, pcm_len: usize) -> f64 {
        pcm_len as f64 / self.bytes_per_second() as f64
    }

    /// e.g. `WAV 48kHz stereo 16-bit`
    pub fn describe(&self) -> String {
        let channels = match self.channels {
            1 => "mono".to_string(),
            2 => "stereo".to_string(),
            n => format!("{n}ch"),
        };
        format!(
            "WAV {}kHz {} {}-bit",
            self.sample_rate / 1000,
            channels,
            self.bits_per_sample
        )
    }
}

/// A complete WAV file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArtifact {
    bytes: Vec<u8>,
    format: AudioFormat,
}

impl EncodedArtifact {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn payload_len(&self) -> usize {
        self.bytes.len().saturating_sub(WAV_HEADER_LEN)
    }

    pub fn duration_secs(&self) -> f64 {
        self.format.duration_secs(self.payload_len())
    }

    /// Write the file into `dir` under `file_name`, creating the directory if needed.
    pub async fn stage(&self, dir: &Path, file_name: &str) -> Result<StagedArtifact, MusicError> {
        let path = dir.join(file_name);

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| MusicError::Encoding {
                path: dir.to_path_buf(),
                source,
            })?;
        tokio::fs::write(&path, &self.bytes)
            .await
            .map_err(|source| MusicError::Encoding {
                path: path.clone(),
                source,
            })?;

        Ok(StagedArtifact {
            path,
            object_name: file_name.to_string(),
            size_bytes: self.bytes.len(),
            duration_secs: self.duration_secs(),
            format: self.format,
        })
    }
}

/// An encoded file written to the local staging directory.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedArtifact {
    pub path: PathBuf,
    pub object_name: String,
    pub size_bytes: usize,
    pub duration_secs: f64,
    pub format: AudioFormat,
}

impl StagedArtifact {
    /// PCM bytes after the header.
    pub fn payload_len(&self) -> usize {
        self.size_bytes.saturating_sub(WAV_HEADER_LEN)
    }
}

/// Wrap raw PCM bytes in a WAV header. Pure and infallible.
pub fn encode_wav(pcm: &[u8], format: AudioFormat) -> EncodedArtifact {
    let byte_rate = format.bytes_per_second() as u32;
    let block_align = format.block_align();
    let data_size = pcm.len() as u32;
    let riff_size = 36 + data_size;

    let mut out = Vec::<u8>::with_capacity(WAV_HEADER_LEN + pcm.len());

    // RIFF header
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_size.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt chunk
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // linear PCM
    out.extend_from_slice(&format.channels.to_le_bytes());
    out.extend_from_slice(&format.sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&format.bits_per_sample.to_le_bytes());

    // data chunk
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
    out.extend_from_slice(pcm);

    EncodedArtifact { bytes: out, format }
}
