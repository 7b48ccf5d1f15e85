// Metrics collection and tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use music_core::{GenerationReport, PublishResult};
use serde::Serialize;

/// Number of latency samples kept for percentile calculation
const MAX_LATENCY_SAMPLES: usize = 1000;

/// Per-tool metrics
#[derive(Debug, Clone)]
pub struct ToolMetrics {
    pub request_count: Arc<AtomicU64>,
    pub error_count: Arc<AtomicU64>,
    pub total_latency_ms: Arc<AtomicU64>,
    pub min_latency_ms: Arc<AtomicU64>,
    pub max_latency_ms: Arc<AtomicU64>,
    pub latency_samples: Arc<std::sync::Mutex<Vec<u64>>>,
}

impl ToolMetrics {
    pub fn new() -> Self {
        Self {
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            total_latency_ms: Arc::new(AtomicU64::new(0)),
            min_latency_ms: Arc::new(AtomicU64::new(u64::MAX)),
            max_latency_ms: Arc::new(AtomicU64::new(0)),
            latency_samples: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn record_request(&self, latency_ms: u64) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.min_latency_ms.fetch_min(latency_ms, Ordering::Relaxed);
        self.max_latency_ms.fetch_max(latency_ms, Ordering::Relaxed);

        if let Ok(mut samples) = self.latency_samples.lock() {
            samples.push(latency_ms);
            if samples.len() > MAX_LATENCY_SAMPLES {
                samples.remove(0);
            }
        }
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_latency_ms(&self) -> f64 {
        let count = self.request_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    fn percentile(&self, p: u8) -> u64 {
        if let Ok(samples) = self.latency_samples.lock() {
            if samples.is_empty() {
                return 0;
            }
            let mut sorted = samples.clone();
            sorted.sort_unstable();
            let index = (sorted.len() * p as usize / 100).min(sorted.len() - 1);
            sorted[index]
        } else {
            0
        }
    }

    pub fn stats(&self) -> ToolStats {
        let min = self.min_latency_ms.load(Ordering::Relaxed);
        ToolStats {
            request_count: self.request_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            avg_latency_ms: self.avg_latency_ms(),
            min_latency_ms: if min == u64::MAX { 0 } else { min },
            max_latency_ms: self.max_latency_ms.load(Ordering::Relaxed),
            p50_latency_ms: self.percentile(50),
            p95_latency_ms: self.percentile(95),
            p99_latency_ms: self.percentile(99),
        }
    }
}

impl Default for ToolMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Music-specific outcome counters
#[derive(Debug, Clone, Default)]
pub struct MusicMetrics {
    pub completed: Arc<AtomicU64>,
    pub partial: Arc<AtomicU64>,
    pub filtered: Arc<AtomicU64>,
    pub empty: Arc<AtomicU64>,
    pub published: Arc<AtomicU64>,
    pub degraded: Arc<AtomicU64>,
    pub total_pcm_bytes: Arc<AtomicU64>,
}

impl MusicMetrics {
    pub fn record(&self, report: &GenerationReport) {
        match report {
            GenerationReport::Filtered { .. } => {
                self.filtered.fetch_add(1, Ordering::Relaxed);
            }
            GenerationReport::NoAudio => {
                self.empty.fetch_add(1, Ordering::Relaxed);
            }
            GenerationReport::Produced {
                artifact,
                publish,
                partial,
            } => {
                let counter = if *partial { &self.partial } else { &self.completed };
                counter.fetch_add(1, Ordering::Relaxed);

                let counter = match publish {
                    PublishResult::Published { .. } => &self.published,
                    PublishResult::Degraded { .. } => &self.degraded,
                };
                counter.fetch_add(1, Ordering::Relaxed);

                self.total_pcm_bytes
                    .fetch_add(artifact.payload_len() as u64, Ordering::Relaxed);
            }
        }
    }

    pub fn stats(&self) -> MusicStats {
        MusicStats {
            completed: self.completed.load(Ordering::Relaxed),
            partial: self.partial.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            total_pcm_bytes: self.total_pcm_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Comprehensive metrics structure
#[derive(Debug, Clone)]
pub struct AppMetrics {
    pub lyrics: ToolMetrics,
    pub music: ToolMetrics,
    pub music_outcomes: MusicMetrics,
    pub request_count: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self {
            lyrics: ToolMetrics::new(),
            music: ToolMetrics::new(),
            music_outcomes: MusicMetrics::default(),
            request_count: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn snapshot(&self) -> DetailedMetricsResponse {
        DetailedMetricsResponse {
            timestamp: Utc::now(),
            system: SystemMetrics::collect(
                self.request_count.load(Ordering::Relaxed),
                self.started_at.elapsed().as_secs(),
            ),
            tools: ToolMetricsResponse {
                lyrics: self.lyrics.stats(),
                music: self.music.stats(),
            },
            music: self.music_outcomes.stats(),
        }
    }
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct DetailedMetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub system: SystemMetrics,
    pub tools: ToolMetricsResponse,
    pub music: MusicStats,
}

#[derive(Serialize)]
pub struct SystemMetrics {
    pub cpu_usage_percent: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub memory_usage_percent: f32,
    pub request_count: u64,
    pub uptime_seconds: u64,
}

impl SystemMetrics {
    fn collect(request_count: u64, uptime_seconds: u64) -> Self {
        let mut system = sysinfo::System::new();
        system.refresh_cpu();
        system.refresh_memory();

        let memory_used = system.used_memory();
        let memory_total = system.total_memory();
        let memory_usage_percent = if memory_total > 0 {
            (memory_used as f64 / memory_total as f64 * 100.0) as f32
        } else {
            0.0
        };

        Self {
            cpu_usage_percent: system.global_cpu_info().cpu_usage(),
            memory_used_mb: memory_used / 1024 / 1024,
            memory_total_mb: memory_total / 1024 / 1024,
            memory_usage_percent,
            request_count,
            uptime_seconds,
        }
    }
}

#[derive(Serialize)]
pub struct ToolMetricsResponse {
    pub lyrics: ToolStats,
    pub music: ToolStats,
}

#[derive(Debug, Serialize)]
pub struct ToolStats {
    pub request_count: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub p99_latency_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct MusicStats {
    pub completed: u64,
    pub partial: u64,
    pub filtered: u64,
    pub empty: u64,
    pub published: u64,
    pub degraded: u64,
    pub total_pcm_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use music_core::{StagedArtifact, PCM_FORMAT};

    #[test]
    fn test_latency_stats() {
        let metrics = ToolMetrics::new();
        assert_eq!(metrics.stats().min_latency_ms, 0);

        for ms in [30, 10, 20] {
            metrics.record_request(ms);
        }
        metrics.record_error();

        let stats = metrics.stats();
        assert_eq!(stats.request_count, 3);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.min_latency_ms, 10);
        assert_eq!(stats.max_latency_ms, 30);
        assert_eq!(stats.avg_latency_ms, 20.0);
        assert_eq!(stats.p50_latency_ms, 20);
    }

    #[test]
    fn test_music_outcomes() {
        let metrics = MusicMetrics::default();
        metrics.record(&GenerationReport::NoAudio);
        metrics.record(&GenerationReport::Filtered {
            reason: "x".to_string(),
        });
        metrics.record(&GenerationReport::Produced {
            artifact: StagedArtifact {
                path: "/tmp/music_x.wav".into(),
                object_name: "music_x.wav".to_string(),
                size_bytes: 96_044,
                duration_secs: 0.5,
                format: PCM_FORMAT,
            },
            publish: PublishResult::Degraded {
                local_path: "/tmp/music_x.wav".into(),
                reason: "down".to_string(),
            },
            partial: true,
        });

        let stats = metrics.stats();
        assert_eq!(stats.empty, 1);
        assert_eq!(stats.filtered, 1);
        assert_eq!(stats.partial, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.degraded, 1);
        assert_eq!(stats.published, 0);
        assert_eq!(stats.total_pcm_bytes, 96_000);
    }

    #[test]
    fn test_pcm_bytes_keep_misaligned_tail() {
        let metrics = MusicMetrics::default();
        metrics.record(&GenerationReport::Produced {
            artifact: StagedArtifact {
                path: "/tmp/music_y.wav".into(),
                object_name: "music_y.wav".to_string(),
                size_bytes: 44 + 288_003,
                duration_secs: 288_003.0 / 192_000.0,
                format: PCM_FORMAT,
            },
            publish: PublishResult::Published {
                url: "https://storage.test/music_y.wav".to_string(),
            },
            partial: true,
        });
        assert_eq!(metrics.stats().total_pcm_bytes, 288_003);
        assert_eq!(metrics.stats().published, 1);
    }
}
