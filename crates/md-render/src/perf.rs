use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

/// Frame time at 60 fps, in milliseconds.
const TARGET_FRAME_MS: f64 = 16.67;
/// Chunk latency that costs half the chunk score.
const TARGET_CHUNK_MS: f64 = 5.0;
const RECENT_FRAMES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkSample {
    pub chunk_id: usize,
    pub latency_ms: f64,
    pub complexity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub chunks: usize,
    pub frames: usize,
    pub average_chunk_ms: f64,
    pub average_frame_ms: f64,
    pub score: u32,
}

#[derive(Debug, Default)]
pub struct PerformanceMonitor {
    chunks: Vec<ChunkSample>,
    frames: VecDeque<f64>,
    frame_count: usize,
    frame_total_ms: f64,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_chunk(&mut self, chunk_id: usize, latency: Duration, complexity: f64) {
        self.chunks.push(ChunkSample {
            chunk_id,
            latency_ms: millis(latency),
            complexity,
        });
    }

    pub fn record_frame(&mut self, frame: Duration) {
        let ms = millis(frame);
        self.frame_count += 1;
        self.frame_total_ms += ms;
        if self.frames.len() == RECENT_FRAMES {
            self.frames.pop_front();
        }
        self.frames.push_back(ms);
    }

    pub fn samples(&self) -> &[ChunkSample] {
        &self.chunks
    }

    pub fn average_chunk_ms(&self) -> f64 {
        if self.chunks.is_empty() {
            return 0.0;
        }
        self.chunks.iter().map(|s| s.latency_ms).sum::<f64>() / self.chunks.len() as f64
    }

    pub fn average_frame_ms(&self) -> f64 {
        if self.frame_count == 0 {
            return 0.0;
        }
        self.frame_total_ms / self.frame_count as f64
    }

    /// Average of the last few frames, used to size work units.
    pub fn recent_frame_ms(&self) -> f64 {
        if self.frames.is_empty() {
            return 0.0;
        }
        self.frames.iter().sum::<f64>() / self.frames.len() as f64
    }

    /// 0..=100, half from frame times against 60 fps and half from chunk
    /// latency.
    pub fn score(&self) -> u32 {
        let frame_score = (100.0 - self.average_frame_ms() / TARGET_FRAME_MS * 50.0).max(0.0);
        let chunk_score = (100.0 - self.average_chunk_ms() / TARGET_CHUNK_MS * 50.0).max(0.0);
        ((frame_score + chunk_score) / 2.0).round() as u32
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        PerformanceMetrics {
            chunks: self.chunks.len(),
            frames: self.frame_count,
            average_chunk_ms: self.average_chunk_ms(),
            average_frame_ms: self.average_frame_ms(),
            score: self.score(),
        }
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
