use std::path::Path;
use std::time::Duration;

use md_chunk::{ChunkOptions, ChunkingStrategy};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StreamError;

/// Options for one streaming session. Missing JSON keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamOptions {
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    /// `None` lets content analysis choose
    pub chunking_strategy: Option<ChunkingStrategy>,
    pub enable_progressive_rendering: bool,
    pub enable_smart_chunking: bool,
    /// 1 (slowest) to 100
    pub streaming_speed: u32,
    pub show_typing_indicators: bool,
    pub enable_math_rendering: bool,
    pub fold_threshold: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: 150,
            min_chunk_size: 30,
            chunking_strategy: None,
            enable_progressive_rendering: true,
            enable_smart_chunking: true,
            streaming_speed: 25,
            show_typing_indicators: true,
            enable_math_rendering: true,
            fold_threshold: 2000,
        }
    }
}

impl StreamOptions {
    pub fn from_json(json: &str) -> Result<Self, StreamError> {
        let options: StreamOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let options = Self::from_json(&contents)?;
        info!("loaded stream options from {}", path.display());
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if !(1..=100).contains(&self.streaming_speed) {
            return Err(StreamError::InvalidOptions(format!(
                "streaming speed {} is outside 1..=100",
                self.streaming_speed
            )));
        }
        self.chunk_options().validate()?;
        Ok(())
    }

    pub fn chunk_options(&self) -> ChunkOptions {
        ChunkOptions {
            max_chunk_size: self.max_chunk_size,
            min_chunk_size: self.min_chunk_size,
            strategy: self.chunking_strategy,
            fold_threshold: self.fold_threshold,
        }
    }

    /// Bytes revealed per step: one char at normal speed and below, more as
    /// the speed goes up.
    pub fn reveal_step(&self) -> usize {
        let speed = self.speed();
        if speed < 25 {
            1
        } else {
            ((speed - 25) as f64 / 10.0).round().max(1.0) as usize
        }
    }

    /// Pause between reveal steps.
    pub fn step_delay(&self) -> Duration {
        let millis = (100.0 / (self.speed() as f64).sqrt()).round().max(1.0);
        Duration::from_millis(millis as u64)
    }

    /// Pause between chunks: 50ms at the default speed.
    pub fn chunk_pause(&self) -> Duration {
        Duration::from_millis((50 * 25 / self.speed() as u64).max(1))
    }

    fn speed(&self) -> u32 {
        self.streaming_speed.clamp(1, 100)
    }
}
