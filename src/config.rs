use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DubError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub translate: TranslateConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Chat-completions API base URL
    pub api_base: String,
    /// API key; empty value falls back to the OPENAI_API_KEY environment variable
    #[serde(default)]
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Maximum attempts per transcript line
    pub max_line_attempts: u32,
    /// Maximum attempts for the summarization exchange pair
    pub max_summary_attempts: u32,
    /// Delay between attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Number of recent accepted translations carried as prompt context
    pub history_window: usize,
    /// Source length (chars) at or below which a line counts as short
    pub short_source_max: usize,
    /// Candidate length (chars) above which a short-source translation is
    /// rejected as commentary
    pub commentary_max: usize,
    /// Candidate-to-source length ratio above which a translation is rejected
    pub length_ratio: f64,
    /// What to do with a line that exhausts all attempts
    pub exhaustion_policy: ExhaustionPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExhaustionPolicy {
    /// Record an empty-string sentinel at the line's index and continue
    Placeholder,
    /// Fail the whole per-video job
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary
    pub probe_path: String,
    /// Directory holding watermark images
    pub watermark_dir: String,
    /// Watermark overlay size (square, pixels)
    pub watermark_size: u32,
    /// Seconds trimmed from the head and the tail of the video
    pub trim_secs: f64,
    /// Uniform margin (pixels) cropped from every edge; disabled when unset
    #[serde(default)]
    pub crop_margin: Option<u32>,
    /// Color adjustment deltas applied during deduplication
    pub saturation: f64,
    pub brightness: f64,
    pub contrast: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_base: "https://api.openai.com/v1".to_string(),
                api_key: String::new(),
                model: "gpt-3.5-turbo".to_string(),
                timeout_secs: 240,
            },
            translate: TranslateConfig {
                max_line_attempts: 30,
                max_summary_attempts: 10,
                retry_delay_ms: 1000,
                history_window: 30,
                short_source_max: 10,
                commentary_max: 20,
                length_ratio: 0.75,
                exhaustion_policy: ExhaustionPolicy::Placeholder,
            },
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                probe_path: "ffprobe".to_string(),
                watermark_dir: "paster".to_string(),
                watermark_size: 100,
                trim_secs: 2.0,
                crop_margin: None,
                saturation: 1.05,
                brightness: 0.05,
                contrast: 1.05,
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DubError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| DubError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DubError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| DubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

impl LlmConfig {
    /// Resolve credentials, preferring the config file and falling back to
    /// the environment. The resolved value travels inside this object; the
    /// process environment is read exactly once.
    pub fn resolve_from_env(mut self) -> Self {
        if self.api_key.is_empty() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                self.api_key = key;
            }
        }
        if let Ok(base) = std::env::var("OPENAI_API_BASE") {
            self.api_base = base;
        }
        if let Ok(model) = std::env::var("MODEL_NAME") {
            self.model = model;
        }
        self
    }
}
