//! Dubflow - Automated Video Localization Workflow
//!
//! Batch tooling for a video-localization pipeline: LLM-backed transcript
//! translation with retry-and-validate loops, and ffmpeg-based cosmetic
//! deduplication of downloaded videos.

pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod media;
pub mod summarize;
pub mod transcript;
pub mod translate;
pub mod workflow;
