use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate the transcript in a single video folder
    Translate {
        /// Folder holding download.info.json and transcript.json
        #[arg(short, long)]
        folder: PathBuf,

        /// Target language as a display name
        #[arg(short, long, default_value = "简体中文")]
        language: String,
    },

    /// Translate every pending video folder under a root directory
    Batch {
        /// Root directory to walk
        #[arg(short, long)]
        root: PathBuf,

        /// Target language as a display name
        #[arg(short, long, default_value = "简体中文")]
        language: String,
    },

    /// Produce the deduplicated variant of a downloaded video
    Dedup {
        /// Folder holding download.mp4 and download.info.json
        #[arg(short, long)]
        folder: PathBuf,
    },
}
