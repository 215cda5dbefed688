//! Dubflow - Automated Video Localization Workflow
//!
//! Entry point wiring configuration, logging and the chat client together,
//! then dispatching to the translation workflow or the media transformer.

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dubflow::cli::{Args, Commands};
use dubflow::config::Config;
use dubflow::error::DubError;
use dubflow::llm::ChatClient;
use dubflow::media::Deduplicator;
use dubflow::transcript::VideoInfo;
use dubflow::workflow::{Workflow, INFO_FILE};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };
    config.llm = config.llm.clone().resolve_from_env();

    match args.command {
        Commands::Translate { folder, language } => {
            info!("Translating folder: {}", folder.display());
            let client = ChatClient::new(config.llm.clone())?;
            info!("Using model {}", client.model());
            let workflow = Workflow::new(config, Box::new(client));
            let status = workflow.translate_folder(&folder, &language).await?;
            info!("Job finished with status {:?}", status);
        }
        Commands::Batch { root, language } => {
            info!("Translating all pending folders under: {}", root.display());
            let client = ChatClient::new(config.llm.clone())?;
            let workflow = Workflow::new(config, Box::new(client));
            let translated = workflow.translate_all_under(&root, &language).await?;
            info!("Batch finished, {} video(s) translated", translated);
        }
        Commands::Dedup { folder } => {
            info!("Deduplicating video in: {}", folder.display());
            let deduplicator = Deduplicator::new(&config.media);
            deduplicator.check_availability()?;

            let info_path = folder.join(INFO_FILE);
            if !info_path.exists() {
                return Err(DubError::FileNotFound(info_path.display().to_string()).into());
            }
            let info: VideoInfo = serde_json::from_str(&std::fs::read_to_string(&info_path)?)?;
            let output = deduplicator.dedup_folder(&folder, &info)?;
            info!("Deduplicated video: {}", output.display());
        }
    }

    info!("Dubflow run completed successfully");
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".dubflow").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Daily rotation; the guard must outlive the run
    let file_appender = rolling::daily(&log_dir, "dubflow.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
