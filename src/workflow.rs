use std::path::Path;
use tokio::fs;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{DubError, Result};
use crate::llm::ChatCompletion;
use crate::summarize::Summarizer;
use crate::transcript::{TranscriptLine, VideoInfo};
use crate::translate::LineTranslator;

pub const INFO_FILE: &str = "download.info.json";
pub const TRANSCRIPT_FILE: &str = "transcript.json";
pub const SUMMARY_FILE: &str = "summary.json";
pub const TRANSLATION_FILE: &str = "translation.json";

/// How a single per-video job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// summary.json and translation.json were written
    Translated,
    /// translation.json already existed, nothing was done
    AlreadyTranslated,
    /// download.info.json was absent, folder skipped non-fatally
    MissingInfo,
}

/// Drives the per-video translation job and the bulk directory walk. The
/// chat client is constructed once at process start and passed in; no
/// component reaches for ambient API state.
pub struct Workflow {
    config: Config,
    client: Box<dyn ChatCompletion>,
}

impl Workflow {
    pub fn new(config: Config, client: Box<dyn ChatCompletion>) -> Self {
        Self { config, client }
    }

    /// Run the whole translation job for one video folder: summarize, then
    /// translate every transcript line. Presence of translation.json is the
    /// idempotency marker for the whole job.
    pub async fn translate_folder(&self, folder: &Path, target_language: &str) -> Result<JobStatus> {
        let translation_path = folder.join(TRANSLATION_FILE);
        if translation_path.exists() {
            info!("Translation already exists in {}", folder.display());
            return Ok(JobStatus::AlreadyTranslated);
        }

        let info_path = folder.join(INFO_FILE);
        if !info_path.exists() {
            info!("No {} in {}, skipping", INFO_FILE, folder.display());
            return Ok(JobStatus::MissingInfo);
        }
        let info: VideoInfo = serde_json::from_str(&fs::read_to_string(&info_path).await?)?;

        let transcript_path = folder.join(TRANSCRIPT_FILE);
        if !transcript_path.exists() {
            return Err(DubError::FileNotFound(transcript_path.display().to_string()));
        }
        let mut transcript: Vec<TranscriptLine> =
            serde_json::from_str(&fs::read_to_string(&transcript_path).await?)?;

        let summarizer = Summarizer::new(self.client.as_ref(), &self.config.translate);
        let summary = summarizer
            .summarize(&info, &transcript, target_language)
            .await?;
        write_json_atomic(folder, &folder.join(SUMMARY_FILE), &summary)?;
        info!("Summary written for {}", folder.display());

        let translator = LineTranslator::new(self.client.as_ref(), &self.config.translate);
        let results = translator
            .translate_lines(&summary, &transcript, target_language)
            .await?;

        for (idx, line) in transcript.iter_mut().enumerate() {
            line.translation = results.get(&idx).cloned();
        }
        write_json_atomic(folder, &translation_path, &transcript)?;
        info!("Translation written for {}", folder.display());

        Ok(JobStatus::Translated)
    }

    /// Visit every subdirectory under `root` and run the translation job
    /// wherever a transcript exists without a translation. Failures are
    /// scoped to their folder; the walk always finishes.
    pub async fn translate_all_under(&self, root: &Path, target_language: &str) -> Result<usize> {
        let mut translated = 0;

        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_dir() {
                continue;
            }
            let folder = entry.path();
            if !folder.join(TRANSCRIPT_FILE).exists() || folder.join(TRANSLATION_FILE).exists() {
                continue;
            }

            match self.translate_folder(folder, target_language).await {
                Ok(JobStatus::Translated) => {
                    translated += 1;
                    info!("Translated {}", folder.display());
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to translate {}: {}", folder.display(), e),
            }
        }

        info!(
            "Translated {} video(s) under {}",
            translated,
            root.display()
        );
        Ok(translated)
    }
}

/// Write JSON next to its destination and atomically rename it into place.
/// Narrows the window in which a concurrent run could observe a half-written
/// output file; concurrent runs over the same folder remain unsupported.
fn write_json_atomic<T: serde::Serialize>(folder: &Path, path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    let tmp = tempfile::NamedTempFile::new_in(folder)?;
    std::fs::write(tmp.path(), content)?;
    tmp.persist(path)
        .map_err(|e| DubError::Io(e.error))?;
    Ok(())
}
