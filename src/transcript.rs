use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One timed unit of spoken text. Unknown fields (timestamps, speaker tags)
/// are carried through untouched so the translated output stays a superset
/// of the input transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TranscriptLine {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            translation: None,
            extra: Map::new(),
        }
    }
}

/// Bilingual title/summary produced once per video, immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub title: String,
    pub author: String,
    pub summary: String,
    pub language: String,
}

/// Subset of download.info.json the pipeline consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    pub uploader: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub upload_date: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub formats: Vec<FormatInfo>,
}

/// One downloadable format entry as reported by the downloader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatInfo {
    #[serde(default)]
    pub vbr: Option<f64>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub resolution: Option<String>,
}
