use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::TranslateConfig;
use crate::error::{DubError, Result};
use crate::llm::{ChatCompletion, ChatMessage};
use crate::transcript::{Summary, TranscriptLine, VideoInfo};

/// Title/summary pair as returned by the model, before the bilingual
/// result is assembled.
#[derive(Debug, Deserialize)]
struct DraftSummary {
    title: String,
    summary: String,
}

fn json_object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{.*?\}").expect("static pattern"))
}

/// Produces the bilingual title/summary for a video via two sequential chat
/// exchanges: summarize, then translate the summary. Any failure in either
/// exchange restarts the pair; this is a transient-only retry with no
/// feedback accumulation.
pub struct Summarizer<'a> {
    client: &'a dyn ChatCompletion,
    config: &'a TranslateConfig,
}

impl<'a> Summarizer<'a> {
    pub fn new(client: &'a dyn ChatCompletion, config: &'a TranslateConfig) -> Self {
        Self { client, config }
    }

    pub async fn summarize(
        &self,
        info: &VideoInfo,
        transcript: &[TranscriptLine],
        target_language: &str,
    ) -> Result<Summary> {
        for attempt in 1..=self.config.max_summary_attempts {
            match self.summarize_once(info, transcript, target_language).await {
                Ok(summary) => return Ok(summary),
                Err(e) => {
                    warn!("Summarization attempt {} failed: {}", attempt, e);
                    tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                }
            }
        }

        Err(DubError::Summary(format!(
            "Failed to summarize \"{}\" after {} attempts",
            info.title, self.config.max_summary_attempts
        )))
    }

    async fn summarize_once(
        &self,
        info: &VideoInfo,
        transcript: &[TranscriptLine],
        target_language: &str,
    ) -> Result<Summary> {
        let joined = transcript
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let info_message = format!(
            "This is a video called \"{}\" by {}. It was uploaded on {}.",
            info.title, info.uploader, info.upload_date
        );
        let full_description = format!(
            "The following is the full content of the video:\n{}\n{}\nIn Json format:\n\
             ```json\n{{\"title\": \"the title of the video\", \"summary\": \"the summary of the video\"}}\n```\n\
             Summarize the video in JSON format: ",
            joined, info_message
        );

        let messages = vec![
            ChatMessage::system(
                "You are an expert in the field of this video. Please summarize the video in JSON format.",
            ),
            ChatMessage::user(full_description),
        ];
        let response = self.client.complete(&messages).await?;
        let draft: DraftSummary = parse_json_object(&response)?;
        info!("Draft summary: {}", draft.title);

        let messages = vec![
            ChatMessage::system(format!(
                "You are a native speaker of {}. Please translate the title and summary into {} in JSON format.",
                target_language, target_language
            )),
            ChatMessage::user(format!(
                "The title of the video is \"{}\". The summary of the video is \"{}\". \
                 Please translate the title and summary into {} in JSON format. \
                 ```json\n{{\"title\": \"the {} title of the video\", \"summary\": \"the {} summary of the video\"}}\n```. \
                 Remember to translate both the title and the summary into {} in JSON.",
                draft.title, draft.summary, target_language, target_language, target_language, target_language
            )),
        ];
        let response = self.client.complete(&messages).await?;
        let translated: DraftSummary = parse_json_object(&response)?;

        Ok(Summary {
            title: translated.title,
            author: info.uploader.clone(),
            summary: translated.summary,
            language: target_language.to_string(),
        })
    }
}

/// Extract the first brace-delimited object from raw model text and decode
/// it. Tolerates the model wrapping JSON in prose or code fences; newlines
/// are flattened first so the object can span lines.
fn parse_json_object<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    let flat = raw.replace('\n', "");
    let object = json_object_re()
        .find(&flat)
        .ok_or_else(|| DubError::Summary(format!("No JSON object in response: {}", raw.trim())))?;
    serde_json::from_str(object.as_str())
        .map_err(|e| DubError::Summary(format!("Malformed JSON object: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn video_info() -> VideoInfo {
        serde_json::from_str(
            r#"{"title": "Why Rust?", "uploader": "ferris", "upload_date": "20240101"}"#,
        )
        .unwrap()
    }

    fn transcript() -> Vec<TranscriptLine> {
        vec![
            TranscriptLine::new("Hello."),
            TranscriptLine::new("This is a test."),
        ]
    }

    fn fast_config() -> TranslateConfig {
        let mut config = Config::default().translate;
        config.retry_delay_ms = 0;
        config
    }

    #[test]
    fn test_parse_json_object_from_fenced_response() {
        let raw = "Sure! Here is the summary:\n```json\n{\"title\": \"Why Rust?\", \"summary\": \"A talk.\"}\n```";
        let draft: DraftSummary = parse_json_object(raw).unwrap();
        assert_eq!(draft.title, "Why Rust?");
        assert_eq!(draft.summary, "A talk.");
    }

    #[test]
    fn test_parse_json_object_rejects_braceless_prose() {
        let err = parse_json_object::<DraftSummary>("I cannot summarize this video.").unwrap_err();
        assert!(matches!(err, DubError::Summary(_)));
    }

    /// Answers the summarize exchange, then the translate exchange.
    struct TwoStepClient {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl ChatCompletion for TwoStepClient {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if messages[0].content.contains("summarize the video") {
                Ok("{\"title\": \"Why Rust?\", \"summary\": \"A talk about Rust.\"}".to_string())
            } else {
                Ok("Here you go: {\"title\": \"为什么选Rust？\", \"summary\": \"一场关于Rust的演讲。\"}"
                    .to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_two_exchange_summary() {
        let client = TwoStepClient {
            calls: Mutex::new(0),
        };
        let config = fast_config();
        let summarizer = Summarizer::new(&client, &config);

        let summary = summarizer
            .summarize(&video_info(), &transcript(), "简体中文")
            .await
            .unwrap();

        assert_eq!(*client.calls.lock().unwrap(), 2);
        assert_eq!(summary.title, "为什么选Rust？");
        assert_eq!(summary.author, "ferris");
        assert_eq!(summary.language, "简体中文");
    }

    /// Returns garbage until the given call number, then behaves.
    struct EventuallyValidClient {
        calls: Mutex<u32>,
        valid_from: u32,
    }

    #[async_trait]
    impl ChatCompletion for EventuallyValidClient {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls < self.valid_from {
                return Ok("no json here".to_string());
            }
            if messages[0].content.contains("summarize the video") {
                Ok("{\"title\": \"t\", \"summary\": \"s\"}".to_string())
            } else {
                Ok("{\"title\": \"标题\", \"summary\": \"摘要\"}".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_whole_exchange_pair_retries_on_parse_failure() {
        let client = EventuallyValidClient {
            calls: Mutex::new(0),
            valid_from: 3,
        };
        let config = fast_config();
        let summarizer = Summarizer::new(&client, &config);

        let summary = summarizer
            .summarize(&video_info(), &transcript(), "简体中文")
            .await
            .unwrap();
        assert_eq!(summary.title, "标题");
        // Two wasted rounds of one call each, then a full two-call round.
        assert_eq!(*client.calls.lock().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_exhaustion_after_bounded_rounds() {
        let client = EventuallyValidClient {
            calls: Mutex::new(0),
            valid_from: u32::MAX,
        };
        let config = fast_config();
        let summarizer = Summarizer::new(&client, &config);

        let err = summarizer
            .summarize(&video_info(), &transcript(), "简体中文")
            .await
            .unwrap_err();
        assert!(matches!(err, DubError::Summary(_)));
        assert_eq!(*client.calls.lock().unwrap(), 10);
    }
}
