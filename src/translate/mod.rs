// Line translation with validation-driven retries
//
// Each transcript line moves PENDING -> ACCEPTED or PENDING -> EXHAUSTED.
// Results are keyed by line index so a failed line can never shift its
// neighbours' translations onto the wrong transcript entries.

pub mod prompt;
pub mod validate;

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

pub use prompt::{PromptBuilder, BASE_RETRY_INSTRUCTION};
pub use validate::{normalize, Validator, Verdict};

use crate::config::{ExhaustionPolicy, TranslateConfig};
use crate::error::{DubError, Result};
use crate::llm::ChatCompletion;
use crate::transcript::{Summary, TranscriptLine};

/// Result of one translation attempt. Retry policy is a pure function of
/// this value: only `Rejected` grows the feedback message, both `Rejected`
/// and `Transient` consume an attempt.
enum AttemptOutcome {
    Accepted(String),
    Rejected(String),
    Transient(DubError),
}

/// Translates transcript lines one by one, carrying a rolling window of
/// prior accepted translations as disambiguating context.
pub struct LineTranslator<'a> {
    client: &'a dyn ChatCompletion,
    config: &'a TranslateConfig,
    validator: Validator,
}

impl<'a> LineTranslator<'a> {
    pub fn new(client: &'a dyn ChatCompletion, config: &'a TranslateConfig) -> Self {
        Self {
            client,
            config,
            validator: Validator::new(config),
        }
    }

    /// Translate every line, returning accepted translations keyed by line
    /// index. Under `ExhaustionPolicy::Placeholder` an exhausted line maps
    /// to an empty string; under `Abort` the first exhausted line fails the
    /// whole loop.
    pub async fn translate_lines(
        &self,
        summary: &Summary,
        lines: &[TranscriptLine],
        target_language: &str,
    ) -> Result<BTreeMap<usize, String>> {
        let builder = PromptBuilder::new(summary, target_language);
        let mut results = BTreeMap::new();
        let mut history: Vec<String> = Vec::new();
        let total = lines.len();

        for (idx, line) in lines.iter().enumerate() {
            info!("Translating line {}/{}: {}", idx + 1, total, line.text);

            match self
                .translate_line(&builder, &history, &line.text)
                .await?
            {
                Some(translation) => {
                    info!("Accepted: {}", translation);
                    history.push(translation.clone());
                    if history.len() > self.config.history_window {
                        let overflow = history.len() - self.config.history_window;
                        history.drain(..overflow);
                    }
                    results.insert(idx, translation);
                }
                None => match self.config.exhaustion_policy {
                    ExhaustionPolicy::Placeholder => {
                        warn!(
                            "Line {} exhausted {} attempts, recording empty placeholder",
                            idx + 1,
                            self.config.max_line_attempts
                        );
                        results.insert(idx, String::new());
                    }
                    ExhaustionPolicy::Abort => {
                        return Err(DubError::Translation(format!(
                            "Line {} exhausted {} attempts: {}",
                            idx + 1,
                            self.config.max_line_attempts,
                            line.text
                        )));
                    }
                },
            }
        }

        Ok(results)
    }

    /// Run the bounded retry loop for one line. `Ok(None)` means the attempt
    /// budget ran out without an accepted translation.
    async fn translate_line(
        &self,
        builder: &PromptBuilder,
        history: &[String],
        text: &str,
    ) -> Result<Option<String>> {
        let mut retry_instruction = BASE_RETRY_INSTRUCTION.to_string();

        for attempt in 1..=self.config.max_line_attempts {
            let messages = builder.messages(history, &retry_instruction, text);

            match self.attempt(&messages, text).await {
                AttemptOutcome::Accepted(translation) => {
                    return Ok(Some(translation));
                }
                AttemptOutcome::Rejected(feedback) => {
                    warn!("Attempt {} rejected: {}", attempt, feedback);
                    retry_instruction.push(' ');
                    retry_instruction.push_str(&feedback);
                }
                AttemptOutcome::Transient(e) => {
                    warn!("Attempt {} failed: {}", attempt, e);
                }
            }

            tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
        }

        Ok(None)
    }

    async fn attempt(&self, messages: &[crate::llm::ChatMessage], text: &str) -> AttemptOutcome {
        match self.client.complete(messages).await {
            Ok(completion) => match self.validator.validate(text, completion.trim()) {
                Verdict::Accepted(translation) => AttemptOutcome::Accepted(translation),
                Verdict::Rejected(feedback) => AttemptOutcome::Rejected(feedback),
            },
            Err(e) => AttemptOutcome::Transient(e),
        }
    }
}
