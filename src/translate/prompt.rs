use crate::llm::ChatMessage;
use crate::transcript::Summary;

/// Opening instruction carried on every attempt; validation feedback is
/// appended to it as attempts accumulate.
pub const BASE_RETRY_INSTRUCTION: &str =
    "Only translate the following sentence and give me the final translation.";

/// Builds line-translation prompts from named slots: the fixed system
/// context (video summary plus target language), the rolling history of
/// accepted translations, the accumulated retry instruction and the quoted
/// source sentence.
pub struct PromptBuilder {
    fixed: Vec<ChatMessage>,
    target_language: String,
}

impl PromptBuilder {
    pub fn new(summary: &Summary, target_language: &str) -> Self {
        let info = format!(
            "This is a video called \"{}\". {}.",
            summary.title, summary.summary
        );
        let fixed = vec![
            ChatMessage::system(format!(
                "You are an expert in the field of this video.\n{}\nPlease translate the sentence into {}.",
                info, target_language
            )),
            // Priming exchange pinning the target language for the session.
            ChatMessage::user("What language do you need to translate the title into?"),
            ChatMessage::assistant(target_language),
        ];
        Self {
            fixed,
            target_language: target_language.to_string(),
        }
    }

    /// Assemble the message list for one translation attempt.
    pub fn messages(
        &self,
        history: &[String],
        retry_instruction: &str,
        text: &str,
    ) -> Vec<ChatMessage> {
        let request = format!(
            "Please translate the single following sentence into {}: \"{}\"",
            self.target_language, text
        );
        let content = [history.concat(), retry_instruction.to_string(), request].join("\n");

        let mut messages = self.fixed.clone();
        messages.push(ChatMessage::user(content));
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> Summary {
        Summary {
            title: "Rust in Production".to_string(),
            author: "someone".to_string(),
            summary: "A talk about building reliable systems".to_string(),
            language: "简体中文".to_string(),
        }
    }

    #[test]
    fn test_fixed_context_carries_summary_and_language() {
        let builder = PromptBuilder::new(&summary(), "简体中文");
        let messages = builder.messages(&[], BASE_RETRY_INSTRUCTION, "Hello.");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("Rust in Production"));
        assert!(messages[0].content.contains("简体中文"));
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[2].content, "简体中文");
    }

    #[test]
    fn test_final_message_joins_all_slots() {
        let builder = PromptBuilder::new(&summary(), "简体中文");
        let history = vec!["第一句。".to_string(), "第二句。".to_string()];
        let feedback = format!("{} The translation is too long.", BASE_RETRY_INSTRUCTION);
        let messages = builder.messages(&history, &feedback, "Third sentence.");

        let last = &messages.last().unwrap().content;
        assert!(last.starts_with("第一句。第二句。\n"));
        assert!(last.contains("The translation is too long."));
        assert!(last.ends_with("Please translate the single following sentence into 简体中文: \"Third sentence.\""));
    }
}
