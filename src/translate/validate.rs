use regex::Regex;
use std::sync::OnceLock;

use crate::config::TranslateConfig;

/// Outcome of checking one candidate translation against its source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The candidate passed every rule; carries the normalized text.
    Accepted(String),
    /// The candidate was refused; carries corrective feedback for the model.
    Rejected(String),
}

/// Marker substrings that indicate the model echoed instructions instead of
/// translating.
const FORBIDDEN_MARKERS: &[&str] = &["翻译", "这句", "\n"];

/// Literal substring substitutions applied to accepted translations.
/// Longer entries come before their prefixes so overlaps resolve correctly.
const GLOSSARY: &[(&str, &str)] = &[
    ("²", "的平方"),
    ("————", "："),
    ("——", "："),
    ("°", "度"),
    ("AI", "人工智能"),
    ("变压器", "Transformer"),
];

fn parenthetical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"（[^）]*）").expect("static pattern"))
}

/// Heuristic acceptance rules for candidate translations. The length
/// thresholds are tuned for an English-to-Chinese pair where the target
/// text is denser than the source; they are carried as configuration, not
/// as universal constants.
pub struct Validator {
    short_source_max: usize,
    commentary_max: usize,
    length_ratio: f64,
}

impl Validator {
    pub fn new(config: &TranslateConfig) -> Self {
        Self {
            short_source_max: config.short_source_max,
            commentary_max: config.commentary_max,
            length_ratio: config.length_ratio,
        }
    }

    /// Check a candidate against its source line. Rules, in order: forbidden
    /// markers, one layer of wrapping quotes stripped, length heuristics on
    /// the stripped text, then normalization on acceptance.
    pub fn validate(&self, text: &str, candidate: &str) -> Verdict {
        for marker in FORBIDDEN_MARKERS {
            if candidate.contains(marker) {
                let shown = if *marker == "\n" { "newlines" } else { marker };
                return Verdict::Rejected(format!(
                    "Don't include {} in the translation. \
                     Only translate the following sentence and give me the result.",
                    shown
                ));
            }
        }

        let candidate = strip_wrapping_quotes(candidate);

        let source_len = text.chars().count();
        let candidate_len = candidate.chars().count();

        if source_len <= self.short_source_max && candidate_len > self.commentary_max {
            return Verdict::Rejected(
                "Only translate the following sentence and give me the result.".to_string(),
            );
        } else if candidate_len as f64 > source_len as f64 * self.length_ratio {
            return Verdict::Rejected(
                "The translation is too long. \
                 Only translate the following sentence and give me the result."
                    .to_string(),
            );
        }

        Verdict::Accepted(normalize(candidate))
    }
}

/// Strip exactly one layer of matching wrapping quotation marks, either the
/// CJK curly pair or straight double quotes.
fn strip_wrapping_quotes(candidate: &str) -> &str {
    if let Some(inner) = candidate
        .strip_prefix('“')
        .and_then(|s| s.strip_suffix('”'))
    {
        return inner;
    }
    if let Some(inner) = candidate
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    {
        return inner;
    }
    candidate
}

/// Post-processing applied only to accepted translations: drop translator
/// asides, flatten ellipses, repair numerals and apply the fixed glossary.
/// Idempotent.
pub fn normalize(text: &str) -> String {
    let mut result = parenthetical_re().replace_all(text, "").into_owned();
    result = result.replace("...", "，");
    result = remove_digit_group_commas(&result);
    for (from, to) in GLOSSARY {
        result = result.replace(from, to);
    }
    result
}

/// Remove thousands-separator commas sitting between two digits, so numerals
/// split by model formatting come back intact.
fn remove_digit_group_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == ','
            && i > 0
            && i + 1 < chars.len()
            && chars[i - 1].is_ascii_digit()
            && chars[i + 1].is_ascii_digit()
        {
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn validator() -> Validator {
        Validator::new(&Config::default().translate)
    }

    #[test]
    fn test_forbidden_markers_always_reject() {
        let v = validator();
        for candidate in ["这是翻译结果", "这句话的意思是", "第一行\n第二行"] {
            match v.validate("A reasonably long source sentence here.", candidate) {
                Verdict::Rejected(feedback) => {
                    assert!(feedback.contains("Only translate the following sentence"));
                }
                Verdict::Accepted(t) => panic!("marker candidate accepted: {}", t),
            }
        }
    }

    #[test]
    fn test_quote_stripping_applies_before_length_checks() {
        let v = validator();
        // Unstripped the candidate is 6 chars and would fail the ratio rule
        // against this 6-char source (bound 4.5); stripped it is 4 chars
        // and passes.
        let text = "Hello?";
        match v.validate(text, "“你好吗？”") {
            Verdict::Accepted(t) => assert_eq!(t, "你好吗？"),
            Verdict::Rejected(f) => panic!("rejected: {}", f),
        }
        match v.validate(text, "\"你好吗？\"") {
            Verdict::Accepted(t) => assert_eq!(t, "你好吗？"),
            Verdict::Rejected(f) => panic!("rejected: {}", f),
        }
    }

    #[test]
    fn test_short_source_long_candidate_rejected_as_commentary() {
        let v = validator();
        let text = "Hello"; // 5 chars
        let candidate = "你好你好你好你好你好你好你好你好你好你好你好你好你"; // 25 chars
        match v.validate(text, candidate) {
            Verdict::Rejected(feedback) => {
                assert!(!feedback.contains("too long"));
            }
            Verdict::Accepted(t) => panic!("accepted: {}", t),
        }
    }

    #[test]
    fn test_length_ratio_rejects_dense_overrun() {
        let v = validator();
        let text = "Hello"; // 5 chars, ratio bound is 3.75
        let candidate = "你好你好你好你好你好你好你好你"; // 15 chars
        match v.validate(text, candidate) {
            Verdict::Rejected(feedback) => assert!(feedback.contains("too long")),
            Verdict::Accepted(t) => panic!("accepted: {}", t),
        }
    }

    #[test]
    fn test_ratio_passes_for_dense_target_text() {
        let v = validator();
        let text = "The quick brown fox jumps over the lazy dog."; // 44 chars
        match v.validate(text, "敏捷的棕色狐狸跳过懒狗。") {
            Verdict::Accepted(t) => assert_eq!(t, "敏捷的棕色狐狸跳过懒狗。"),
            Verdict::Rejected(f) => panic!("rejected: {}", f),
        }
    }

    #[test]
    fn test_normalize_strips_parenthetical_asides() {
        assert_eq!(normalize("结果是十（译者注：大约）个"), "结果是十个");
    }

    #[test]
    fn test_normalize_ellipsis_and_digit_commas() {
        assert_eq!(normalize("等等..."), "等等，");
        assert_eq!(normalize("共1,234,567个"), "共1234567个");
        // Commas not between digits survive
        assert_eq!(normalize("好的, 谢谢"), "好的, 谢谢");
    }

    #[test]
    fn test_normalize_glossary() {
        assert_eq!(normalize("x²等于9"), "x的平方等于9");
        assert_eq!(normalize("AI如下————结束"), "人工智能如下：结束");
        assert_eq!(normalize("温度是30°"), "温度是30度");
        assert_eq!(normalize("变压器模型"), "Transformer模型");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "结果是十（注）个...共1,000份 AI 30° x² 变压器————完",
            "已经规范化的普通句子。",
            "人工智能：Transformer的平方度，",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }
}
