use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Valid characters looked at before an early decision is attempted.
const SAMPLE_SIZE: usize = 15;
/// CJK characters within the sample that settle the text as Chinese.
const ZH_EARLY_THRESHOLD: usize = 5;
/// Share of CJK characters above which a short or mixed text counts as Chinese.
const ZH_RATIO_THRESHOLD: f64 = 0.3;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(5))")]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[sea_orm(string_value = "en")]
    En,
    #[sea_orm(string_value = "zh")]
    Zh,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF
        | 0x3400..=0x4DBF
        | 0x20000..=0x2A6DF)
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(c as u32,
            // General Punctuation
            0x2000..=0x206F
            // CJK Symbols and Punctuation
            | 0x3000..=0x303F
            // full-width ASCII punctuation
            | 0xFF01..=0xFF0F
            | 0xFF1A..=0xFF20
            | 0xFF3B..=0xFF40
            | 0xFF5B..=0xFF65
            // Latin-1 punctuation
            | 0x00A1..=0x00BF)
}

/// Classify text as Chinese or English.
///
/// Whitespace and punctuation are ignored. Once 15 valid characters have
/// been seen the result is decided early: 5 or more CJK ideographs means
/// Chinese, none means English, anything in between keeps scanning. Text that
/// never settles falls back to the share of CJK characters (> 30% is Chinese).
/// Text without a single valid character is English.
pub fn detect_language(text: &str) -> Language {
    let mut valid = 0usize;
    let mut zh = 0usize;

    for c in text.chars() {
        if c.is_whitespace() || is_punctuation(c) {
            continue;
        }

        valid += 1;
        if is_cjk(c) {
            zh += 1;
        }

        if valid >= SAMPLE_SIZE {
            if zh >= ZH_EARLY_THRESHOLD {
                return Language::Zh;
            }
            if zh == 0 {
                return Language::En;
            }
        }
    }

    if valid == 0 {
        return Language::En;
    }

    if zh as f64 / valid as f64 > ZH_RATIO_THRESHOLD {
        Language::Zh
    } else {
        Language::En
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_english() {
        assert_eq!(detect_language(""), Language::En);
        assert_eq!(detect_language("   \n\t"), Language::En);
    }

    #[test]
    fn punctuation_only_is_english() {
        assert_eq!(detect_language("，。！？…“”"), Language::En);
        assert_eq!(detect_language("...!!!???"), Language::En);
    }

    #[test]
    fn pure_chinese() {
        assert_eq!(detect_language("你好世界你好世界你好世界你好"), Language::Zh);
        assert_eq!(detect_language("床前明月光，疑是地上霜。"), Language::Zh);
    }

    #[test]
    fn pure_english() {
        assert_eq!(
            detect_language("Hello world this is plain English text"),
            Language::En
        );
    }

    #[test]
    fn short_mixed_text_uses_ratio() {
        // 4 valid characters, 2 of them CJK
        assert_eq!(detect_language("Hi 你好"), Language::Zh);
        // 11 valid characters, 1 CJK
        assert_eq!(detect_language("Hello world 我"), Language::En);
    }

    #[test]
    fn english_prefix_settles_before_chinese_appears() {
        let text = format!("{}{}", "abcdefghijklmno", "你".repeat(50));
        assert_eq!(detect_language(&text), Language::En);
    }

    #[test]
    fn mixed_sample_keeps_scanning_until_threshold() {
        // 14 Latin + 1 CJK is ambiguous at 15; four more CJK settle it.
        let text = "abcdefghijklmn你好好好好";
        assert_eq!(detect_language(text), Language::Zh);
    }

    #[test]
    fn long_mostly_english_with_few_cjk_is_english() {
        let text = format!("{} 诗 {}", "word ".repeat(20), "more ".repeat(20));
        assert_eq!(detect_language(&text), Language::En);
    }

    #[test]
    fn extension_b_ideographs_count() {
        let text = "\u{20000}\u{20001}\u{20002}";
        assert_eq!(detect_language(text), Language::Zh);
    }

    #[test]
    fn language_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Language::Zh).unwrap(), "\"zh\"");
        let parsed: Language = serde_json::from_str("\"en\"").unwrap();
        assert_eq!(parsed, Language::En);
    }
}
