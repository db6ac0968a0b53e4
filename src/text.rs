//! Text utilities used by the message processor. Nothing in here touches
//! the network, so every rule can be checked in isolation.

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::{Extraction, ProcessorConfig};

/// Characters an English fragment may contain: ASCII letters and digits,
/// common punctuation and any whitespace.
const FRAGMENT_CLASS: &str = r#"[A-Za-z0-9#@$%^&*\-_+=\[\]().,"'/\\:;?!\s]"#;

/// How the body to classify and translate is cut out of the message text.
#[derive(Debug, Clone)]
pub enum BodyExtractor {
    FullText,
    /// First capture group of the pattern, trimmed. No match yields "".
    Paragraph(Regex),
}

impl BodyExtractor {
    pub fn from_config(config: &ProcessorConfig) -> Result<Self> {
        match config.extraction {
            Extraction::FullText => Ok(Self::FullText),
            Extraction::Paragraph => {
                let regex = Regex::new(&config.paragraph_pattern).with_context(|| {
                    format!("Invalid paragraph_pattern: {}", config.paragraph_pattern)
                })?;
                if regex.captures_len() < 2 {
                    anyhow::bail!("paragraph_pattern needs a capture group for the body");
                }
                Ok(Self::Paragraph(regex))
            }
        }
    }

    /// Returns the trimmed body, or an empty string when nothing was found.
    pub fn extract<'a>(&self, text: &'a str) -> &'a str {
        match self {
            Self::FullText => text.trim(),
            Self::Paragraph(regex) => regex
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim())
                .unwrap_or(""),
        }
    }
}

/// Finds maximal runs of English-looking text.
#[derive(Debug, Clone)]
pub struct FragmentMatcher {
    regex: Regex,
}

impl FragmentMatcher {
    pub fn new(min_len: usize) -> Result<Self> {
        let pattern = format!("{}{{{},}}", FRAGMENT_CLASS, min_len.max(1));
        let regex = Regex::new(&pattern).context("Failed to build fragment pattern")?;
        Ok(Self { regex })
    }

    /// All maximal fragments in order of appearance, skipping runs that are
    /// only digits, punctuation or whitespace.
    pub fn fragments<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.regex
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|fragment| has_ascii_letters(fragment))
            .collect()
    }
}

pub fn has_ascii_letters(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_alphabetic())
}

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}')
}

/// Number of CJK unified ideographs in `text`.
pub fn cjk_count(text: &str) -> usize {
    text.chars().filter(|&c| is_cjk(c)).count()
}

/// Replace the first occurrence of `from` in `working` with `to`.
/// Returns false if `from` no longer occurs.
pub fn substitute_first(working: &mut String, from: &str, to: &str) -> bool {
    match working.find(from) {
        Some(start) => {
            working.replace_range(start..start + from.len(), to);
            true
        }
        None => false,
    }
}
