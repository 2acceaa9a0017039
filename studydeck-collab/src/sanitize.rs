//! Content sanitization
//!
//! Term content passes through here before it is stored back or
//! published: plain text is truncated and censored, rich-text documents
//! are censored leaf-by-leaf with their structure left intact.
//!
//! The profanity matching itself sits behind the [`Censor`] trait; the
//! default implementation is a word-list regex. Callers that need a
//! different algorithm inject their own.

use once_cell::sync::Lazy;
use regex::Regex;
use studydeck_common::db::models::Term;
use studydeck_common::{Error, Result, RichNode};

use crate::store::terms::TermContent;

/// Maximum stored length of a term's word or definition, in characters.
/// Shared by the merge path and the plain bulk-edit path.
pub const MAX_TERM_LEN: usize = 1000;

/// Profanity censor seam.
///
/// Implementations replace profane substrings and leave everything else
/// untouched. Must be pure: same input, same output, no side effects.
pub trait Censor: Send + Sync {
    fn censor(&self, text: &str) -> String;
}

static DEFAULT_WORDS: &[&str] = &[
    "ass", "asshole", "bastard", "bitch", "crap", "cunt", "damn", "dick", "fuck", "piss",
    "shit", "slut", "whore",
];

static DEFAULT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let alternation = DEFAULT_WORDS
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).expect("valid profanity regex")
});

/// Word-list censor. Matches whole words case-insensitively and replaces
/// each with asterisks of the same length.
#[derive(Debug, Clone)]
pub struct WordListCensor {
    pattern: Regex,
}

impl WordListCensor {
    pub fn new(words: &[&str]) -> Result<Self> {
        let alternation = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
            .map_err(|e| Error::Config(format!("invalid censor word list: {}", e)))?;
        Ok(Self { pattern })
    }
}

impl Default for WordListCensor {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.clone(),
        }
    }
}

impl Censor for WordListCensor {
    fn censor(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, |caps: &regex::Captures<'_>| {
                "*".repeat(caps[0].chars().count())
            })
            .into_owned()
    }
}

/// Truncate to at most `max` characters, on a char boundary
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Censor a stored rich-text document.
///
/// Only text leaves change; marks, attrs and unknown fields pass through
/// byte-for-byte. A document that does not parse is a data-integrity
/// fault: the censor contract cannot be honored on it.
pub fn censor_rich_text(censor: &dyn Censor, raw: &str) -> Result<String> {
    let doc = RichNode::from_json(raw)
        .map_err(|e| Error::Internal(format!("malformed rich-text document: {}", e)))?;
    let censored = doc.map_text(&|text| censor.censor(text));
    censored
        .to_json()
        .map_err(|e| Error::Internal(format!("failed to serialize rich-text document: {}", e)))
}

/// Produce the sanitized content for one term row: truncated, censored
/// plain text plus censored rich-text variants when present.
pub fn sanitize_term(censor: &dyn Censor, term: &Term) -> Result<TermContent> {
    let word = censor.censor(truncate_chars(&term.word, MAX_TERM_LEN));
    let definition = censor.censor(truncate_chars(&term.definition, MAX_TERM_LEN));

    let word_rich_text = term
        .word_rich_text
        .as_deref()
        .map(|raw| censor_rich_text(censor, raw))
        .transpose()?;
    let definition_rich_text = term
        .definition_rich_text
        .as_deref()
        .map(|raw| censor_rich_text(censor, raw))
        .transpose()?;

    Ok(TermContent {
        guid: term.guid.clone(),
        word,
        definition,
        word_rich_text,
        definition_rich_text,
    })
}
