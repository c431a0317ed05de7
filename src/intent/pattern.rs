//! Command pattern compilation.
//!
//! A command template is plain text with three kinds of tokens:
//!
//! | Token | Meaning | Compiles to |
//! |-------|---------|-------------|
//! | `*` | splat: shortest run of anything | `(.*?)` |
//! | `:name` | one word (no whitespace) | `([^\s]+)` |
//! | `(words)` | optional literal, absorbs surrounding spaces | `\s*(?:words)?\s*` |
//!
//! Everything else is matched literally. The result is anchored at both ends
//! and case-insensitive, so `*open the * tab*` matches
//! `"Please open the Containers tab now"` with captures
//! `["Please ", "Containers", " now"]`.
//!
//! Already-compiled regular expressions are accepted as
//! [`PatternSource::Precompiled`]; they are only made case-insensitive and
//! are not anchored.

use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::error::{IntentError, Result};
use crate::intent::cache;

/// Regex fragment for a splat token.
const SPLAT: &str = "(.*?)";

/// Regex fragment for a named parameter token.
const NAMED_PARAM: &str = r"([^\s]+)";

/// Characters removed from a pattern before fuzzy comparison.
const SPECIAL_CHARS: &[char] = &[
    '&', '/', '\\', '#', ',', '+', '(', ')', '!', '$', '~', '%', '.', '\'', '"', ':', '*', '?',
    '<', '>', '{', '}',
];

/// Where a command pattern comes from.
#[derive(Debug, Clone)]
pub enum PatternSource {
    /// A template using the splat / named parameter / optional grammar.
    Literal(String),
    /// A regular expression supplied as-is.
    Precompiled(Regex),
}

impl PatternSource {
    /// Process-wide cache key. Templates and regexes never share a key even
    /// when their text is identical.
    pub(crate) fn cache_key(&self) -> String {
        match self {
            Self::Literal(template) => format!("t:{template}"),
            Self::Precompiled(regex) => format!("r:{}", regex.as_str()),
        }
    }

    /// Text used as the basis of the fuzzy comparison phrase.
    fn fuzzy_text(&self) -> String {
        match self {
            Self::Literal(template) => template.clone(),
            Self::Precompiled(regex) => format!("/{}/", regex.as_str()),
        }
    }
}

impl PartialEq for PatternSource {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Precompiled(a), Self::Precompiled(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl fmt::Display for PatternSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(template) => f.write_str(template),
            Self::Precompiled(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

impl From<&str> for PatternSource {
    fn from(template: &str) -> Self {
        Self::Literal(template.to_owned())
    }
}

impl From<String> for PatternSource {
    fn from(template: String) -> Self {
        Self::Literal(template)
    }
}

impl From<Regex> for PatternSource {
    fn from(regex: Regex) -> Self {
        Self::Precompiled(regex)
    }
}

/// A pattern prepared for one matching mode.
#[derive(Debug, Clone)]
pub enum CompiledPattern {
    /// Structural match with positional captures.
    Exact { source: PatternSource, regex: Regex },
    /// Similarity match against the despecialized phrase.
    Fuzzy {
        source: PatternSource,
        phrase: String,
        threshold: f64,
    },
}

impl CompiledPattern {
    /// Compile `source` for exact matching, reusing the process-wide cache.
    ///
    /// # Errors
    ///
    /// Returns [`IntentError::MalformedPattern`] if the template is malformed.
    pub fn exact(source: PatternSource, cache_capacity: u64) -> Result<Self> {
        let regex = cache::compile_cached(&source, cache_capacity)?;
        Ok(Self::Exact { source, regex })
    }

    /// Prepare `source` for fuzzy matching at `threshold`.
    pub fn fuzzy(source: PatternSource, threshold: f64) -> Self {
        let phrase = despecialize(&source.fuzzy_text());
        Self::Fuzzy {
            source,
            phrase,
            threshold,
        }
    }

    /// The pattern this was compiled from.
    pub fn source(&self) -> &PatternSource {
        match self {
            Self::Exact { source, .. } | Self::Fuzzy { source, .. } => source,
        }
    }
}

/// Compile a pattern source into a case-insensitive regex.
///
/// # Errors
///
/// Returns [`IntentError::MalformedPattern`] for unbalanced, nested or empty
/// optional groups, or if the resulting expression is rejected by the regex
/// engine.
pub fn compile(source: &PatternSource) -> Result<Regex> {
    let expression = match source {
        PatternSource::Literal(template) => format!("^{}$", template_to_regex(template)?),
        PatternSource::Precompiled(regex) => regex.as_str().to_owned(),
    };
    RegexBuilder::new(&expression)
        .case_insensitive(true)
        .build()
        .map_err(|e| IntentError::MalformedPattern {
            pattern: source.to_string(),
            reason: e.to_string(),
        })
}

/// Translate a command template into an (unanchored) regex body.
///
/// # Errors
///
/// Returns [`IntentError::MalformedPattern`] if parentheses are unbalanced,
/// nested, or enclose nothing.
pub fn template_to_regex(template: &str) -> Result<String> {
    let segments = split_segments(template)?;
    let mut out = String::with_capacity(template.len() * 2);

    for (i, segment) in segments.iter().enumerate() {
        match *segment {
            Segment::Text(text) => {
                let after_optional = i > 0 && matches!(segments[i - 1], Segment::Optional(_));
                let before_optional =
                    matches!(segments.get(i + 1), Some(Segment::Optional(_)));
                let mut text = text;
                if after_optional {
                    text = text.trim_start();
                }
                if before_optional {
                    text = text.trim_end();
                }
                translate_tokens(text, &mut out);
            }
            Segment::Optional(inner) => {
                let mut body = String::new();
                let captures = translate_tokens(inner, &mut body);
                if captures {
                    out.push_str(&format!("(?:{body})?"));
                } else {
                    out.push_str(&format!(r"\s*(?:{body})?\s*"));
                }
            }
        }
    }

    Ok(out)
}

/// Strip structural characters, collapse runs of spaces and trim.
///
/// `"*how are you*"` becomes `"how are you"`.
pub fn despecialize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_space = false;
    for c in text.chars().filter(|c| !SPECIAL_CHARS.contains(c)) {
        if c == ' ' {
            if previous_space {
                continue;
            }
            previous_space = true;
        } else {
            previous_space = false;
        }
        out.push(c);
    }
    out.trim().to_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Optional(&'a str),
}

fn split_segments(template: &str) -> Result<Vec<Segment<'_>>> {
    let malformed = |reason: &str| IntentError::MalformedPattern {
        pattern: template.to_owned(),
        reason: reason.to_owned(),
    };

    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut open: Option<usize> = None;

    for (i, c) in template.char_indices() {
        match (c, open) {
            ('(', None) => {
                if i > text_start {
                    segments.push(Segment::Text(&template[text_start..i]));
                }
                open = Some(i);
            }
            ('(', Some(_)) => return Err(malformed("nested optional group")),
            (')', Some(start)) => {
                let inner = &template[start + 1..i];
                if inner.is_empty() {
                    return Err(malformed("empty optional group"));
                }
                segments.push(Segment::Optional(inner));
                open = None;
                text_start = i + 1;
            }
            (')', None) => return Err(malformed("unmatched ')'")),
            _ => {}
        }
    }

    if open.is_some() {
        return Err(malformed("unclosed optional group"));
    }
    if text_start < template.len() {
        segments.push(Segment::Text(&template[text_start..]));
    }
    Ok(segments)
}

/// Append the regex for `text` to `out`. Returns whether a capture was emitted.
fn translate_tokens(text: &str, out: &mut String) -> bool {
    let mut literal = String::new();
    let mut captured = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                flush_literal(&mut literal, out);
                out.push_str(SPLAT);
                captured = true;
            }
            ':' if chars.peek().is_some_and(|next| is_word_char(*next)) => {
                while chars.next_if(|next| is_word_char(*next)).is_some() {}
                flush_literal(&mut literal, out);
                out.push_str(NAMED_PARAM);
                captured = true;
            }
            _ => literal.push(c),
        }
    }
    flush_literal(&mut literal, out);
    captured
}

fn flush_literal(literal: &mut String, out: &mut String) {
    if !literal.is_empty() {
        out.push_str(&regex::escape(literal));
        literal.clear();
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
