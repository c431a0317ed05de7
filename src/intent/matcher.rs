//! Testing one compiled pattern against one input.

use crate::intent::pattern::{CompiledPattern, PatternSource};
use crate::intent::similarity::similarity;

/// A successful match of one pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchCandidate {
    /// Structural match. `parameters` holds the captures in pattern order;
    /// captures inside an optional group that did not participate are empty.
    Exact {
        source: PatternSource,
        parameters: Vec<String>,
    },
    /// Similarity match against the pattern's despecialized phrase.
    Fuzzy {
        source: PatternSource,
        phrase: String,
        similarity: f64,
    },
}

impl MatchCandidate {
    /// The pattern that matched.
    pub fn source(&self) -> &PatternSource {
        match self {
            Self::Exact { source, .. } | Self::Fuzzy { source, .. } => source,
        }
    }

    pub fn is_fuzzy(&self) -> bool {
        matches!(self, Self::Fuzzy { .. })
    }

    /// Ranking score used by fuzzy best-match selection. Exact matches
    /// rank 1.0.
    pub fn rank(&self) -> f64 {
        match self {
            Self::Exact { .. } => 1.0,
            Self::Fuzzy { similarity, .. } => *similarity,
        }
    }
}

/// Match `input` against `pattern`.
///
/// Returns `None` when the input does not fit; a miss is never an error.
pub fn try_match(pattern: &CompiledPattern, input: &str) -> Option<MatchCandidate> {
    match pattern {
        CompiledPattern::Exact { source, regex } => {
            let captures = regex.captures(input)?;
            let parameters = captures
                .iter()
                .skip(1)
                .map(|group| group.map(|m| m.as_str().to_owned()).unwrap_or_default())
                .collect();
            Some(MatchCandidate::Exact {
                source: source.clone(),
                parameters,
            })
        }
        CompiledPattern::Fuzzy {
            source,
            phrase,
            threshold,
        } => {
            let score = similarity(phrase, input);
            (score >= *threshold).then(|| MatchCandidate::Fuzzy {
                source: source.clone(),
                phrase: phrase.clone(),
                similarity: score,
            })
        }
    }
}
