//! Bigram (Dice coefficient) string similarity.
//!
//! Used by fuzzy commands to tolerate speech-to-text slips such as
//! "whoah" for "whoa". Whitespace is ignored and comparison is
//! case-insensitive.

use std::collections::HashMap;

/// Similarity of `first` and `second` in `0.0..=1.0`.
///
/// `2 * |shared bigrams| / (|first| + |second| - 2)` over the lower-cased,
/// whitespace-free character sequences. Each bigram of `first` can be
/// matched by `second` at most as many times as it occurs, so repeated
/// bigrams do not inflate the score.
///
/// Strings shorter than two characters have no bigrams and score 0.0 unless
/// they are identical.
pub fn similarity(first: &str, second: &str) -> f64 {
    let first = normalize(first);
    let second = normalize(second);

    if first.is_empty() && second.is_empty() {
        return 1.0;
    }
    if first.is_empty() || second.is_empty() {
        return 0.0;
    }
    if first == second {
        return 1.0;
    }
    if first.len() < 2 || second.len() < 2 {
        return 0.0;
    }

    let mut remaining: HashMap<(char, char), usize> = HashMap::new();
    for pair in first.windows(2) {
        *remaining.entry((pair[0], pair[1])).or_insert(0) += 1;
    }

    let mut shared = 0usize;
    for pair in second.windows(2) {
        if let Some(count) = remaining.get_mut(&(pair[0], pair[1]))
            && *count > 0
        {
            *count -= 1;
            shared += 1;
        }
    }

    (2.0 * shared as f64) / (first.len() + second.len() - 2) as f64
}

fn normalize(text: &str) -> Vec<char> {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
