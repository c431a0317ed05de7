//! Process-wide cache of compiled command patterns.
//!
//! Compilation is a pure function of the pattern source, so every registry
//! in the process can share one cache keyed by the source text. Uses
//! [`moka`] for concurrent lookups with bounded size.

use std::sync::OnceLock;

use moka::sync::Cache;
use regex::Regex;
use tracing::trace;

use crate::error::Result;
use crate::intent::pattern::{self, PatternSource};

/// Default maximum number of cached compiled patterns.
pub const DEFAULT_CACHE_CAPACITY: u64 = 512;

/// Global process-wide pattern cache.
///
/// Lazily initialised on first access. Capacity is set when first created
/// and cannot be changed after initialisation.
static CACHE: OnceLock<Cache<String, Regex>> = OnceLock::new();

fn get_or_init_cache(capacity: u64) -> &'static Cache<String, Regex> {
    CACHE.get_or_init(|| Cache::builder().max_capacity(capacity).build())
}

/// Compile `source`, reusing a previously compiled regex when available.
///
/// `capacity` is only honoured by the **first** call in the process.
///
/// # Errors
///
/// Propagates [`pattern::compile`] errors; failures are never cached.
pub fn compile_cached(source: &PatternSource, capacity: u64) -> Result<Regex> {
    let cache = get_or_init_cache(capacity);
    let key = source.cache_key();
    if let Some(regex) = cache.get(&key) {
        trace!(pattern = %source, "pattern cache hit");
        return Ok(regex);
    }
    let regex = pattern::compile(source)?;
    cache.insert(key, regex.clone());
    Ok(regex)
}

/// Whether `source` has a compiled entry in the cache.
#[cfg(test)]
pub(crate) fn is_cached(source: &PatternSource) -> bool {
    CACHE
        .get()
        .is_some_and(|cache| cache.contains_key(&source.cache_key()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn second_compile_hits_cache() {
        let source = PatternSource::from("cache test *alpha* :beta");
        let first = compile_cached(&source, DEFAULT_CACHE_CAPACITY).unwrap();
        assert!(is_cached(&source));
        let second = compile_cached(&source, DEFAULT_CACHE_CAPACITY).unwrap();
        assert_eq!(first.as_str(), second.as_str());
    }

    #[test]
    fn failures_are_not_cached() {
        let source = PatternSource::from("cache test (unclosed");
        assert!(compile_cached(&source, DEFAULT_CACHE_CAPACITY).is_err());
        assert!(!is_cached(&source));
    }

    #[test]
    fn template_and_regex_with_same_text_do_not_collide() {
        let template = PatternSource::from("cache test a+");
        let regex = PatternSource::from(Regex::new("cache test a+").unwrap());
        let compiled_template = compile_cached(&template, DEFAULT_CACHE_CAPACITY).unwrap();
        let compiled_regex = compile_cached(&regex, DEFAULT_CACHE_CAPACITY).unwrap();
        assert!(compiled_template.is_match("cache test a+"));
        assert!(!compiled_template.is_match("cache test aaa"));
        assert!(compiled_regex.is_match("cache test aaa"));
    }
}
