//! Process-wide cache of compiled regular expressions.
//!
//! The reference tables carry hundreds of regex sources that are applied
//! on every call. Each source is compiled on first use and kept for the
//! lifetime of the process. Entries are never evicted or replaced.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use regex::Regex;

static PATTERNS: LazyLock<PatternCache> = LazyLock::new(PatternCache::new);

/// Returns the shared cache.
#[must_use]
pub fn shared() -> &'static PatternCache {
    &PATTERNS
}

/// Memoized regex compiler keyed by source text.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: RwLock<BTreeMap<String, Arc<Regex>>>,
}

impl PatternCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled form of `source`, compiling it on first use.
    ///
    /// # Errors
    ///
    /// Returns the compile error if `source` is not a valid pattern.
    /// Failures are not cached.
    pub fn get(&self, source: &str) -> Result<Arc<Regex>, regex::Error> {
        self.get_or_compile(source.to_string())
    }

    /// Like [`Self::get`], but matches case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns the compile error if `source` is not a valid pattern.
    pub fn get_case_insensitive(&self, source: &str) -> Result<Arc<Regex>, regex::Error> {
        self.get_or_compile(format!("(?i){source}"))
    }

    /// Number of compiled patterns currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.compiled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been compiled yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_or_compile(&self, key: String) -> Result<Arc<Regex>, regex::Error> {
        if let Some(re) = self
            .compiled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(re));
        }

        log::trace!("Compiling pattern {key:?}");
        let re = Arc::new(Regex::new(&key)?);

        // Another thread may have compiled the same source meanwhile; the
        // first insert wins so every caller sees one shared instance.
        let mut compiled = self
            .compiled
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(compiled.entry(key).or_insert(re)))
    }
}

/// Converts a `$1`-style replacement into the regex crate's syntax.
///
/// Group references become `${1}` so that a digit followed by letters is
/// not read as one long group name, `\$` becomes a literal dollar, and any
/// other `$` not followed by a digit is kept literally.
#[must_use]
pub fn expand_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len() + 4);
    let mut chars = replacement.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'$') => {
                chars.next();
                out.push_str("$$");
            }
            '$' if chars.peek().is_some_and(char::is_ascii_digit) => {
                out.push_str("${");
                while let Some(d) = chars.next_if(char::is_ascii_digit) {
                    out.push(d);
                }
                out.push('}');
            }
            '$' => out.push_str("$$"),
            other => out.push(other),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_once_per_source() {
        let cache = PatternCache::new();
        assert!(cache.is_empty());

        let a = cache.get(r"\d+").unwrap();
        let b = cache.get(r"\d+").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn case_insensitive_is_a_separate_entry() {
        let cache = PatternCache::new();
        let sensitive = cache.get("aruba").unwrap();
        let insensitive = cache.get_case_insensitive("aruba").unwrap();

        assert!(!sensitive.is_match("ARUBA"));
        assert!(insensitive.is_match("ARUBA"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn invalid_pattern_is_not_cached() {
        let cache = PatternCache::new();
        assert!(cache.get("(unclosed").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_first_use_shares_one_instance() {
        let cache = Arc::new(PatternCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get(r"^(\d{5}),\d{5}").unwrap())
            })
            .collect();

        let compiled: Vec<Arc<Regex>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(cache.len(), 1);

        let cached = cache.get(r"^(\d{5}),\d{5}").unwrap();
        assert!(compiled.iter().all(|re| Arc::ptr_eq(re, &cached)));
    }

    #[test]
    fn expands_group_references() {
        assert_eq!(expand_replacement("$1"), "${1}");
        assert_eq!(expand_replacement("$1abc"), "${1}abc");
        assert_eq!(expand_replacement("$12 $2"), "${12} ${2}");
    }

    #[test]
    fn escapes_literal_dollars() {
        assert_eq!(expand_replacement(r"\$5"), "$$5");
        assert_eq!(expand_replacement("US$"), "US$$");
        assert_eq!(expand_replacement("plain"), "plain");
    }

    #[test]
    fn expanded_replacement_substitutes_groups() {
        let re = Regex::new(r"(\d+) (\w+)").unwrap();
        let out = re.replace_all("12 Main", expand_replacement("$2 $1").as_str());
        assert_eq!(out, "Main 12");
    }
}
