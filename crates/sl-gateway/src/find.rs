//! Find-widget matching modes.
//!
//! The editor builds a predicate that calls one of eight scalar functions by
//! name; gateway implementations register those functions and evaluate them
//! with [`FindMode::matches`]. Keeping both sides here guarantees the names
//! and semantics agree.

use regex::Regex;
use std::sync::Mutex;

/// Flags selecting one of the eight comparison functions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FindMode {
    pub regex: bool,
    pub whole_word: bool,
    pub case_sensitive: bool,
}

impl FindMode {
    /// All modes, in the order gateways register them.
    pub fn all() -> impl Iterator<Item = FindMode> {
        (0..8u8).map(|bits| FindMode {
            regex: bits & 0b100 != 0,
            whole_word: bits & 0b010 != 0,
            case_sensitive: bits & 0b001 != 0,
        })
    }

    /// SQL function name, e.g. `find_widget_compare_r_w_c`.
    pub fn function_name(&self) -> &'static str {
        match (self.regex, self.whole_word, self.case_sensitive) {
            (false, false, false) => "find_widget_compare",
            (false, false, true) => "find_widget_compare_c",
            (false, true, false) => "find_widget_compare_w",
            (false, true, true) => "find_widget_compare_w_c",
            (true, false, false) => "find_widget_compare_r",
            (true, false, true) => "find_widget_compare_r_c",
            (true, true, false) => "find_widget_compare_r_w",
            (true, true, true) => "find_widget_compare_r_w_c",
        }
    }

    /// Evaluate the comparison for one cell.
    pub fn matches(&self, haystack: &str, needle: &str, cache: &RegexCache) -> bool {
        if self.regex {
            if self.whole_word && needle.is_empty() {
                return false;
            }
            let mut pattern = String::new();
            if !self.case_sensitive {
                pattern.push_str("(?i)");
            }
            pattern.push_str("(?s)");
            if self.whole_word {
                pattern.push_str(&format!("\\b(?:{})\\b", needle));
            } else {
                pattern.push_str(needle);
            }
            return cache.is_match(&pattern, haystack);
        }

        match (self.whole_word, self.case_sensitive) {
            (true, true) => haystack == needle,
            (true, false) => haystack.to_lowercase() == needle.to_lowercase(),
            (false, true) => haystack.contains(needle),
            (false, false) => haystack.to_lowercase().contains(&needle.to_lowercase()),
        }
    }
}

/// Remembers the last compiled pattern; a find predicate evaluates the same
/// pattern once per cell.
#[derive(Debug, Default)]
pub struct RegexCache {
    last: Mutex<Option<(String, Regex)>>,
}

impl RegexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalid patterns never match.
    pub fn is_match(&self, pattern: &str, text: &str) -> bool {
        let Ok(mut last) = self.last.lock() else {
            return false;
        };
        if let Some((cached, regex)) = last.as_ref() {
            if cached == pattern {
                return regex.is_match(text);
            }
        }
        let Ok(regex) = Regex::new(pattern) else {
            return false;
        };
        let matched = regex.is_match(text);
        *last = Some((pattern.to_owned(), regex));
        matched
    }
}
