//! Banned-word filter.
//!
//! A pure check over a configured word set: strip display formatting codes,
//! tokenize, strip the punctuation that players use to dodge filters, then
//! test each token as-is and with one trailing "s" removed. The same filter
//! backs global-chat censorship, the NSFW channel gate and the host's
//! sign-placement hook.

use regex::Regex;
use std::collections::HashSet;
use std::sync::RwLock;

pub struct WordFilter {
    words: RwLock<HashSet<String>>,
    token: Regex,
    punctuation: Regex,
    formatting: Regex,
}

impl Default for WordFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl WordFilter {
    pub fn new() -> Self {
        Self {
            words: RwLock::new(HashSet::new()),
            token: Regex::new(r"[a-zA-Z0-9,._\-?!*]+").expect("token pattern is static"),
            punctuation: Regex::new(r"[,._\-?!*]").expect("punctuation pattern is static"),
            formatting: Regex::new(r"(?i)[§&][0-9a-fk-or]").expect("formatting pattern is static"),
        }
    }

    /// Replaces the word set. Words are case-folded.
    pub fn configure<I, S>(&self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = self.words.write().expect("filter lock poisoned");
        set.clear();
        set.extend(words.into_iter().map(|w| w.as_ref().to_lowercase()));
    }

    /// Adds one word. Returns `false` if it was already present.
    pub fn add_word(&self, word: &str) -> bool {
        self.words
            .write()
            .expect("filter lock poisoned")
            .insert(word.to_lowercase())
    }

    /// Removes one word. Returns `false` if it was not present.
    pub fn remove_word(&self, word: &str) -> bool {
        self.words
            .write()
            .expect("filter lock poisoned")
            .remove(&word.to_lowercase())
    }

    /// The configured words, for display and persistence.
    pub fn words(&self) -> Vec<String> {
        let mut words: Vec<String> = self
            .words
            .read()
            .expect("filter lock poisoned")
            .iter()
            .cloned()
            .collect();
        words.sort();
        words
    }

    /// Whether `text` contains a banned word.
    pub fn contains(&self, text: &str) -> bool {
        let words = self.words.read().expect("filter lock poisoned");
        if words.is_empty() {
            return false;
        }

        let stripped = self.formatting.replace_all(text, "");
        let lowered = stripped.to_lowercase();

        for token in self.token.find_iter(&lowered) {
            let cleaned = self.punctuation.replace_all(token.as_str(), "");
            if words.contains(cleaned.as_ref()) {
                return true;
            }
            if let Some(singular) = cleaned.strip_suffix('s') {
                if words.contains(singular) {
                    return true;
                }
            }
        }

        false
    }

    /// Whether any of `lines` contains a banned word. Used by the host's
    /// sign-placement hook, which cancels the placement outright.
    pub fn contains_any<'a, I>(&self, lines: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        lines.into_iter().any(|line| self.contains(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_with(words: &[&str]) -> WordFilter {
        let filter = WordFilter::new();
        filter.configure(words.iter().copied());
        filter
    }

    #[test]
    fn matches_are_case_insensitive_and_ignore_trailing_punctuation() {
        let filter = filter_with(&["test"]);
        assert!(filter.contains("This is a Test."));
        assert!(filter.contains("test"));
        assert!(!filter.contains("testing one two"));
    }

    #[test]
    fn plural_match_is_single_trailing_s_only() {
        let filter = filter_with(&["test"]);
        assert!(filter.contains("tests"));
        assert!(!filter.contains("stests"));
    }

    #[test]
    fn embedded_punctuation_is_stripped_before_matching() {
        let filter = filter_with(&["test"]);
        assert!(filter.contains("t.e-s,t"));
        assert!(!filter.contains("Thi-s sh-34 te9sge"));
    }

    #[test]
    fn formatting_codes_do_not_hide_words() {
        let filter = filter_with(&["test"]);
        assert!(filter.contains("§ctest"));
        assert!(filter.contains("&ate&bst"));
    }

    #[test]
    fn empty_filter_matches_nothing() {
        let filter = WordFilter::new();
        assert!(!filter.contains("anything at all"));
    }

    #[test]
    fn add_and_remove_words() {
        let filter = WordFilter::new();
        assert!(filter.add_word("Grief"));
        assert!(!filter.add_word("grief"));
        assert!(filter.contains("no GRIEFS here"));
        assert!(filter.remove_word("GRIEF"));
        assert!(!filter.remove_word("grief"));
        assert!(!filter.contains("no griefs here"));
    }

    #[test]
    fn sign_lines_are_checked_individually() {
        let filter = filter_with(&["test"]);
        assert!(filter.contains_any(["first line", "a test line"]));
        assert!(!filter.contains_any(["first line", "second line"]));
    }
}
