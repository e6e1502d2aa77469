// ABOUTME: Blacklist matchers for URL prefixes and forbidden title fragments.
// ABOUTME: Both are Aho-Corasick automata; empty configuration disables a matcher.

use aho_corasick::{AhoCorasick, Anchored, Input, MatchKind, StartKind};

/// Membership test over a configured set of forbidden URL prefixes.
///
/// Built as an anchored automaton: a pattern matches only when it is a
/// literal prefix of the probed URL, giving sublinear matching over the set.
#[derive(Debug)]
pub struct PrefixBlacklist {
    ac: Option<AhoCorasick>,
}

impl PrefixBlacklist {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = prefixes
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if patterns.is_empty() {
            return Self { ac: None };
        }
        let ac = AhoCorasick::builder()
            .start_kind(StartKind::Anchored)
            .match_kind(MatchKind::LeftmostFirst)
            .build(&patterns)
            .expect("prefix blacklist automaton");
        Self { ac: Some(ac) }
    }

    /// Returns true if any configured prefix is a prefix of `url`.
    pub fn matches(&self, url: &str) -> bool {
        match &self.ac {
            None => false,
            Some(ac) => ac
                .find(Input::new(url).anchored(Anchored::Yes))
                .is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ac.is_none()
    }
}

/// Substring test over a configured set of forbidden title fragments,
/// matched case-insensitively.
#[derive(Debug)]
pub struct TitleBlacklist {
    ac: Option<AhoCorasick>,
}

impl TitleBlacklist {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = fragments
            .into_iter()
            .map(|s| s.as_ref().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if patterns.is_empty() {
            return Self { ac: None };
        }
        let ac = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&patterns)
            .expect("title blacklist automaton");
        Self { ac: Some(ac) }
    }

    /// Returns true if the lower-cased title contains any forbidden fragment.
    /// An empty title never matches.
    pub fn matches(&self, title: &str) -> bool {
        if title.is_empty() {
            return false;
        }
        match &self.ac {
            None => false,
            // Non-ASCII case folding is not covered by the automaton, so
            // probe the lowercased title.
            Some(ac) => ac.is_match(&title.to_lowercase()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ac.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_match() {
        let bl = PrefixBlacklist::new(["https://ads.example.com/", "http://spam."]);
        assert!(bl.matches("https://ads.example.com/banner?id=1"));
        assert!(bl.matches("http://spam.site/landing"));
        assert!(!bl.matches("https://example.com/ads.example.com/"));
        assert!(!bl.matches("https://good.example.com/"));
    }

    #[test]
    fn test_prefix_empty_config_disables() {
        let bl = PrefixBlacklist::new(Vec::<String>::new());
        assert!(bl.is_empty());
        assert!(!bl.matches("https://anything.example.com/"));
    }

    #[test]
    fn test_title_substring_case_insensitive() {
        let bl = TitleBlacklist::new(["forbidden", "Casino"]);
        assert!(bl.matches("This page is FORBIDDEN territory"));
        assert!(bl.matches("Best casino bonuses"));
        assert!(!bl.matches("Perfectly fine title"));
    }

    #[test]
    fn test_title_empty_never_matches() {
        let bl = TitleBlacklist::new(["forbidden"]);
        assert!(!bl.matches(""));
    }

    #[test]
    fn test_title_empty_config_disables() {
        let bl = TitleBlacklist::new(Vec::<String>::new());
        assert!(bl.is_empty());
        assert!(!bl.matches("anything at all"));
    }
}
