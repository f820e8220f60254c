//! The filtering engine: keyword containment, link extraction and the
//! auto-learning pass.
//!
//! `check` is a command with side effects, not a pure query: links that are
//! neither whitelisted nor already known are persisted as auto-added keywords
//! during the pass, so the same link can never be posted twice.

use std::sync::Arc;

use regex::Regex;

use crate::{
    normalize::normalize,
    store::KeywordStore,
    whitelist::is_whitelisted,
    Result,
};

/// Scheme-optional domain-looking hosts (at least one dot, TLD-ish final
/// label), plus the bare `t.me`/`telegram.me` hosts, with an optional path.
const LINK_PATTERN: &str = r"(?i)\b(?:(?:https?://)?(?:(?:www\.)?(?:[a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}|(?:t\.me|telegram\.me))(?:/[^\s]*)?)";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterDecision {
    pub filtered: bool,
    /// Normalized links learned during this pass, for the caller to announce.
    /// Empty whenever `filtered` is true (the short-circuit wins).
    pub learned: Vec<String>,
}

impl FilterDecision {
    fn filter() -> Self {
        Self {
            filtered: true,
            learned: Vec::new(),
        }
    }
}

pub struct FilterEngine {
    store: Arc<KeywordStore>,
    link_pattern: Regex,
}

impl FilterEngine {
    pub fn new(store: Arc<KeywordStore>) -> Self {
        let link_pattern = Regex::new(LINK_PATTERN).expect("link pattern");
        Self {
            store,
            link_pattern,
        }
    }

    pub fn looks_like_link(&self, text: &str) -> bool {
        self.link_pattern.is_match(text)
    }

    /// Canonical stored form of an admin-supplied keyword: link-looking
    /// keywords are normalized so manual bans and auto-learned links share one
    /// form.
    pub fn canonical_keyword(&self, raw: &str) -> String {
        let keyword = if self.looks_like_link(raw) {
            normalize(raw)
        } else {
            raw.trim().to_string()
        };
        keyword.strip_prefix('/').unwrap_or(&keyword).to_string()
    }

    /// Admin-facing add (manual, not auto-added).
    pub fn add_keyword(&self, raw: &str) -> Result<String> {
        let keyword = self.canonical_keyword(raw);
        self.store
            .add_keyword(&keyword, self.looks_like_link(&keyword), false)?;
        Ok(keyword)
    }

    /// Decide whether `text` should be filtered, learning new links as a side
    /// effect.
    ///
    /// 1. Any existing keyword contained case-insensitively in the text is
    ///    authoritative and short-circuits before link processing.
    /// 2. Each extracted link is normalized; whitelisted links are skipped.
    /// 3. A non-whitelisted link equal (normalized, case-insensitive) to an
    ///    existing keyword, including one learned earlier in this same pass,
    ///    is a repeat offense and short-circuits.
    /// 4. Otherwise the link is registered as an auto-added keyword and
    ///    reported as newly learned.
    ///
    /// Store write failures during auto-registration are logged and skipped;
    /// they never fail the pass.
    pub fn check(&self, text: &str) -> Result<FilterDecision> {
        let keywords = self.store.list_keywords()?;

        let lowered = text.to_lowercase();
        for keyword in keywords.iter() {
            if lowered.contains(&keyword.to_lowercase()) {
                return Ok(FilterDecision::filter());
            }
        }

        let found: Vec<&str> = self
            .link_pattern
            .find_iter(text)
            .map(|m| m.as_str())
            .collect();
        if found.is_empty() {
            return Ok(FilterDecision::default());
        }

        let whitelist = self.store.list_whitelist()?;
        let mut learned = Vec::new();
        // Local snapshot extension: links learned in this pass count as
        // existing for the rest of the pass.
        let mut learned_lower: Vec<String> = Vec::new();

        for link in found {
            let link = normalize(link);
            if is_whitelisted(&link, &whitelist) {
                continue;
            }

            let link_lower = link.to_lowercase();
            let already_known = keywords
                .iter()
                .any(|k| k.to_lowercase() == link_lower)
                || learned_lower.contains(&link_lower);
            if already_known {
                return Ok(FilterDecision::filter());
            }

            match self.store.add_keyword(&link, true, true) {
                Ok(()) => {
                    learned_lower.push(link_lower);
                    learned.push(link);
                }
                Err(e) => {
                    // Best-effort: retried the next time the link appears.
                    eprintln!("[filter] failed to learn link {link}: {e}");
                }
            }
        }

        if !learned.is_empty() {
            println!("[filter] learned {} new link(s): {learned:?}", learned.len());
        }
        Ok(FilterDecision {
            filtered: false,
            learned,
        })
    }
}
