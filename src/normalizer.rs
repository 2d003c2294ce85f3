// 🧹 Sender Normalizer - Reduce a From header to a name-like residue
//
// "Josh Hawley Campaign <josh@hawleyformo.com>" → "JOSHHAWLEYFORMO"
//
// Steps:
// 1. Uppercase everything
// 2. Keep only what follows the first '<' (the display name is dropped:
//    campaigns often send "from" staff, not the candidate)
// 3. Strip denylisted tokens until none remain

use crate::error::ResolveError;
use aho_corasick::{AhoCorasick, MatchKind};
use anyhow::{Context, Result};

/// Tokens with nothing to do with a candidate's name
pub const DEFAULT_DENYLIST: &[&str] = &[
    "INFO@", "TEAM@", ".COM", ".ORG", "CONTACT@", "REPLY@", "TEAM", "<", ">", "@", ",", "\"",
    "CONGRESS", "SENATE", "SENATOR", "UPDATE", "EMAIL", "2024", "ALERT", "WHITE HOUSE",
    "CAMPAIGN", "REELECTION", "TRUMP", "REPUBLICAN", "DEMOCRAT", "POLL", "BALLOT", "BREAKING",
    "CRITICAL", "OFFICIAL", "MANAGER",
];

pub fn default_denylist() -> Vec<String> {
    DEFAULT_DENYLIST.iter().map(|t| t.to_string()).collect()
}

// ============================================================================
// NORMALIZER
// ============================================================================

pub struct Normalizer {
    /// All tokens compiled into one automaton (None when the list is empty)
    automaton: Option<AhoCorasick>,
}

impl Normalizer {
    /// Compile a denylist. Tokens are uppercased; empty tokens are ignored.
    pub fn new<S: AsRef<str>>(denylist: &[S]) -> Result<Self> {
        let mut tokens: Vec<String> = Vec::new();
        for token in denylist {
            let upper = token.as_ref().to_uppercase();
            if !upper.is_empty() && !tokens.contains(&upper) {
                tokens.push(upper);
            }
        }

        let automaton = if tokens.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::builder()
                    .match_kind(MatchKind::LeftmostLongest)
                    .build(&tokens)
                    .context("Failed to compile normalizer denylist")?,
            )
        };

        Ok(Normalizer { automaton })
    }

    /// Normalizer with the built-in denylist
    pub fn with_defaults() -> Result<Self> {
        Normalizer::new(DEFAULT_DENYLIST)
    }

    /// Reduce a raw sender to its comparison residue
    pub fn normalize(&self, sender: &str) -> Result<String, ResolveError> {
        let upper = sender.to_uppercase();

        let (_, address) = upper
            .split_once('<')
            .ok_or(ResolveError::NoAddressFound)?;

        Ok(self.strip(address))
    }

    /// Remove every denylisted token, repeating until a pass removes nothing.
    ///
    /// A single pass strips all non-overlapping (leftmost-longest) matches;
    /// further passes catch tokens that only appear once a neighbour is gone
    /// ("TEA<>M" → "TEAM" → "").
    pub fn strip(&self, text: &str) -> String {
        let Some(ac) = &self.automaton else {
            return text.to_string();
        };

        let mut current = text.to_string();
        loop {
            let mut stripped = String::with_capacity(current.len());
            let mut last = 0;
            for mat in ac.find_iter(&current) {
                stripped.push_str(&current[last..mat.start()]);
                last = mat.end();
            }
            if last == 0 {
                // No match in this pass
                return current;
            }
            stripped.push_str(&current[last..]);
            current = stripped;
        }
    }

    /// True if any denylisted token is still present
    pub fn contains_denylisted(&self, text: &str) -> bool {
        self.automaton
            .as_ref()
            .map(|ac| ac.is_match(text))
            .unwrap_or(false)
    }
}

// ============================================================================
// TESTS
// ============================================================================
