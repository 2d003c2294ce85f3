// ⚙️ Linkage Configuration - Rules as data
//
// Everything tunable about sender resolution lives here and can be loaded
// from a JSON file. Missing fields fall back to the built-in lists:
//
// {
//   "overrides": [{"pattern": "josh@hawleyformo.com", "canonical_name": "HAWLEY, JOSHUA DAVID SEN"}],
//   "denylist": ["INFO@", ".COM", "CAMPAIGN"],
//   "sender_blocklist": ["Google <no-reply@accounts.google.com>"],
//   "min_score": 60
// }

use crate::normalizer::default_denylist;
use crate::overrides::{default_overrides, OverrideEntry};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Senders that are never a candidate (exact match on the From header)
pub fn default_sender_blocklist() -> Vec<String> {
    vec![
        "Google <no-reply@accounts.google.com>".to_string(),
        "\"Secure & Prosper\" <today@secureandprosper.com>".to_string(),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkageConfig {
    /// Checked in order before fuzzy matching
    pub overrides: Vec<OverrideEntry>,

    /// Tokens stripped from the address residue
    pub denylist: Vec<String>,

    /// Emails from these senders are dropped before resolution
    pub sender_blocklist: Vec<String>,

    /// Fuzzy matches scoring below this are reported as unmatched when
    /// linking. None keeps every best match.
    pub min_score: Option<u8>,
}

impl Default for LinkageConfig {
    fn default() -> Self {
        LinkageConfig {
            overrides: default_overrides(),
            denylist: default_denylist(),
            sender_blocklist: default_sender_blocklist(),
            min_score: None,
        }
    }
}

impl LinkageConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: LinkageConfig =
            serde_json::from_str(json).context("Failed to parse config JSON")?;

        if let Some(min) = config.min_score {
            anyhow::ensure!(min <= 100, "min_score must be within 0-100, got {}", min);
        }

        Ok(config)
    }

    /// Config file if given, built-in defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn is_blocked_sender(&self, sender: &str) -> bool {
        self.sender_blocklist.iter().any(|blocked| blocked == sender)
    }
}

// ============================================================================
// TESTS
// ============================================================================
