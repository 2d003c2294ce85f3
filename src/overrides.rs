// 📌 Override Table - Known senders as data
// Hard sender → candidate mappings consulted before any fuzzy matching.
//
// Patterns are tested against the RAW sender string (no uppercasing, no
// normalization). First entry in declaration order wins.

use serde::{Deserialize, Serialize};

// ============================================================================
// OVERRIDE ENTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideEntry {
    /// Substring to look for in the raw sender (case-sensitive)
    pub pattern: String,

    /// Roster display name this sender resolves to
    pub canonical_name: String,
}

impl OverrideEntry {
    pub fn new(pattern: &str, canonical_name: &str) -> Self {
        OverrideEntry {
            pattern: pattern.to_string(),
            canonical_name: canonical_name.to_string(),
        }
    }

    /// Containment check against the raw sender
    pub fn matches(&self, sender: &str) -> bool {
        // An empty pattern would match everything
        !self.pattern.is_empty() && sender.contains(&self.pattern)
    }
}

/// Senders known to defeat fuzzy matching
pub fn default_overrides() -> Vec<OverrideEntry> {
    vec![
        OverrideEntry::new("<info@email.bobcasey.com>", "CASEY, ROBERT P. JR."),
        OverrideEntry::new("<info@hungcaoforva.com>", "CAO, HUNG"),
        OverrideEntry::new("info@lisabluntrochester.com", "BLUNT ROCHESTER, LISA"),
        OverrideEntry::new("info@e.tammybaldwin.com", "BALDWIN, TAMMY"),
        OverrideEntry::new("josh@hawleyformo.com", "HAWLEY, JOSHUA DAVID SEN"),
        OverrideEntry::new("info@action.rosenfornevada.com>", "ROSEN, JACKY"),
    ]
}

// ============================================================================
// OVERRIDE TABLE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    entries: Vec<OverrideEntry>,
}

impl OverrideTable {
    /// Create an empty table (every lookup misses)
    pub fn new() -> Self {
        OverrideTable { entries: Vec::new() }
    }

    /// Create table from entries, keeping declaration order
    pub fn from_entries(entries: Vec<OverrideEntry>) -> Self {
        OverrideTable { entries }
    }

    /// Table with the built-in sender exceptions
    pub fn with_defaults() -> Self {
        OverrideTable::from_entries(default_overrides())
    }

    /// Canonical name of the first entry whose pattern occurs in `sender`
    pub fn lookup(&self, sender: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.matches(sender))
            .map(|entry| entry.canonical_name.as_str())
    }

    pub fn entries(&self) -> &[OverrideEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
