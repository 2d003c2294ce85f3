// 🔗 Identity Resolution Pipeline - Sender string → candidate (or explicit no-match)
//
// Override Table → Normalizer → Fuzzy Resolver, stopping at the first answer:
// 1. Raw sender contains an override pattern  → Matched (Override)
// 2. No '<' in sender                         → Unmatched(NoAddressFound)
// 3. Best fuzzy score over the roster         → Matched (Fuzzy) / Unmatched(EmptyRoster)
//
// Pure per call: no caching, no state between calls. Safe to share across
// threads against one immutable Roster.

use crate::candidate::Roster;
use crate::config::LinkageConfig;
use crate::error::ResolveError;
use crate::fuzzy::FuzzyResolver;
use crate::normalizer::Normalizer;
use crate::overrides::OverrideTable;
use anyhow::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// RESOLUTION RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMethod {
    /// Hit in the override table, no scoring involved
    Override,

    /// Best partial token-sort score over the roster
    Fuzzy,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Override => "override",
            MatchMethod::Fuzzy => "fuzzy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub display_name: String,

    /// Roster id of the first record with this display name, if any.
    /// Overrides may name a candidate missing from the roster.
    pub candidate_id: Option<String>,

    pub method: MatchMethod,

    /// Raw fuzzy score (0-100); None for overrides
    pub score: Option<u8>,

    /// Candidates sharing the top fuzzy score (1 = unambiguous)
    pub tie_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResolutionResult {
    Matched(CandidateMatch),
    Unmatched(ResolveError),
}

impl ResolutionResult {
    pub fn is_matched(&self) -> bool {
        matches!(self, ResolutionResult::Matched(_))
    }

    pub fn candidate(&self) -> Option<&CandidateMatch> {
        match self {
            ResolutionResult::Matched(m) => Some(m),
            ResolutionResult::Unmatched(_) => None,
        }
    }

    pub fn display_name(&self) -> Option<&str> {
        self.candidate().map(|m| m.display_name.as_str())
    }

    pub fn score(&self) -> Option<u8> {
        self.candidate().and_then(|m| m.score)
    }

    /// Caller-side threshold: overrides always pass, fuzzy matches need
    /// `score >= min_score`, unmatched never passes.
    pub fn meets_threshold(&self, min_score: u8) -> bool {
        match self {
            ResolutionResult::Matched(m) => m.score.map_or(true, |s| s >= min_score),
            ResolutionResult::Unmatched(_) => false,
        }
    }
}

// ============================================================================
// IDENTITY RESOLVER
// ============================================================================

pub struct IdentityResolver {
    overrides: OverrideTable,
    normalizer: Normalizer,
    fuzzy: FuzzyResolver,
}

impl IdentityResolver {
    pub fn new(overrides: OverrideTable, normalizer: Normalizer) -> Self {
        IdentityResolver {
            overrides,
            normalizer,
            fuzzy: FuzzyResolver::new(),
        }
    }

    /// Build from configuration (compiles the denylist once)
    pub fn from_config(config: &LinkageConfig) -> Result<Self> {
        let normalizer = Normalizer::new(&config.denylist)?;
        let overrides = OverrideTable::from_entries(config.overrides.clone());
        Ok(IdentityResolver::new(overrides, normalizer))
    }

    /// Built-in overrides and denylist
    pub fn with_defaults() -> Result<Self> {
        Self::from_config(&LinkageConfig::default())
    }

    pub fn overrides(&self) -> &OverrideTable {
        &self.overrides
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Resolve one sender against a roster snapshot. Never fails: every
    /// problem with the input comes back as `Unmatched`.
    pub fn resolve(&self, sender: &str, roster: &Roster) -> ResolutionResult {
        // 1. Override table on the raw sender
        if let Some(name) = self.overrides.lookup(sender) {
            debug!(sender, candidate = name, "override match");
            return ResolutionResult::Matched(CandidateMatch {
                display_name: name.to_string(),
                candidate_id: roster.find_by_name(name).map(|c| c.candidate_id.clone()),
                method: MatchMethod::Override,
                score: None,
                tie_count: 1,
            });
        }

        // 2. Normalize
        let residue = match self.normalizer.normalize(sender) {
            Ok(residue) => residue,
            Err(e) => {
                debug!(sender, reason = %e, "unmatched");
                return ResolutionResult::Unmatched(e);
            }
        };

        // 3. Fuzzy
        match self.fuzzy.best_match(&residue, roster) {
            Ok(m) => {
                debug!(
                    sender,
                    residue = %residue,
                    candidate = m.display_name(),
                    score = m.score,
                    ties = m.tied.len(),
                    "fuzzy match"
                );
                ResolutionResult::Matched(CandidateMatch {
                    display_name: m.candidate.display_name.clone(),
                    // First record carrying this name, consistent with the join
                    candidate_id: roster
                        .find_by_name(&m.candidate.display_name)
                        .map(|c| c.candidate_id.clone()),
                    method: MatchMethod::Fuzzy,
                    score: Some(m.score),
                    tie_count: m.tied.len(),
                })
            }
            Err(e) => {
                debug!(sender, reason = %e, "unmatched");
                ResolutionResult::Unmatched(e)
            }
        }
    }

    /// Resolve many senders in parallel; output order matches input order
    pub fn resolve_batch<S>(&self, senders: &[S], roster: &Roster) -> Vec<ResolutionResult>
    where
        S: AsRef<str> + Sync,
    {
        let results: Vec<ResolutionResult> = senders
            .par_iter()
            .map(|sender| self.resolve(sender.as_ref(), roster))
            .collect();

        let matched = results.iter().filter(|r| r.is_matched()).count();
        info!(
            total = results.len(),
            matched,
            unmatched = results.len() - matched,
            roster = roster.len(),
            "resolved sender batch"
        );

        results
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::CandidateRecord;
    use crate::overrides::OverrideEntry;

    fn roster() -> Roster {
        Roster::new(vec![
            CandidateRecord::new("A", "CASEY, ROBERT P. JR."),
            CandidateRecord::new("B", "HAWLEY, JOSHUA DAVID SEN"),
        ])
    }

    fn resolver_without_overrides() -> IdentityResolver {
        IdentityResolver::new(OverrideTable::new(), Normalizer::with_defaults().unwrap())
    }

    #[test]
    fn test_casey_override() {
        let resolver = IdentityResolver::with_defaults().unwrap();
        let result = resolver.resolve("Bob Casey for PA <info@email.bobcasey.com>", &roster());

        let m = result.candidate().unwrap();
        assert_eq!(m.display_name, "CASEY, ROBERT P. JR.");
        assert_eq!(m.method, MatchMethod::Override);
        assert_eq!(m.candidate_id.as_deref(), Some("A"));
        assert_eq!(m.score, None);
    }

    #[test]
    fn test_override_independent_of_roster() {
        let resolver = IdentityResolver::with_defaults().unwrap();
        let result = resolver.resolve("Bob Casey for PA <info@email.bobcasey.com>", &Roster::default());

        assert_eq!(result.display_name(), Some("CASEY, ROBERT P. JR."));
        assert_eq!(result.candidate().unwrap().candidate_id, None);
    }

    #[test]
    fn test_hawley_fuzzy_without_override() {
        let resolver = resolver_without_overrides();
        let result = resolver.resolve("Josh Hawley Campaign <josh@hawleyformo.com>", &roster());

        let m = result.candidate().unwrap();
        assert_eq!(m.display_name, "HAWLEY, JOSHUA DAVID SEN");
        assert_eq!(m.method, MatchMethod::Fuzzy);
        assert_eq!(m.candidate_id.as_deref(), Some("B"));
        assert!(m.score.is_some());
    }

    #[test]
    fn test_override_beats_fuzzy() {
        // Address fuzzy-matches Hawley, override says Casey
        let overrides = OverrideTable::from_entries(vec![OverrideEntry::new(
            "hawleyformo",
            "CASEY, ROBERT P. JR.",
        )]);
        let resolver = IdentityResolver::new(overrides, Normalizer::with_defaults().unwrap());

        let result = resolver.resolve("Josh Hawley <josh@hawleyformo.com>", &roster());
        assert_eq!(result.display_name(), Some("CASEY, ROBERT P. JR."));
    }

    #[test]
    fn test_no_angle_bracket_is_unmatched() {
        let resolver = IdentityResolver::with_defaults().unwrap();
        let result = resolver.resolve("no-angle-brackets-here", &roster());
        assert_eq!(result, ResolutionResult::Unmatched(ResolveError::NoAddressFound));
    }

    #[test]
    fn test_empty_roster_is_unmatched() {
        let resolver = IdentityResolver::with_defaults().unwrap();
        let result = resolver.resolve("Someone <someone@somewhere.com>", &Roster::default());
        assert_eq!(result, ResolutionResult::Unmatched(ResolveError::EmptyRoster));
    }

    #[test]
    fn test_exact_name_in_residue_matches() {
        let resolver = resolver_without_overrides();
        let roster = Roster::new(vec![
            CandidateRecord::new("A", "CASEY"),
            CandidateRecord::new("B", "HAWLEY"),
        ]);
        let result = resolver.resolve("News <news@hawley.net>", &roster);
        assert_eq!(result.display_name(), Some("HAWLEY"));
        assert_eq!(result.score(), Some(100));
    }

    #[test]
    fn test_deterministic() {
        let resolver = IdentityResolver::with_defaults().unwrap();
        let roster = roster();
        let sender = "Team Casey <team@caseyforsenate.com>";
        assert_eq!(resolver.resolve(sender, &roster), resolver.resolve(sender, &roster));
    }

    #[test]
    fn test_meets_threshold() {
        let resolver = resolver_without_overrides();
        let roster = roster();

        let fuzzy = resolver.resolve("x <qqqq@zzzz.com>", &roster);
        assert!(fuzzy.is_matched());
        assert!(!fuzzy.meets_threshold(50));
        assert!(fuzzy.meets_threshold(0));

        let unmatched = resolver.resolve("no brackets", &roster);
        assert!(!unmatched.meets_threshold(0));
    }

    #[test]
    fn test_batch_preserves_order() {
        let resolver = IdentityResolver::with_defaults().unwrap();
        let senders = vec![
            "Bob Casey for PA <info@email.bobcasey.com>",
            "broken sender",
            "Josh Hawley Campaign <josh@hawleyformo.com>",
        ];
        let results = resolver.resolve_batch(&senders, &roster());

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].display_name(), Some("CASEY, ROBERT P. JR."));
        assert!(!results[1].is_matched());
        assert_eq!(results[2].display_name(), Some("HAWLEY, JOSHUA DAVID SEN"));
    }
}
