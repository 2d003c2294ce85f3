// 🎯 Fuzzy Resolver - Partial token-sort similarity against the roster
//
// Score (0-100) between a residue and a candidate name:
// 1. Process both: drop Latin-1 supplement chars, non-word chars → space,
//    lowercase, trim
// 2. Sort whitespace tokens on each side and rejoin ("SMITH, JOHN" → "john smith")
// 3. Partial ratio: best Indel similarity of the shorter string against any
//    equally long window of the longer one
//
// So a bare surname can score 100 against a full "LAST, FIRST MIDDLE" name,
// and word order never matters.

use crate::candidate::{CandidateRecord, Roster};
use crate::error::ResolveError;
use serde::Serialize;
use std::collections::HashSet;

// ============================================================================
// SCORING
// ============================================================================

/// Latin-1 supplement chars (U+0080..=U+00FF) are dropped outright; other
/// word characters are lowercased and everything else becomes whitespace
pub fn process(s: &str) -> String {
    let replaced: String = s
        .chars()
        .filter(|c| !('\u{80}'..='\u{ff}').contains(c))
        .flat_map(|c| {
            let word = c.is_alphanumeric() || c == '_';
            let lowered = c.to_lowercase();
            let space = if word { None } else { Some(' ') };
            lowered.filter(move |_| word).chain(space)
        })
        .collect();
    replaced.trim().to_string()
}

/// Processed string with its tokens sorted and single-space joined
pub fn token_sort_key(s: &str) -> String {
    let processed = process(s);
    let mut tokens: Vec<&str> = processed.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Partial token-sort ratio, rounded half-to-even like the reference scorer
pub fn partial_token_sort_ratio(a: &str, b: &str) -> u8 {
    partial_ratio_sorted(&token_sort_key(a), &token_sort_key(b))
}

/// Partial ratio over two already token-sorted keys
pub fn partial_ratio_sorted(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    let mut best = partial_ratio_impl(shorter, longer);

    if best < 100.0 && a.len() == b.len() {
        let swapped = partial_ratio_impl(longer, shorter);
        if swapped > best {
            best = swapped;
        }
    }

    round_half_even(best)
}

/// Slide `needle` over `haystack` (needle.len() <= haystack.len()), including
/// the partial windows hanging off both edges. Windows whose boundary char
/// does not occur in the needle cannot be the best alignment and are skipped.
fn partial_ratio_impl(needle: &[char], haystack: &[char]) -> f64 {
    let len1 = needle.len();
    let len2 = haystack.len();
    let needle_chars: HashSet<char> = needle.iter().copied().collect();

    let mut best = 0.0;

    // Windows growing in from the left edge
    for i in 1..len1 {
        if !needle_chars.contains(&haystack[i - 1]) {
            continue;
        }
        let score = indel_ratio(needle, &haystack[..i]);
        if score > best {
            best = score;
            if best >= 100.0 {
                return best;
            }
        }
    }

    // Full-length windows
    for i in 0..(len2 - len1) {
        if !needle_chars.contains(&haystack[i + len1 - 1]) {
            continue;
        }
        let score = indel_ratio(needle, &haystack[i..i + len1]);
        if score > best {
            best = score;
            if best >= 100.0 {
                return best;
            }
        }
    }

    // Windows shrinking off the right edge
    for i in (len2 - len1)..len2 {
        if !needle_chars.contains(&haystack[i]) {
            continue;
        }
        let score = indel_ratio(needle, &haystack[i..]);
        if score > best {
            best = score;
            if best >= 100.0 {
                return best;
            }
        }
    }

    best
}

/// Normalized Indel similarity in [0, 100]
fn indel_ratio(a: &[char], b: &[char]) -> f64 {
    let lensum = a.len() + b.len();
    if lensum == 0 {
        return 100.0;
    }
    let distance = lensum - 2 * lcs_len(a, b);
    let normalized = distance as f64 / lensum as f64;
    (1.0 - normalized) * 100.0
}

/// Longest common subsequence length (single rolling row)
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        let mut diag = 0;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diag + 1
            } else {
                above.max(row[j])
            };
            diag = above;
        }
    }
    row[b.len()]
}

fn round_half_even(x: f64) -> u8 {
    let floor = x.floor();
    let diff = x - floor;
    let rounded = if diff > 0.5 {
        floor + 1.0
    } else if diff < 0.5 {
        floor
    } else if floor % 2.0 == 0.0 {
        floor
    } else {
        floor + 1.0
    };
    rounded.clamp(0.0, 100.0) as u8
}

// ============================================================================
// FUZZY MATCH
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct FuzzyMatch<'a> {
    /// Position in roster order
    pub index: usize,

    pub candidate: &'a CandidateRecord,

    /// Raw score (0-100). No threshold has been applied.
    pub score: u8,

    /// Roster indices sharing the top score (includes `index`, length >= 1)
    pub tied: Vec<usize>,
}

impl FuzzyMatch<'_> {
    pub fn display_name(&self) -> &str {
        &self.candidate.display_name
    }

    pub fn is_ambiguous(&self) -> bool {
        self.tied.len() > 1
    }
}

// ============================================================================
// FUZZY RESOLVER
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyResolver;

impl FuzzyResolver {
    pub fn new() -> Self {
        FuzzyResolver
    }

    /// Score every candidate, in roster order
    pub fn scores(&self, residue: &str, roster: &Roster) -> Vec<u8> {
        let query = token_sort_key(residue);
        roster
            .iter()
            .map(|candidate| partial_ratio_sorted(&query, &token_sort_key(&candidate.display_name)))
            .collect()
    }

    /// Best-scoring candidate; ties go to the earliest roster entry.
    /// Always answers for a non-empty roster, even at score 0.
    pub fn best_match<'a>(
        &self,
        residue: &str,
        roster: &'a Roster,
    ) -> Result<FuzzyMatch<'a>, ResolveError> {
        if roster.is_empty() {
            return Err(ResolveError::EmptyRoster);
        }

        let scores = self.scores(residue, roster);

        let mut index = 0;
        for (i, &score) in scores.iter().enumerate() {
            // Strictly greater: first of equals is kept
            if score > scores[index] {
                index = i;
            }
        }
        let top = scores[index];
        let tied: Vec<usize> = scores
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s == top)
            .map(|(i, _)| i)
            .collect();

        Ok(FuzzyMatch {
            index,
            candidate: &roster.candidates()[index],
            score: top,
            tied,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
