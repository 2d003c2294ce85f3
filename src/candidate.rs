// 🗳️ Candidate Roster - Comparison universe for sender resolution
//
// Sources:
// - FEC /v1/candidates/ pages        → CandidateRecord (name, party, state, ...)
// - FEC /v1/candidates/totals/ pages → receipts per candidate_id
//
// The two are left-joined on candidate_id and deduplicated (first wins).
// A Roster is read-only once built: resolution borrows it immutably.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ============================================================================
// CANDIDATE RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// FEC candidate id (opaque, stable)
    pub candidate_id: String,

    /// FEC display name, e.g. "CASEY, ROBERT P. JR." - the fuzzy comparison key
    pub display_name: String,

    pub party: Option<String>,

    /// "Incumbent" / "Challenger" / "Open seat"
    pub incumbency_status: Option<String>,

    pub state: Option<String>,

    #[serde(default)]
    pub has_raised_funds: bool,

    /// Total receipts for the cycle (None = no funding row found)
    pub receipts_total: Option<f64>,
}

impl CandidateRecord {
    pub fn new(candidate_id: &str, display_name: &str) -> Self {
        CandidateRecord {
            candidate_id: candidate_id.to_string(),
            display_name: display_name.to_string(),
            party: None,
            incumbency_status: None,
            state: None,
            has_raised_funds: false,
            receipts_total: None,
        }
    }
}

// ============================================================================
// ROSTER
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    candidates: Vec<CandidateRecord>,
}

impl Roster {
    /// Build a roster, keeping the given order (order decides score ties)
    pub fn new(candidates: Vec<CandidateRecord>) -> Self {
        Roster { candidates }
    }

    pub fn candidates(&self) -> &[CandidateRecord] {
        &self.candidates
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CandidateRecord> {
        self.candidates.iter()
    }

    pub fn get(&self, index: usize) -> Option<&CandidateRecord> {
        self.candidates.get(index)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// First candidate whose display name equals `name` exactly
    pub fn find_by_name(&self, name: &str) -> Option<&CandidateRecord> {
        self.candidates.iter().find(|c| c.display_name == name)
    }

    pub fn find_by_id(&self, candidate_id: &str) -> Option<&CandidateRecord> {
        self.candidates.iter().find(|c| c.candidate_id == candidate_id)
    }

    /// Load a materialized roster from CSV (header = CandidateRecord fields)
    pub fn from_csv(path: &Path) -> Result<Self> {
        let mut rdr = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open roster CSV: {}", path.display()))?;

        let mut candidates = Vec::new();
        for (line_num, result) in rdr.deserialize().enumerate() {
            let record: CandidateRecord = result.with_context(|| {
                format!("Failed to parse roster line {} in {}", line_num + 2, path.display())
            })?;
            candidates.push(record);
        }

        info!(count = candidates.len(), path = %path.display(), "loaded roster");
        Ok(Roster::new(candidates))
    }

    /// Write the roster as CSV
    pub fn to_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create roster CSV: {}", path.display()))?;

        for candidate in &self.candidates {
            wtr.serialize(candidate)
                .context("Failed to write roster record")?;
        }
        wtr.flush()?;

        Ok(())
    }
}

impl FromIterator<CandidateRecord> for Roster {
    fn from_iter<I: IntoIterator<Item = CandidateRecord>>(iter: I) -> Self {
        Roster::new(iter.into_iter().collect())
    }
}

// ============================================================================
// FEC API PAYLOADS
// ============================================================================

/// One page of an FEC list endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct FecPage<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    pub pagination: FecPagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FecPagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub count: u64,
}

/// Row of /v1/candidates/
#[derive(Debug, Clone, Deserialize)]
pub struct FecCandidate {
    pub candidate_id: String,
    pub name: String,
    #[serde(default)]
    pub party_full: Option<String>,
    #[serde(default)]
    pub incumbent_challenge_full: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub has_raised_funds: Option<bool>,
}

impl From<FecCandidate> for CandidateRecord {
    fn from(c: FecCandidate) -> Self {
        CandidateRecord {
            candidate_id: c.candidate_id,
            display_name: c.name,
            party: c.party_full,
            incumbency_status: c.incumbent_challenge_full,
            state: c.state,
            has_raised_funds: c.has_raised_funds.unwrap_or(false),
            receipts_total: None,
        }
    }
}

/// Row of /v1/candidates/totals/
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptsRecord {
    pub candidate_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub receipts: Option<f64>,
}

pub fn parse_candidates_page(json: &str) -> Result<FecPage<FecCandidate>> {
    serde_json::from_str(json).context("Failed to parse FEC candidates page")
}

pub fn parse_receipts_page(json: &str) -> Result<FecPage<ReceiptsRecord>> {
    serde_json::from_str(json).context("Failed to parse FEC totals page")
}

// ============================================================================
// MERGE
// ============================================================================

/// Left-join receipts onto candidates by candidate_id, then drop repeated
/// candidate_ids (first occurrence kept). Candidate order is preserved.
pub fn merge_receipts(
    candidates: Vec<CandidateRecord>,
    receipts: &[ReceiptsRecord],
) -> Roster {
    let mut receipts_by_id: HashMap<&str, Option<f64>> = HashMap::new();
    for r in receipts {
        receipts_by_id
            .entry(r.candidate_id.as_str())
            .or_insert(r.receipts);
    }

    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(candidates.len());
    for mut candidate in candidates {
        if !seen.insert(candidate.candidate_id.clone()) {
            debug!(candidate_id = %candidate.candidate_id, "dropping duplicate candidate");
            continue;
        }
        if let Some(total) = receipts_by_id.get(candidate.candidate_id.as_str()) {
            candidate.receipts_total = *total;
        }
        merged.push(candidate);
    }

    Roster::new(merged)
}

// ============================================================================
// ROSTER PROVIDERS
// ============================================================================

/// Supplies a materialized roster. Retrieval, paging and rate limits are the
/// provider's business; resolution only sees the finished Roster.
pub trait RosterProvider {
    fn load_roster(&self) -> Result<Roster>;
}

/// Roster from a CSV written by `Roster::to_csv`
pub struct CsvRosterProvider {
    pub path: PathBuf,
}

impl RosterProvider for CsvRosterProvider {
    fn load_roster(&self) -> Result<Roster> {
        Roster::from_csv(&self.path)
    }
}

/// Roster from saved FEC API pages (one JSON page per file)
pub struct FecPageDirProvider {
    pub candidates_dir: PathBuf,
    pub receipts_dir: Option<PathBuf>,
}

impl FecPageDirProvider {
    fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        files.sort();
        Ok(files)
    }
}

impl RosterProvider for FecPageDirProvider {
    fn load_roster(&self) -> Result<Roster> {
        let mut candidates = Vec::new();
        for file in Self::json_files(&self.candidates_dir)? {
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let page = parse_candidates_page(&content)
                .with_context(|| format!("Bad candidates page: {}", file.display()))?;
            candidates.extend(page.results.into_iter().map(CandidateRecord::from));
        }

        let mut receipts = Vec::new();
        if let Some(dir) = &self.receipts_dir {
            for file in Self::json_files(dir)? {
                let content = fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                let page = parse_receipts_page(&content)
                    .with_context(|| format!("Bad totals page: {}", file.display()))?;
                receipts.extend(page.results);
            }
        }

        let roster = merge_receipts(candidates, &receipts);
        info!(count = roster.len(), "built roster from FEC pages");
        Ok(roster)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const CANDIDATES_PAGE: &str = r#"{
        "pagination": {"page": 1, "pages": 1, "count": 3, "per_page": 100},
        "results": [
            {"candidate_id": "S2PA00000", "name": "CASEY, ROBERT P. JR.", "party_full": "DEMOCRATIC PARTY",
             "incumbent_challenge_full": "Incumbent", "state": "PA", "has_raised_funds": true, "office": "S"},
            {"candidate_id": "S8MO00000", "name": "HAWLEY, JOSHUA DAVID SEN", "party_full": "REPUBLICAN PARTY",
             "incumbent_challenge_full": "Incumbent", "state": "MO", "has_raised_funds": true},
            {"candidate_id": "S2PA00000", "name": "CASEY, ROBERT P. JR.", "state": "PA"}
        ]
    }"#;

    #[test]
    fn test_parse_candidates_page() {
        let page = parse_candidates_page(CANDIDATES_PAGE).unwrap();
        assert_eq!(page.pagination.pages, 1);
        assert_eq!(page.results.len(), 3);

        let record = CandidateRecord::from(page.results[1].clone());
        assert_eq!(record.display_name, "HAWLEY, JOSHUA DAVID SEN");
        assert_eq!(record.state.as_deref(), Some("MO"));
        assert!(record.has_raised_funds);
        assert_eq!(record.receipts_total, None);
    }

    #[test]
    fn test_merge_receipts_left_join_and_dedup() {
        let page = parse_candidates_page(CANDIDATES_PAGE).unwrap();
        let candidates: Vec<CandidateRecord> =
            page.results.into_iter().map(CandidateRecord::from).collect();

        let receipts = vec![ReceiptsRecord {
            candidate_id: "S2PA00000".to_string(),
            name: Some("CASEY, ROBERT P. JR.".to_string()),
            receipts: Some(1234.5),
        }];

        let roster = merge_receipts(candidates, &receipts);

        assert_eq!(roster.len(), 2);
        assert_eq!(roster.get(0).unwrap().receipts_total, Some(1234.5));
        // No totals row → no funding
        assert_eq!(roster.get(1).unwrap().receipts_total, None);
        // First duplicate kept (it has the party)
        assert_eq!(roster.get(0).unwrap().party.as_deref(), Some("DEMOCRATIC PARTY"));
    }

    #[test]
    fn test_find_by_name_returns_first() {
        let roster = Roster::new(vec![
            CandidateRecord::new("A", "SMITH, JOHN"),
            CandidateRecord::new("B", "SMITH, JOHN"),
        ]);
        assert_eq!(roster.find_by_name("SMITH, JOHN").unwrap().candidate_id, "A");
        assert!(roster.find_by_name("SMITH").is_none());
    }

    #[test]
    fn test_csv_roundtrip_keeps_missing_funding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");

        let mut casey = CandidateRecord::new("A", "CASEY, ROBERT P. JR.");
        casey.receipts_total = Some(10.0);
        let roster = Roster::new(vec![casey, CandidateRecord::new("B", "HAWLEY, JOSHUA DAVID SEN")]);

        roster.to_csv(&path).unwrap();
        let loaded = Roster::from_csv(&path).unwrap();

        assert_eq!(loaded, roster);
    }

    #[test]
    fn test_page_dir_provider() {
        let dir = tempfile::tempdir().unwrap();
        let cand_dir = dir.path().join("candidates");
        fs::create_dir(&cand_dir).unwrap();
        fs::write(cand_dir.join("page_001.json"), CANDIDATES_PAGE).unwrap();
        fs::write(cand_dir.join("notes.txt"), "ignored").unwrap();

        let provider = FecPageDirProvider {
            candidates_dir: cand_dir,
            receipts_dir: None,
        };
        let roster = provider.load_roster().unwrap();
        assert_eq!(roster.len(), 2);
    }
}
