// 📊 Linked Dataset - Emails joined to candidates
//
// Batch orchestration around the resolver:
// 1. prepare_emails: drop duplicates, bodiless emails, blocklisted senders
// 2. link: resolve every sender (parallel), left-join the roster record
// 3. write_csv: one row per email, unmatched rows kept and tagged
//
// The optional score threshold is applied here, never inside the resolver.

use crate::candidate::{CandidateRecord, Roster};
use crate::config::LinkageConfig;
use crate::error::ResolveError;
use crate::mailbox::EmailRecord;
use crate::resolver::{IdentityResolver, MatchMethod, ResolutionResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// Placeholder written for unmatched rows (CSV only, never used as a name)
pub const NO_CANDIDATE: &str = "No Candidate Found";

/// Placeholder written when the candidate has no receipts row
pub const NO_FUNDING: &str = "No Funding Found";

// ============================================================================
// PREPARATION
// ============================================================================

/// Idempotency hash over (date, sender, subject, body)
pub fn email_hash(email: &EmailRecord) -> String {
    let mut hasher = Sha256::new();
    // Unit separator keeps field boundaries unambiguous
    for field in [
        email.date.as_str(),
        email.sender.as_str(),
        email.subject.as_str(),
        email.body.as_deref().unwrap_or(""),
    ] {
        hasher.update(field.as_bytes());
        hasher.update([0x1fu8]);
    }
    hasher.update([email.body.is_some() as u8]);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrepareReport {
    pub input: usize,
    pub duplicates: usize,
    pub no_body: usize,
    pub blocked_sender: usize,
    pub kept: usize,
}

impl PrepareReport {
    pub fn summary(&self) -> String {
        format!(
            "{} emails → {} kept ({} duplicates, {} without body, {} blocked senders)",
            self.input, self.kept, self.duplicates, self.no_body, self.blocked_sender
        )
    }
}

/// Filter raw emails down to the ones worth resolving (order preserved)
pub fn prepare_emails(
    emails: Vec<EmailRecord>,
    config: &LinkageConfig,
) -> (Vec<EmailRecord>, PrepareReport) {
    let mut report = PrepareReport {
        input: emails.len(),
        ..Default::default()
    };
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(emails.len());

    for email in emails {
        if !seen.insert(email_hash(&email)) {
            report.duplicates += 1;
            continue;
        }
        if email.body.is_none() {
            report.no_body += 1;
            continue;
        }
        if config.is_blocked_sender(&email.sender) {
            report.blocked_sender += 1;
            continue;
        }
        kept.push(email);
    }

    report.kept = kept.len();
    info!("{}", report.summary());
    (kept, report)
}

// ============================================================================
// LINKING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    /// Resolved and accepted
    Matched,

    /// Fuzzy best match scored under the configured minimum
    BelowThreshold,

    /// Resolver gave no candidate
    Unmatched(ResolveError),
}

impl LinkStatus {
    pub fn code(&self) -> &'static str {
        match self {
            LinkStatus::Matched => "matched",
            LinkStatus::BelowThreshold => "below_threshold",
            LinkStatus::Unmatched(e) => e.code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedEmail {
    pub email: EmailRecord,
    pub resolution: ResolutionResult,
    pub status: LinkStatus,

    /// Roster record joined on display name (only for accepted matches)
    pub candidate: Option<CandidateRecord>,
}

impl LinkedEmail {
    /// Candidate name as reported downstream (None unless accepted)
    pub fn candidate_name(&self) -> Option<&str> {
        match self.status {
            LinkStatus::Matched => self.resolution.display_name(),
            _ => None,
        }
    }

    pub fn method(&self) -> Option<MatchMethod> {
        self.resolution.candidate().map(|m| m.method)
    }
}

/// Resolve and join every email. One output row per input email.
pub fn link(
    emails: Vec<EmailRecord>,
    roster: &Roster,
    resolver: &IdentityResolver,
    min_score: Option<u8>,
) -> Vec<LinkedEmail> {
    let senders: Vec<&str> = emails.iter().map(|e| e.sender.as_str()).collect();
    let resolutions = resolver.resolve_batch(&senders, roster);

    emails
        .into_iter()
        .zip(resolutions)
        .map(|(email, resolution)| {
            let status = match &resolution {
                ResolutionResult::Unmatched(e) => LinkStatus::Unmatched(*e),
                r if min_score.map_or(true, |min| r.meets_threshold(min)) => LinkStatus::Matched,
                _ => LinkStatus::BelowThreshold,
            };

            let candidate = match status {
                LinkStatus::Matched => resolution
                    .display_name()
                    .and_then(|name| roster.find_by_name(name))
                    .cloned(),
                _ => None,
            };

            if status == LinkStatus::Matched && candidate.is_none() {
                warn!(
                    sender = %email.sender,
                    candidate = resolution.display_name().unwrap_or_default(),
                    "matched name has no roster record"
                );
            }

            LinkedEmail {
                email,
                resolution,
                status,
                candidate,
            }
        })
        .collect()
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkSummary {
    pub total: usize,
    pub by_override: usize,
    pub by_fuzzy: usize,
    pub below_threshold: usize,
    pub no_address: usize,
    pub empty_roster: usize,
    /// Accepted matches whose name is missing from the roster
    pub without_roster_record: usize,
}

impl LinkSummary {
    pub fn from_rows(rows: &[LinkedEmail]) -> Self {
        let mut s = LinkSummary {
            total: rows.len(),
            ..Default::default()
        };

        for row in rows {
            match row.status {
                LinkStatus::Matched => {
                    match row.method() {
                        Some(MatchMethod::Override) => s.by_override += 1,
                        Some(MatchMethod::Fuzzy) => s.by_fuzzy += 1,
                        None => {}
                    }
                    if row.candidate.is_none() {
                        s.without_roster_record += 1;
                    }
                }
                LinkStatus::BelowThreshold => s.below_threshold += 1,
                LinkStatus::Unmatched(ResolveError::NoAddressFound) => s.no_address += 1,
                LinkStatus::Unmatched(ResolveError::EmptyRoster) => s.empty_roster += 1,
            }
        }

        s
    }

    pub fn matched(&self) -> usize {
        self.by_override + self.by_fuzzy
    }

    pub fn match_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.matched() as f64 / self.total as f64
    }

    pub fn summary(&self) -> String {
        format!(
            "{}/{} matched ({:.1}%): {} override, {} fuzzy | {} below threshold, {} no address, {} empty roster",
            self.matched(),
            self.total,
            self.match_rate() * 100.0,
            self.by_override,
            self.by_fuzzy,
            self.below_threshold,
            self.no_address,
            self.empty_roster
        )
    }
}

/// Accepted emails per candidate name, most emails first (ties by name)
pub fn emails_per_candidate(rows: &[LinkedEmail]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        if let Some(name) = row.candidate_name() {
            *counts.entry(name).or_insert(0) += 1;
        }
    }

    let mut result: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    result.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    result
}

// ============================================================================
// CSV EXPORT
// ============================================================================

#[derive(Debug, Serialize)]
struct LinkedCsvRow<'a> {
    date: &'a str,
    sender: &'a str,
    subject: &'a str,
    body: &'a str,
    links: String,
    candidate_name: &'a str,
    match_status: &'static str,
    match_method: &'static str,
    match_score: Option<u8>,
    candidate_id: &'a str,
    party: &'a str,
    incumbent_challenge: &'a str,
    state: &'a str,
    has_raised_funds: String,
    receipts: String,
}

impl<'a> From<&'a LinkedEmail> for LinkedCsvRow<'a> {
    fn from(row: &'a LinkedEmail) -> Self {
        let c = row.candidate.as_ref();
        let text = |value: Option<&'a String>| value.map(|s| s.as_str()).unwrap_or(NO_CANDIDATE);

        LinkedCsvRow {
            date: &row.email.date,
            sender: &row.email.sender,
            subject: &row.email.subject,
            body: row.email.body.as_deref().unwrap_or(""),
            links: serde_json::to_string(&row.email.links).unwrap_or_default(),
            candidate_name: row.candidate_name().unwrap_or(NO_CANDIDATE),
            match_status: row.status.code(),
            match_method: row.method().map(|m| m.as_str()).unwrap_or(""),
            match_score: row.resolution.score(),
            candidate_id: c.map(|c| c.candidate_id.as_str()).unwrap_or(NO_CANDIDATE),
            party: text(c.and_then(|c| c.party.as_ref())),
            incumbent_challenge: text(c.and_then(|c| c.incumbency_status.as_ref())),
            state: text(c.and_then(|c| c.state.as_ref())),
            has_raised_funds: c
                .map(|c| c.has_raised_funds.to_string())
                .unwrap_or_else(|| NO_CANDIDATE.to_string()),
            receipts: match c {
                Some(c) => c
                    .receipts_total
                    .map(|r| format!("{:.2}", r))
                    .unwrap_or_else(|| NO_FUNDING.to_string()),
                None => NO_CANDIDATE.to_string(),
            },
        }
    }
}

/// Write the joined dataset, one row per email
pub fn write_csv(rows: &[LinkedEmail], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create output CSV: {}", path.display()))?;

    for row in rows {
        wtr.serialize(LinkedCsvRow::from(row))
            .context("Failed to write linked email row")?;
    }
    wtr.flush()?;

    info!(rows = rows.len(), path = %path.display(), "wrote linked dataset");
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn email(sender: &str, body: Option<&str>) -> EmailRecord {
        EmailRecord::new(
            "Sat, 13 Apr 2024 10:00:00 -0400",
            sender,
            "Subject",
            body.map(|b| b.to_string()),
        )
    }

    fn roster() -> Roster {
        let mut casey = CandidateRecord::new("A", "CASEY, ROBERT P. JR.");
        casey.receipts_total = Some(2500.0);
        casey.party = Some("DEMOCRATIC PARTY".to_string());
        Roster::new(vec![casey, CandidateRecord::new("B", "HAWLEY, JOSHUA DAVID SEN")])
    }

    #[test]
    fn test_prepare_filters() {
        let config = LinkageConfig::default();
        let emails = vec![
            email("Bob Casey for PA <info@email.bobcasey.com>", Some("hi")),
            email("Bob Casey for PA <info@email.bobcasey.com>", Some("hi")),
            email("Josh Hawley <josh@hawleyformo.com>", None),
            email("Google <no-reply@accounts.google.com>", Some("security alert")),
            email("Josh Hawley <josh@hawleyformo.com>", Some("hello")),
        ];

        let (kept, report) = prepare_emails(emails, &config);

        assert_eq!(kept.len(), 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.no_body, 1);
        assert_eq!(report.blocked_sender, 1);
        assert_eq!(report.kept, 2);
    }

    #[test]
    fn test_hash_distinguishes_fields() {
        let a = email("A <a@x.com>", Some("body"));
        let mut b = a.clone();
        b.subject = "Other".to_string();
        assert_ne!(email_hash(&a), email_hash(&b));
        assert_eq!(email_hash(&a), email_hash(&a.clone()));
    }

    #[test]
    fn test_link_joins_roster_record() {
        let resolver = IdentityResolver::with_defaults().unwrap();
        let rows = link(
            vec![
                email("Bob Casey for PA <info@email.bobcasey.com>", Some("x")),
                email("no brackets", Some("y")),
            ],
            &roster(),
            &resolver,
            None,
        );

        assert_eq!(rows[0].status, LinkStatus::Matched);
        assert_eq!(rows[0].candidate.as_ref().unwrap().candidate_id, "A");
        assert_eq!(rows[1].status, LinkStatus::Unmatched(ResolveError::NoAddressFound));
        assert!(rows[1].candidate.is_none());
        assert_eq!(rows[1].candidate_name(), None);
    }

    #[test]
    fn test_threshold_applies_to_fuzzy_only() {
        let resolver = IdentityResolver::with_defaults().unwrap();
        let rows = link(
            vec![
                email("Bob Casey for PA <info@email.bobcasey.com>", Some("x")),
                email("Nobody <qqqq@zzzz.com>", Some("y")),
            ],
            &roster(),
            &resolver,
            Some(60),
        );

        assert_eq!(rows[0].status, LinkStatus::Matched);
        assert_eq!(rows[1].status, LinkStatus::BelowThreshold);
        // Raw score is still reported
        assert_eq!(rows[1].resolution.score(), Some(0));
        assert!(rows[1].candidate.is_none());
    }

    #[test]
    fn test_override_without_roster_record() {
        let resolver = IdentityResolver::with_defaults().unwrap();
        let rows = link(
            vec![email("Tammy <info@e.tammybaldwin.com>", Some("x"))],
            &roster(),
            &resolver,
            None,
        );

        let summary = LinkSummary::from_rows(&rows);
        assert_eq!(summary.by_override, 1);
        assert_eq!(summary.without_roster_record, 1);
        assert_eq!(rows[0].candidate_name(), Some("BALDWIN, TAMMY"));
    }

    #[test]
    fn test_summary_and_counts() {
        let resolver = IdentityResolver::with_defaults().unwrap();
        let rows = link(
            vec![
                email("Bob Casey for PA <info@email.bobcasey.com>", Some("1")),
                email("Bob Casey for PA <info@email.bobcasey.com>", Some("2")),
                email("Josh Hawley Campaign <josh@hawleyformo.com>", Some("3")),
                email("broken", Some("4")),
            ],
            &roster(),
            &resolver,
            None,
        );

        let summary = LinkSummary::from_rows(&rows);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.matched(), 3);
        assert_eq!(summary.no_address, 1);
        assert!((summary.match_rate() - 0.75).abs() < 1e-9);

        let counts = emails_per_candidate(&rows);
        assert_eq!(counts[0], ("CASEY, ROBERT P. JR.".to_string(), 2));
        assert_eq!(counts[1], ("HAWLEY, JOSHUA DAVID SEN".to_string(), 1));
    }

    #[test]
    fn test_write_csv_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linked.csv");
        let resolver = IdentityResolver::with_defaults().unwrap();
        let rows = link(
            vec![
                email("Bob Casey for PA <info@email.bobcasey.com>", Some("see https://a.com")),
                email("Josh Hawley Campaign <josh@hawleyformo.com>", Some("x")),
                email("broken", Some("y")),
            ],
            &roster(),
            &resolver,
            None,
        );

        write_csv(&rows, &path).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        let col = |name: &str| headers.iter().position(|h| h == name).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(&records[0][col("receipts")], "2500.00");
        assert_eq!(&records[0][col("links")], r#"["https://a.com"]"#);
        assert_eq!(&records[0][col("match_method")], "override");
        assert_eq!(&records[1][col("receipts")], NO_FUNDING);
        assert_eq!(&records[2][col("candidate_name")], NO_CANDIDATE);
        assert_eq!(&records[2][col("match_status")], "no_address");
    }
}
