// End-to-end: saved Gmail messages + saved FEC pages → linked CSV + SQLite

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use campaign_linkage::{
    candidate_stats, count_emails, insert_linked_emails, link, prepare_emails, setup_database,
    write_csv, FecPageDirProvider, GmailJsonDir, IdentityResolver, LinkStatus, LinkSummary,
    LinkageConfig, MailboxProvider, MatchMethod, Roster, RosterProvider,
};
use rusqlite::Connection;
use serde_json::json;
use std::fs;
use std::path::Path;

fn gmail_message(id: &str, from: &str, subject: &str, body: Option<&str>) -> serde_json::Value {
    let parts = match body {
        Some(text) => json!([
            {"mimeType": "text/html", "body": {"data": URL_SAFE_NO_PAD.encode(format!("<p>{}</p>", text))}},
            {"mimeType": "text/plain", "body": {"data": URL_SAFE_NO_PAD.encode(text)}}
        ]),
        None => json!([]),
    };

    json!({
        "id": id,
        "payload": {
            "mimeType": "multipart/alternative",
            "headers": [
                {"name": "From", "value": from},
                {"name": "Subject", "value": subject},
                {"name": "Date", "value": "Sat, 13 Apr 2024 10:00:00 -0400"}
            ],
            "body": {"size": 0},
            "parts": parts
        }
    })
}

fn write_json(dir: &Path, name: &str, value: &serde_json::Value) {
    fs::write(dir.join(name), serde_json::to_string(value).unwrap()).unwrap();
}

fn write_mailbox(dir: &Path) {
    let casey = gmail_message(
        "m1",
        "Bob Casey for PA <info@email.bobcasey.com>",
        "Chip in",
        Some("Chip in: https://secure.actblue.com/donate/casey now"),
    );
    write_json(dir, "01_casey.json", &casey);
    write_json(
        dir,
        "02_hogan.json",
        &gmail_message("m2", "Larry Hogan <hogan.larry@mail.org>", "Maryland", Some("Vote")),
    );
    write_json(
        dir,
        "03_broken.json",
        &gmail_message("m3", "undisclosed-sender", "???", Some("hello")),
    );
    // Same headers and body as m1
    write_json(dir, "04_casey_dup.json", &casey);
    write_json(
        dir,
        "05_google.json",
        &gmail_message("m5", "Google <no-reply@accounts.google.com>", "Security alert", Some("x")),
    );
    write_json(
        dir,
        "06_nobody.json",
        &gmail_message("m6", "Someone <someone@site.com>", "Empty", None),
    );
}

fn write_fec_pages(candidates_dir: &Path, totals_dir: &Path) {
    write_json(
        candidates_dir,
        "page_001.json",
        &json!({
            "results": [
                {"candidate_id": "S4PA00121", "name": "CASEY, ROBERT P. JR.", "party_full": "DEMOCRATIC PARTY",
                 "incumbent_challenge_full": "Incumbent", "state": "PA", "has_raised_funds": true},
                {"candidate_id": "S8MO00160", "name": "HAWLEY, JOSHUA DAVID SEN", "party_full": "REPUBLICAN PARTY",
                 "incumbent_challenge_full": "Incumbent", "state": "MO", "has_raised_funds": true}
            ],
            "pagination": {"page": 1, "pages": 2, "count": 4}
        }),
    );
    write_json(
        candidates_dir,
        "page_002.json",
        &json!({
            "results": [
                {"candidate_id": "S4MD00327", "name": "HOGAN, LARRY", "party_full": "REPUBLICAN PARTY",
                 "incumbent_challenge_full": "Open seat", "state": "MD", "has_raised_funds": true},
                {"candidate_id": "S4PA00121", "name": "CASEY, ROBERT P. JR.", "state": "PA"}
            ],
            "pagination": {"page": 2, "pages": 2, "count": 4}
        }),
    );
    write_json(
        totals_dir,
        "page_001.json",
        &json!({
            "results": [
                {"candidate_id": "S4PA00121", "name": "CASEY, ROBERT P. JR.", "receipts": 1000.5},
                {"candidate_id": "S4PA00121", "name": "CASEY, ROBERT P. JR.", "receipts": 5.0}
            ],
            "pagination": {"page": 1, "pages": 1, "count": 2}
        }),
    );
}

fn load_roster(root: &Path) -> Roster {
    let candidates_dir = root.join("candidates");
    let totals_dir = root.join("totals");
    fs::create_dir_all(&candidates_dir).unwrap();
    fs::create_dir_all(&totals_dir).unwrap();
    write_fec_pages(&candidates_dir, &totals_dir);

    FecPageDirProvider {
        candidates_dir,
        receipts_dir: Some(totals_dir),
    }
    .load_roster()
    .unwrap()
}

#[test]
fn test_fec_pages_build_deduplicated_roster() {
    let root = tempfile::tempdir().unwrap();
    let roster = load_roster(root.path());

    assert_eq!(roster.len(), 3);
    let casey = roster.find_by_id("S4PA00121").unwrap();
    assert_eq!(casey.receipts_total, Some(1000.5));
    assert_eq!(casey.party.as_deref(), Some("DEMOCRATIC PARTY"));
    assert_eq!(roster.find_by_id("S4MD00327").unwrap().receipts_total, None);
}

#[test]
fn test_mailbox_to_csv_and_sqlite() {
    let root = tempfile::tempdir().unwrap();
    let mailbox = root.path().join("mail");
    fs::create_dir_all(&mailbox).unwrap();
    write_mailbox(&mailbox);
    let roster = load_roster(root.path());

    let config = LinkageConfig::default();
    let emails = GmailJsonDir { dir: mailbox }.messages().unwrap();
    assert_eq!(emails.len(), 6);

    let (emails, report) = prepare_emails(emails, &config);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.no_body, 1);
    assert_eq!(report.blocked_sender, 1);
    assert_eq!(report.kept, 3);

    let resolver = IdentityResolver::from_config(&config).unwrap();
    let rows = link(emails, &roster, &resolver, config.min_score);
    assert_eq!(rows.len(), 3);

    assert_eq!(rows[0].candidate_name(), Some("CASEY, ROBERT P. JR."));
    assert_eq!(rows[0].method(), Some(MatchMethod::Override));
    assert_eq!(rows[0].email.links, vec!["https://secure.actblue.com/donate/casey"]);

    assert_eq!(rows[1].candidate_name(), Some("HOGAN, LARRY"));
    assert_eq!(rows[1].method(), Some(MatchMethod::Fuzzy));
    assert_eq!(rows[1].resolution.score(), Some(100));

    assert_eq!(rows[2].candidate_name(), None);
    assert_eq!(rows[2].status.code(), "no_address");

    let summary = LinkSummary::from_rows(&rows);
    assert_eq!(summary.by_override, 1);
    assert_eq!(summary.by_fuzzy, 1);
    assert_eq!(summary.no_address, 1);

    // CSV export
    let csv_path = root.path().join("linked.csv");
    write_csv(&rows, &csv_path).unwrap();

    let mut rdr = csv::Reader::from_path(&csv_path).unwrap();
    let headers = rdr.headers().unwrap().clone();
    let column = |name: &str| headers.iter().position(|h| h == name).unwrap();
    let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();

    assert_eq!(records.len(), 3);
    assert_eq!(&records[0][column("receipts")], "1000.50");
    assert_eq!(&records[0][column("links")], r#"["https://secure.actblue.com/donate/casey"]"#);
    assert_eq!(&records[1][column("receipts")], "No Funding Found");
    assert_eq!(&records[2][column("candidate_name")], "No Candidate Found");

    // SQLite, imported twice
    let db_path = root.path().join("linkage.db");
    let mut conn = Connection::open(&db_path).unwrap();
    setup_database(&conn).unwrap();

    assert_eq!(insert_linked_emails(&mut conn, &rows).unwrap(), 3);
    assert_eq!(insert_linked_emails(&mut conn, &rows).unwrap(), 0);
    assert_eq!(count_emails(&conn).unwrap(), 3);

    let stats = candidate_stats(&conn).unwrap();
    let names: Vec<&str> = stats.iter().map(|s| s.candidate_name.as_str()).collect();
    assert_eq!(names, vec!["CASEY, ROBERT P. JR.", "HOGAN, LARRY"]);
}

#[test]
fn test_config_file_changes_overrides_and_threshold() {
    let root = tempfile::tempdir().unwrap();
    let roster = load_roster(root.path());

    let config_path = root.path().join("linkage.json");
    fs::write(
        &config_path,
        r#"{"overrides": [{"pattern": "@mail.org", "canonical_name": "HOGAN, LARRY"}], "min_score": 90}"#,
    )
    .unwrap();
    let config = LinkageConfig::from_file(&config_path).unwrap();
    let resolver = IdentityResolver::from_config(&config).unwrap();

    let emails = vec![
        campaign_linkage::EmailRecord::new("d", "Josh Hawley Campaign <josh@hawleyformo.com>", "s", Some("b".into())),
        campaign_linkage::EmailRecord::new("d", "Governor <gov@mail.org>", "s", Some("b".into())),
    ];
    let rows = link(emails, &roster, &resolver, config.min_score);

    // Default Hawley override is gone: fuzzy result, under the configured minimum
    assert!(rows[0].resolution.is_matched());
    assert_eq!(rows[0].method(), Some(MatchMethod::Fuzzy));
    assert_eq!(rows[0].status, LinkStatus::BelowThreshold);
    assert_eq!(rows[0].candidate_name(), None);

    // Overrides are never held to the threshold
    assert_eq!(rows[1].status, LinkStatus::Matched);
    assert_eq!(rows[1].candidate_name(), Some("HOGAN, LARRY"));
    assert_eq!(rows[1].candidate.as_ref().unwrap().state.as_deref(), Some("MD"));
}

#[test]
fn test_roster_csv_feeds_resolution() {
    let root = tempfile::tempdir().unwrap();
    let roster = load_roster(root.path());

    let roster_path = root.path().join("roster.csv");
    roster.to_csv(&roster_path).unwrap();
    let reloaded = Roster::from_csv(&roster_path).unwrap();
    assert_eq!(reloaded, roster);

    let resolver = IdentityResolver::from_config(&LinkageConfig {
        overrides: vec![],
        ..LinkageConfig::default()
    })
    .unwrap();
    let result = resolver.resolve("Josh Hawley Campaign <josh@hawleyformo.com>", &reloaded);
    assert_eq!(result.display_name(), Some("HAWLEY, JOSHUA DAVID SEN"));
}
