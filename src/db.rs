use crate::dataset::{email_hash, LinkedEmail};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// One linked email as stored in SQLite (flattened for the UI and API)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEmail {
    /// Stable identity (UUID)
    pub id: String,
    pub date: String,
    pub sender: String,
    pub subject: String,
    pub body: Option<String>,
    pub links: Vec<String>,

    // ========================================================================
    // RESOLUTION
    // ========================================================================
    /// matched / below_threshold / no_address / empty_roster
    pub match_status: String,
    pub match_method: Option<String>,
    pub match_score: Option<u8>,
    /// Accepted candidate name (None unless matched)
    pub candidate_name: Option<String>,

    // ========================================================================
    // JOINED CANDIDATE FIELDS
    // ========================================================================
    pub candidate_id: Option<String>,
    pub party: Option<String>,
    pub state: Option<String>,
    pub receipts: Option<f64>,

    pub resolved_at: DateTime<Utc>,
}

impl StoredEmail {
    pub fn is_matched(&self) -> bool {
        self.match_status == "matched"
    }

    pub fn is_override(&self) -> bool {
        self.match_method.as_deref() == Some("override")
    }
}

/// Event for audit trail (one per link run / import)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(event_type: &str, data: serde_json::Value, actor: &str) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Emails per candidate, for summaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStat {
    pub candidate_name: String,
    pub candidate_id: Option<String>,
    pub party: Option<String>,
    pub state: Option<String>,
    pub email_count: i64,
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Emails Table (email fields + resolution + joined candidate)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS emails (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email_uuid TEXT UNIQUE NOT NULL,
            idempotency_hash TEXT UNIQUE NOT NULL,
            date TEXT NOT NULL,
            sender TEXT NOT NULL,
            subject TEXT NOT NULL,
            body TEXT,
            links TEXT NOT NULL,
            match_status TEXT NOT NULL,
            match_method TEXT,
            match_score INTEGER,
            candidate_name TEXT,
            candidate_id TEXT,
            party TEXT,
            state TEXT,
            receipts REAL,
            resolved_at TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_emails_candidate ON emails(candidate_name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_emails_status ON emails(match_status)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

/// Insert linked emails, skipping any already stored (same idempotency hash).
/// Returns the number inserted.
pub fn insert_linked_emails(conn: &mut Connection, rows: &[LinkedEmail]) -> Result<usize> {
    let resolved_at = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;
    let mut inserted = 0;

    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO emails (
                email_uuid, idempotency_hash, date, sender, subject, body, links,
                match_status, match_method, match_score, candidate_name,
                candidate_id, party, state, receipts, resolved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        )?;

        for row in rows {
            let candidate = row.candidate.as_ref();
            let links = serde_json::to_string(&row.email.links)?;

            let changed = stmt.execute(params![
                uuid::Uuid::new_v4().to_string(),
                email_hash(&row.email),
                row.email.date,
                row.email.sender,
                row.email.subject,
                row.email.body,
                links,
                row.status.code(),
                row.method().map(|m| m.as_str()),
                row.resolution.score(),
                row.candidate_name(),
                candidate.map(|c| c.candidate_id.as_str()),
                candidate.and_then(|c| c.party.as_deref()),
                candidate.and_then(|c| c.state.as_deref()),
                candidate.and_then(|c| c.receipts_total),
                resolved_at,
            ])?;
            inserted += changed;
        }
    }

    tx.commit()?;
    Ok(inserted)
}

fn row_to_stored_email(row: &rusqlite::Row) -> rusqlite::Result<StoredEmail> {
    let links: String = row.get(5)?;
    let resolved_at: String = row.get(14)?;

    Ok(StoredEmail {
        id: row.get(0)?,
        date: row.get(1)?,
        sender: row.get(2)?,
        subject: row.get(3)?,
        body: row.get(4)?,
        links: serde_json::from_str(&links).unwrap_or_default(),
        match_status: row.get(6)?,
        match_method: row.get(7)?,
        match_score: row.get(8)?,
        candidate_name: row.get(9)?,
        candidate_id: row.get(10)?,
        party: row.get(11)?,
        state: row.get(12)?,
        receipts: row.get(13)?,
        resolved_at: DateTime::parse_from_rfc3339(&resolved_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

const SELECT_EMAILS: &str = "SELECT email_uuid, date, sender, subject, body, links,
        match_status, match_method, match_score, candidate_name,
        candidate_id, party, state, receipts, resolved_at
     FROM emails";

pub fn get_all_linked_emails(conn: &Connection) -> Result<Vec<StoredEmail>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_EMAILS))?;
    let emails = stmt
        .query_map([], row_to_stored_email)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read emails")?;
    Ok(emails)
}

pub fn get_emails_for_candidate(conn: &Connection, candidate_name: &str) -> Result<Vec<StoredEmail>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE candidate_name = ?1 ORDER BY id",
        SELECT_EMAILS
    ))?;
    let emails = stmt
        .query_map([candidate_name], row_to_stored_email)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read candidate emails")?;
    Ok(emails)
}

pub fn get_email(conn: &Connection, email_uuid: &str) -> Result<Option<StoredEmail>> {
    let mut stmt = conn.prepare(&format!("{} WHERE email_uuid = ?1", SELECT_EMAILS))?;
    let email = stmt
        .query_row([email_uuid], row_to_stored_email)
        .optional()?;
    Ok(email)
}

pub fn count_emails(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM emails", [], |row| row.get(0))?;
    Ok(count)
}

/// Matched emails grouped by candidate, most emails first
pub fn candidate_stats(conn: &Connection) -> Result<Vec<CandidateStat>> {
    let mut stmt = conn.prepare(
        "SELECT candidate_name, MAX(candidate_id), MAX(party), MAX(state), COUNT(*) as n
         FROM emails
         WHERE candidate_name IS NOT NULL
         GROUP BY candidate_name
         ORDER BY n DESC, candidate_name",
    )?;

    let stats = stmt
        .query_map([], |row| {
            Ok(CandidateStat {
                candidate_name: row.get(0)?,
                candidate_id: row.get(1)?,
                party: row.get(2)?,
                state: row.get(3)?,
                email_count: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(stats)
}

pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    conn.execute(
        "INSERT INTO events (event_id, timestamp, event_type, data, actor)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            serde_json::to_string(&event.data)?,
            event.actor,
        ],
    )?;
    Ok(())
}

pub fn get_events(conn: &Connection, event_type: &str) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, data, actor
         FROM events WHERE event_type = ?1 ORDER BY id",
    )?;

    let events = stmt
        .query_map([event_type], |row| {
            let timestamp: String = row.get(1)?;
            let data: String = row.get(3)?;
            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                event_type: row.get(2)?,
                data: serde_json::from_str(&data).unwrap_or(serde_json::Value::Null),
                actor: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(events)
}
