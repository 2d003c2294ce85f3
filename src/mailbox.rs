// 📬 Mailbox - Campaign emails as structured records
//
// Input: Gmail API messages (users.messages.get, format=full) saved as JSON,
// or a CSV export with Date,Sender,Subject,Body columns.
//
// Extracted per message: date, sender (From header), subject, body, links.
// Authentication and message listing happen outside this crate.

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

// ============================================================================
// EMAIL RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Gmail message id when known
    pub message_id: Option<String>,

    /// Raw Date header
    pub date: String,

    /// Raw From header - the string that gets resolved to a candidate
    pub sender: String,

    pub subject: String,

    /// Decoded body (None = no text/plain or text/html part found)
    pub body: Option<String>,

    /// http(s) URLs found in the body, in order of appearance
    pub links: Vec<String>,
}

impl EmailRecord {
    pub fn new(date: &str, sender: &str, subject: &str, body: Option<String>) -> Self {
        let links = body.as_deref().map(find_links).unwrap_or_default();
        EmailRecord {
            message_id: None,
            date: date.to_string(),
            sender: sender.to_string(),
            subject: subject.to_string(),
            body,
            links,
        }
    }
}

// ============================================================================
// LINKS
// ============================================================================

fn link_pattern() -> &'static Regex {
    static LINK_RE: OnceLock<Regex> = OnceLock::new();
    LINK_RE.get_or_init(|| Regex::new(r"https?://[^\s]+").expect("link pattern is valid"))
}

/// Every http(s) URL in `text` (runs up to the next whitespace)
pub fn find_links(text: &str) -> Vec<String> {
    link_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

// ============================================================================
// GMAIL MESSAGE PAYLOAD
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GmailMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub payload: GmailPart,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailPart {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub headers: Vec<GmailHeader>,
    #[serde(default)]
    pub body: Option<GmailBody>,
    #[serde(default)]
    pub parts: Vec<GmailPart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GmailHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GmailBody {
    #[serde(default)]
    pub data: Option<String>,
}

impl GmailPart {
    /// Header value by case-insensitive name (last occurrence wins)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    fn data(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .filter(|d| !d.is_empty())
    }

    /// Depth-first search for the first part of `mime` carrying data
    fn find_data(&self, mime: &str) -> Option<&str> {
        if self.mime_type.as_deref() == Some(mime) {
            if let Some(data) = self.data() {
                return Some(data);
            }
        }
        self.parts.iter().find_map(|p| p.find_data(mime))
    }
}

/// base64url (padding optional) → text, invalid UTF-8 replaced
pub fn decode_body(data: &str) -> Result<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(data.trim().trim_end_matches('='))
        .context("Failed to decode base64url body")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Turn a Gmail message into an EmailRecord. Plain text is preferred over
/// HTML; an undecodable body counts as no body.
pub fn parse_gmail_message(message: &GmailMessage) -> EmailRecord {
    let payload = &message.payload;

    let body = payload
        .find_data("text/plain")
        .or_else(|| payload.find_data("text/html"))
        .and_then(|data| match decode_body(data) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(message_id = ?message.id, error = %e, "undecodable body");
                None
            }
        });

    let mut record = EmailRecord::new(
        payload.header("date").unwrap_or(""),
        payload.header("from").unwrap_or(""),
        payload.header("subject").unwrap_or(""),
        body,
    );
    record.message_id = message.id.clone();
    record
}

pub fn parse_gmail_json(json: &str) -> Result<EmailRecord> {
    let message: GmailMessage =
        serde_json::from_str(json).context("Failed to parse Gmail message JSON")?;
    Ok(parse_gmail_message(&message))
}

// ============================================================================
// MAILBOX PROVIDERS
// ============================================================================

/// Supplies already-fetched emails. Transport, auth and paging are the
/// provider's concern; senders arrive as plain (possibly empty) strings.
pub trait MailboxProvider {
    fn messages(&self) -> Result<Vec<EmailRecord>>;
}

/// Directory of Gmail API message JSON files (read in file-name order)
pub struct GmailJsonDir {
    pub dir: PathBuf,
}

impl MailboxProvider for GmailJsonDir {
    fn messages(&self) -> Result<Vec<EmailRecord>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read mailbox directory: {}", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        files.sort();

        let mut emails = Vec::with_capacity(files.len());
        let mut skipped = 0;
        for file in &files {
            let parsed = fs::read_to_string(file)
                .with_context(|| format!("Failed to read {}", file.display()))
                .and_then(|content| parse_gmail_json(&content));
            match parsed {
                Ok(email) => emails.push(email),
                Err(e) => {
                    warn!(file = %file.display(), error = %format!("{:#}", e), "skipping message file");
                    skipped += 1;
                }
            }
        }

        info!(count = emails.len(), skipped, dir = %self.dir.display(), "loaded Gmail messages");
        Ok(emails)
    }
}

#[derive(Debug, Deserialize)]
struct EmailCsvRow {
    #[serde(rename = "Date", default)]
    date: String,
    #[serde(rename = "Sender", default)]
    sender: String,
    #[serde(rename = "Subject", default)]
    subject: String,
    #[serde(rename = "Body", default)]
    body: Option<String>,
}

/// Body cell written by the export when a message had no readable body
pub const NO_BODY: &str = "No Body Found";

/// CSV export with Date,Sender,Subject,Body columns (extra columns ignored).
/// An empty Body cell or the `No Body Found` placeholder means no body.
pub struct EmailCsv {
    pub path: PathBuf,
}

impl EmailCsv {
    pub fn new(path: &Path) -> Self {
        EmailCsv { path: path.to_path_buf() }
    }
}

impl MailboxProvider for EmailCsv {
    fn messages(&self) -> Result<Vec<EmailRecord>> {
        let mut rdr = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open email CSV: {}", self.path.display()))?;

        let mut emails = Vec::new();
        for (line_num, result) in rdr.deserialize().enumerate() {
            let row: EmailCsvRow = result.with_context(|| {
                format!("Failed to parse email CSV line {}", line_num + 2)
            })?;
            let body = row.body.filter(|b| !b.is_empty() && b != NO_BODY);
            emails.push(EmailRecord::new(&row.date, &row.sender, &row.subject, body));
        }

        info!(count = emails.len(), path = %self.path.display(), "loaded email CSV");
        Ok(emails)
    }
}

// ============================================================================
// TESTS
// ============================================================================
