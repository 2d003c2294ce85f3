// Campaign Linkage - Core Library
// Sender string → FEC candidate identity, plus the batch pipeline around it

pub mod error;
pub mod overrides;    // Known sender patterns → canonical names
pub mod normalizer;   // Address residue extraction
pub mod fuzzy;        // Partial token-sort scoring
pub mod resolver;     // Override → normalize → fuzzy pipeline
pub mod candidate;    // Roster, FEC payloads, receipts merge
pub mod config;
pub mod mailbox;      // Email records, Gmail message parsing
pub mod dataset;      // Prepare, link, summarize, CSV export
pub mod db;

#[cfg(feature = "fetch")]
pub mod fec;          // Live FEC API client

#[cfg(feature = "tui")]
pub mod ui;

use tracing_subscriber::EnvFilter;

// Re-export commonly used types
pub use error::ResolveError;
pub use overrides::{default_overrides, OverrideEntry, OverrideTable};
pub use normalizer::{default_denylist, Normalizer};
pub use fuzzy::{partial_token_sort_ratio, FuzzyMatch, FuzzyResolver};
pub use resolver::{CandidateMatch, IdentityResolver, MatchMethod, ResolutionResult};
pub use candidate::{
    merge_receipts, CandidateRecord, CsvRosterProvider, FecPageDirProvider, ReceiptsRecord,
    Roster, RosterProvider,
};
pub use config::LinkageConfig;
pub use mailbox::{EmailCsv, EmailRecord, GmailJsonDir, MailboxProvider};
pub use dataset::{
    emails_per_candidate, link, prepare_emails, write_csv, LinkStatus, LinkSummary, LinkedEmail,
    PrepareReport,
};
pub use db::{
    candidate_stats, count_emails, get_all_linked_emails, get_email, get_emails_for_candidate, get_events,
    insert_event, insert_linked_emails, setup_database, CandidateStat, Event, StoredEmail,
};

#[cfg(feature = "fetch")]
pub use fec::FecClient;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log to stderr; RUST_LOG overrides the default `campaign_linkage=info`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("campaign_linkage=info,linkage_server=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
