use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::warn;

use campaign_linkage::{
    count_emails, init_tracing, insert_event, insert_linked_emails, link, prepare_emails,
    setup_database, write_csv, CsvRosterProvider, EmailCsv, EmailRecord, Event, FecPageDirProvider,
    GmailJsonDir, IdentityResolver, LinkSummary, LinkageConfig, LinkedEmail, MailboxProvider,
    ResolutionResult, Roster, RosterProvider,
};

#[derive(Parser)]
#[command(name = "campaign-linkage", version)]
#[command(about = "Link campaign email senders to FEC Senate candidates")]
struct Cli {
    /// Linkage config JSON (overrides, denylist, sender blocklist, min_score)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct RosterArgs {
    /// Roster CSV (as written by fetch-roster)
    #[arg(long, conflicts_with = "fec_pages")]
    roster: Option<PathBuf>,

    /// Directory of saved /v1/candidates/ JSON pages
    #[arg(long)]
    fec_pages: Option<PathBuf>,

    /// Directory of saved /v1/candidates/totals/ JSON pages
    #[arg(long, requires = "fec_pages")]
    fec_totals: Option<PathBuf>,
}

impl RosterArgs {
    fn load(&self) -> Result<Roster> {
        let provider: Box<dyn RosterProvider> = match (&self.roster, &self.fec_pages) {
            (Some(path), _) => Box::new(CsvRosterProvider { path: path.clone() }),
            (None, Some(dir)) => Box::new(FecPageDirProvider {
                candidates_dir: dir.clone(),
                receipts_dir: self.fec_totals.clone(),
            }),
            (None, None) => {
                warn!("no roster given, only overrides can match");
                return Ok(Roster::default());
            }
        };
        provider.load_roster()
    }
}

#[derive(Args)]
struct LinkArgs {
    /// Email CSV (Date,Sender,Subject,Body) or a directory of Gmail message JSON files
    #[arg(long)]
    emails: PathBuf,

    #[command(flatten)]
    roster: RosterArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve sender strings and print the match for each
    Resolve {
        /// e.g. "Bob Casey for PA <info@email.bobcasey.com>"
        #[arg(required = true)]
        senders: Vec<String>,

        #[command(flatten)]
        roster: RosterArgs,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Prepare and link an email export, write the linked CSV
    Link {
        #[command(flatten)]
        input: LinkArgs,

        #[arg(long, default_value = "linked_emails.csv")]
        out: PathBuf,
    },
    /// Link an email export and store the rows in SQLite
    Import {
        #[command(flatten)]
        input: LinkArgs,

        #[arg(long, default_value = "linkage.db")]
        db: PathBuf,

        /// Also write the linked CSV
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Browse stored linked emails
    #[cfg(feature = "tui")]
    Ui {
        #[arg(long, default_value = "linkage.db")]
        db: PathBuf,
    },
    /// Download the Senate roster from the FEC API and save it as CSV
    #[cfg(feature = "fetch")]
    FetchRoster {
        #[arg(long, default_value_t = 2024)]
        year: i32,

        #[arg(long, env = "FEC_API_KEY", hide_env_values = true)]
        api_key: String,

        #[arg(long, default_value = "roster.csv")]
        out: PathBuf,

        /// Seconds to wait between page requests
        #[arg(long, default_value_t = 0)]
        delay_secs: u64,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = LinkageConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Command::Resolve { senders, roster, json } => run_resolve(&config, &senders, &roster, json),
        Command::Link { input, out } => run_link(&config, &input, &out),
        Command::Import { input, db, out } => run_import(&config, &input, &db, out.as_deref()),
        #[cfg(feature = "tui")]
        Command::Ui { db } => run_ui_mode(&db),
        #[cfg(feature = "fetch")]
        Command::FetchRoster { year, api_key, out, delay_secs } => {
            run_fetch_roster(year, &api_key, &out, delay_secs)
        }
    }
}

fn load_emails(path: &Path) -> Result<Vec<EmailRecord>> {
    if path.is_dir() {
        GmailJsonDir { dir: path.to_path_buf() }.messages()
    } else {
        EmailCsv::new(path).messages()
    }
}

fn run_resolve(config: &LinkageConfig, senders: &[String], roster_args: &RosterArgs, json: bool) -> Result<()> {
    let roster = roster_args.load()?;
    let resolver = IdentityResolver::from_config(config)?;
    let results = resolver.resolve_batch(senders, &roster);

    if json {
        let rows: Vec<serde_json::Value> = senders
            .iter()
            .zip(&results)
            .map(|(sender, result)| serde_json::json!({ "sender": sender, "result": result }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for (sender, result) in senders.iter().zip(&results) {
        match result {
            ResolutionResult::Matched(m) => {
                let detail = match m.score {
                    Some(score) if m.tie_count > 1 => {
                        format!("{}, score {}, {} tied", m.method.as_str(), score, m.tie_count)
                    }
                    Some(score) => format!("{}, score {}", m.method.as_str(), score),
                    None => m.method.as_str().to_string(),
                };
                println!("✓ {} → {} ({})", sender, m.display_name, detail);
            }
            ResolutionResult::Unmatched(reason) => {
                println!("✗ {} → unmatched ({})", sender, reason.code());
            }
        }
    }

    Ok(())
}

/// Load, prepare, resolve and join; prints progress as it goes
fn run_pipeline(config: &LinkageConfig, input: &LinkArgs) -> Result<(Vec<LinkedEmail>, LinkSummary)> {
    println!("\n📂 Loading emails...");
    let emails = load_emails(&input.emails)?;
    println!("✓ Loaded {} emails from {:?}", emails.len(), input.emails);

    println!("\n🧹 Preparing...");
    let (emails, report) = prepare_emails(emails, config);
    println!("✓ {}", report.summary());

    println!("\n🗳️  Loading roster...");
    let roster = input.roster.load()?;
    println!("✓ Roster has {} candidates", roster.len());

    println!("\n🔗 Resolving senders...");
    let resolver = IdentityResolver::from_config(config)?;
    let rows = link(emails, &roster, &resolver, config.min_score);
    let summary = LinkSummary::from_rows(&rows);
    println!("✓ {}", summary.summary());

    Ok((rows, summary))
}

fn run_link(config: &LinkageConfig, input: &LinkArgs, out: &Path) -> Result<()> {
    println!("🔗 Campaign Linkage - Emails → Candidates");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let (rows, _) = run_pipeline(config, input)?;

    println!("\n💾 Writing CSV...");
    write_csv(&rows, out)?;
    println!("✓ Wrote {} rows to {:?}", rows.len(), out);

    Ok(())
}

fn run_import(config: &LinkageConfig, input: &LinkArgs, db_path: &Path, out: Option<&Path>) -> Result<()> {
    println!("🗄️  Campaign Linkage - Import → SQLite + WAL");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let (rows, summary) = run_pipeline(config, input)?;

    if let Some(out) = out {
        write_csv(&rows, out)?;
        println!("✓ Wrote {} rows to {:?}", rows.len(), out);
    }

    println!("\n🔧 Setting up database...");
    let mut conn = Connection::open(db_path)?;
    setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode");

    println!("\n💾 Inserting linked emails...");
    let inserted = insert_linked_emails(&mut conn, &rows)?;
    insert_event(
        &conn,
        &Event::new(
            "link_run",
            serde_json::json!({
                "source": input.emails.display().to_string(),
                "inserted": inserted,
                "summary": summary,
            }),
            "cli",
        ),
    )?;

    println!("\n🔍 Verifying database...");
    let count = count_emails(&conn)?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Import complete");
    println!("✓ New emails stored: {}", inserted);
    println!("✓ Already stored:    {}", rows.len() - inserted);
    println!("✓ Database contains {} emails", count);

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(db_path: &Path) -> Result<()> {
    use campaign_linkage::{candidate_stats, get_all_linked_emails, ui};

    println!("🖥️  Loading Campaign Linkage UI...\n");

    if !db_path.exists() {
        eprintln!("❌ Database not found at {:?}", db_path);
        eprintln!("   Run: campaign-linkage import --emails <path> --roster <csv>");
        eprintln!("   to store linked emails first.");
        std::process::exit(1);
    }

    let conn = Connection::open(db_path)?;

    println!("📊 Loading linked emails...");
    let emails = get_all_linked_emails(&conn)?;
    let stats = candidate_stats(&conn)?;
    let total_count = count_emails(&conn)?;

    println!("✓ Loaded {} emails, {} candidates\n", emails.len(), stats.len());
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(emails, stats, total_count);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(feature = "fetch")]
fn run_fetch_roster(year: i32, api_key: &str, out: &Path, delay_secs: u64) -> Result<()> {
    use campaign_linkage::FecClient;
    use std::time::Duration;

    println!("🏛️  FEC Roster - Senate candidates {}", year);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if api_key.is_empty() {
        anyhow::bail!("FEC API key is empty (use --api-key or FEC_API_KEY)");
    }

    let client = FecClient::new(api_key)?.with_page_delay(Duration::from_secs(delay_secs));
    let runtime = tokio::runtime::Runtime::new()?;

    println!("\n🌐 Fetching candidates and receipts...");
    let roster = runtime.block_on(client.fetch_roster(year))?;
    let funded = roster.iter().filter(|c| c.receipts_total.is_some()).count();
    println!("✓ {} candidates ({} with receipts)", roster.len(), funded);

    roster.to_csv(out)?;
    println!("✓ Saved roster to {:?}", out);

    Ok(())
}
