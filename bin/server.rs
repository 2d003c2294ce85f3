// Campaign Linkage - Web Server
// REST API over the linked-email database, plus on-demand sender resolution

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use campaign_linkage::{
    candidate_stats, get_all_linked_emails, get_email, get_emails_for_candidate, init_tracing, setup_database,
    CandidateStat, IdentityResolver, LinkageConfig, ResolutionResult, Roster, StoredEmail,
};
use clap::Parser;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "linkage-server", version, about = "REST API for linked campaign emails")]
struct Args {
    /// SQLite database written by `campaign-linkage import`
    #[arg(long, default_value = "linkage.db")]
    db: PathBuf,

    /// Roster CSV used by POST /api/resolve
    #[arg(long, default_value = "roster.csv")]
    roster: PathBuf,

    /// Linkage config JSON (overrides, denylist)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "0.0.0.0:3000")]
    addr: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    resolver: Arc<IdentityResolver>,
    roster: Arc<Roster>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    fn err(data: T, message: String) -> Self {
        Self {
            success: false,
            data,
            error: Some(message),
        }
    }
}

#[derive(Deserialize)]
struct EmailQuery {
    /// all | matched | unmatched | override
    filter: Option<String>,
    candidate: Option<String>,
}

#[derive(Deserialize)]
struct ResolveRequest {
    sender: String,
}

/// Flat view of a ResolutionResult
#[derive(Serialize)]
struct ResolveResponse {
    sender: String,
    matched: bool,
    candidate_name: Option<String>,
    candidate_id: Option<String>,
    method: Option<String>,
    score: Option<u8>,
    tie_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl ResolveResponse {
    fn new(sender: String, result: ResolutionResult) -> Self {
        match result {
            ResolutionResult::Matched(m) => Self {
                sender,
                matched: true,
                candidate_name: Some(m.display_name),
                candidate_id: m.candidate_id,
                method: Some(m.method.as_str().to_string()),
                score: m.score,
                tie_count: m.tie_count,
                reason: None,
            },
            ResolutionResult::Unmatched(e) => Self {
                sender,
                matched: false,
                candidate_name: None,
                candidate_id: None,
                method: None,
                score: None,
                tie_count: 0,
                reason: Some(e.code().to_string()),
            },
        }
    }
}

fn email_filter(filter: &str, email: &StoredEmail) -> bool {
    match filter {
        "matched" => email.is_matched(),
        "unmatched" => !email.is_matched(),
        "override" => email.is_matched() && email.is_override(),
        _ => true,
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(serde_json::json!({
        "status": "OK",
        "version": campaign_linkage::VERSION,
        "roster_size": state.roster.len(),
    })))
}

/// GET /api/emails?filter=&candidate= - Linked emails
async fn get_emails(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> impl IntoResponse {
    let conn = match state.db.lock() {
        Ok(conn) => conn,
        Err(e) => {
            error!("Database lock poisoned: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(Vec::<StoredEmail>::new(), "database unavailable".to_string())),
            )
                .into_response();
        }
    };

    let emails = match &query.candidate {
        Some(name) => get_emails_for_candidate(&conn, name),
        None => get_all_linked_emails(&conn),
    };

    match emails {
        Ok(emails) => {
            let filter = query.filter.as_deref().unwrap_or("all");
            let response: Vec<StoredEmail> = emails
                .into_iter()
                .filter(|e| email_filter(filter, e))
                .collect();

            (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
        }
        Err(e) => {
            error!("Error getting emails: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(Vec::<StoredEmail>::new(), e.to_string())),
            )
                .into_response()
        }
    }
}

/// GET /api/emails/:id - One linked email by its uuid
async fn get_email_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let conn = match state.db.lock() {
        Ok(conn) => conn,
        Err(e) => {
            error!("Database lock poisoned: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(None::<StoredEmail>, "database unavailable".to_string())),
            )
                .into_response();
        }
    };

    match get_email(&conn, &id) {
        Ok(Some(email)) => (StatusCode::OK, Json(ApiResponse::ok(Some(email)))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::err(None::<StoredEmail>, format!("email {} not found", id))),
        )
            .into_response(),
        Err(e) => {
            error!("Error getting email {}: {:#}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(None::<StoredEmail>, e.to_string())),
            )
                .into_response()
        }
    }
}

/// GET /api/candidates/stats - Emails per candidate
async fn get_candidate_stats(State(state): State<AppState>) -> impl IntoResponse {
    let conn = match state.db.lock() {
        Ok(conn) => conn,
        Err(e) => {
            error!("Database lock poisoned: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(Vec::<CandidateStat>::new(), "database unavailable".to_string())),
            )
                .into_response();
        }
    };

    match candidate_stats(&conn) {
        Ok(stats) => (StatusCode::OK, Json(ApiResponse::ok(stats))).into_response(),
        Err(e) => {
            error!("Error getting candidate stats: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(Vec::<CandidateStat>::new(), e.to_string())),
            )
                .into_response()
        }
    }
}

/// POST /api/resolve - Resolve one sender against the loaded roster
async fn resolve_sender(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> impl IntoResponse {
    let result = state.resolver.resolve(&request.sender, &state.roster);
    Json(ApiResponse::ok(ResolveResponse::new(request.sender, result)))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    println!("🌐 Campaign Linkage - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if !args.db.exists() {
        eprintln!("❌ Database not found at {:?}", args.db);
        eprintln!("   Run: campaign-linkage import");
        eprintln!("   to store linked emails first.");
        std::process::exit(1);
    }

    let conn = Connection::open(&args.db)?;
    setup_database(&conn)?;
    println!("✓ Database opened: {:?}", args.db);

    let roster = if args.roster.exists() {
        Roster::from_csv(&args.roster)?
    } else {
        warn!(path = %args.roster.display(), "roster not found, /api/resolve uses an empty roster");
        Roster::default()
    };
    println!("✓ Roster loaded: {} candidates", roster.len());

    let config = LinkageConfig::load_or_default(args.config.as_deref())?;
    let resolver = IdentityResolver::from_config(&config)?;

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        resolver: Arc::new(resolver),
        roster: Arc::new(roster),
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/emails", get(get_emails))
        .route("/emails/:id", get(get_email_by_id))
        .route("/candidates/stats", get(get_candidate_stats))
        .route("/resolve", post(resolve_sender))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&args.addr).await?;
    info!(addr = %args.addr, "listening");

    println!("\n🚀 Server running on http://{}", args.addr);
    println!("   API: http://{}/api/emails", args.addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
