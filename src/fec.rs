// 🏛️ FEC Client - Pulls the Senate roster from api.open.fec.gov
//
// Two list endpoints, both paged 100 at a time:
// - /v1/candidates/         active Senate candidates for an election year
// - /v1/candidates/totals/  receipts per candidate for a cycle
//
// Paging stops after the last page reported by `pagination.pages`, or at
// the first non-200 response (whatever was collected so far is kept).

use crate::candidate::{merge_receipts, CandidateRecord, FecCandidate, FecPage, ReceiptsRecord, Roster};
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const FEC_API_BASE: &str = "https://api.open.fec.gov";
pub const PER_PAGE: u32 = 100;

/// Query parameters for /v1/candidates/ (page is added per request)
pub fn candidates_query(election_year: i32) -> Vec<(&'static str, String)> {
    vec![
        ("per_page", PER_PAGE.to_string()),
        ("election_year", election_year.to_string()),
        ("is_active_candidate", "true".to_string()),
        ("office", "S".to_string()),
        ("sort", "name".to_string()),
        ("sort_hide_null", "false".to_string()),
        ("sort_null_only", "false".to_string()),
        ("sort_nulls_last", "false".to_string()),
    ]
}

/// Query parameters for /v1/candidates/totals/
pub fn totals_query(cycle: i32) -> Vec<(&'static str, String)> {
    vec![
        ("per_page", PER_PAGE.to_string()),
        ("cycle", cycle.to_string()),
        ("office", "S".to_string()),
        ("is_active_candidate", "true".to_string()),
        ("election_full", "false".to_string()),
        ("sort", "name".to_string()),
        ("sort_hide_null", "false".to_string()),
        ("sort_null_only", "false".to_string()),
        ("sort_nulls_last", "false".to_string()),
    ]
}

/// True if another page should be requested after `page`
fn has_next_page(page: u32, total_pages: u32) -> bool {
    page < total_pages
}

pub struct FecClient {
    base_url: String,
    api_key: String,
    http_client: Client,
    page_delay: Duration,
}

impl FecClient {
    pub fn new(api_key: &str) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: FEC_API_BASE.to_string(),
            api_key: api_key.to_string(),
            http_client,
            page_delay: Duration::ZERO,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Pause between page requests (the public key allows ~1000 calls/hour)
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    async fn fetch_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base_url, path);
        let mut results = Vec::new();
        let mut page: u32 = 1;

        loop {
            let response = self
                .http_client
                .get(&url)
                .query(query)
                .query(&[("page", page.to_string()), ("api_key", self.api_key.clone())])
                .send()
                .await
                .with_context(|| format!("Request failed: {} page {}", path, page))?;

            let status = response.status();
            if status != StatusCode::OK {
                warn!(path, page, %status, "FEC call failed, stopping");
                break;
            }

            let body = response
                .text()
                .await
                .with_context(|| format!("Failed to read {} page {}", path, page))?;
            let parsed: FecPage<T> = serde_json::from_str(&body)
                .with_context(|| format!("Bad FEC page: {} page {}", path, page))?;

            debug!(path, page, pages = parsed.pagination.pages, rows = parsed.results.len(), "FEC page");
            results.extend(parsed.results);

            if !has_next_page(page, parsed.pagination.pages) {
                break;
            }
            page += 1;

            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        Ok(results)
    }

    pub async fn fetch_candidates(&self, election_year: i32) -> Result<Vec<CandidateRecord>> {
        let rows: Vec<FecCandidate> = self
            .fetch_all_pages("/v1/candidates/", &candidates_query(election_year))
            .await?;
        info!(count = rows.len(), election_year, "fetched FEC candidates");
        Ok(rows.into_iter().map(CandidateRecord::from).collect())
    }

    pub async fn fetch_receipts(&self, cycle: i32) -> Result<Vec<ReceiptsRecord>> {
        let rows: Vec<ReceiptsRecord> = self
            .fetch_all_pages("/v1/candidates/totals/", &totals_query(cycle))
            .await?;
        info!(count = rows.len(), cycle, "fetched FEC receipts");
        Ok(rows)
    }

    /// Candidates for `election_year` joined with their receipts
    pub async fn fetch_roster(&self, election_year: i32) -> Result<Roster> {
        let candidates = self.fetch_candidates(election_year).await?;
        let receipts = self.fetch_receipts(election_year).await?;
        Ok(merge_receipts(candidates, &receipts))
    }
}

// ============================================================================
// TESTS
// ============================================================================
