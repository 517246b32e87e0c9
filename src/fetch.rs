use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use rusqlite::Connection;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::FetchSettings;
use crate::db::{ScrapeRow, ScrapeWriter};

/// Fetch stats returned after completion.
pub struct FetchStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

pub fn client(settings: &FetchSettings) -> Result<Client> {
    Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Fetch profile pages concurrently, saving each result to the DB as it arrives.
/// Each worker holds its permit through the politeness delay, so at most
/// `concurrency` requests are in flight and each slot pauses between requests.
pub async fn fetch_pages_streaming(
    conn: &Connection,
    pages: Vec<(i64, String)>,
    settings: &FetchSettings,
) -> Result<FetchStats> {
    let client = client(settings)?;
    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let total = pages.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let (tx, mut rx) = tokio::sync::mpsc::channel::<ScrapeRow>(settings.concurrency.max(1) * 2);

    for (page_id, url) in pages {
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let policy = RetryPolicy::from(settings);
        let delay = Duration::from_millis(settings.delay_ms);

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let row = fetch_with_retry(&client, page_id, &url, policy).await;
            let _ = tx.send(row).await;
            tokio::time::sleep(delay).await;
        });
    }

    // rx closes once every worker has dropped its sender.
    drop(tx);

    let mut ok = 0usize;
    let mut errors = 0usize;
    let mut writer = ScrapeWriter::new(conn)?;

    while let Some(row) = rx.recv().await {
        if row.error.is_some() {
            errors += 1;
        } else {
            ok += 1;
        }
        writer.save(&row)?;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Fetched {} pages ({} ok, {} errors)", total, ok, errors);

    Ok(FetchStats { total, ok, errors })
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff_ms: u64,
}

impl From<&FetchSettings> for RetryPolicy {
    fn from(s: &FetchSettings) -> Self {
        RetryPolicy {
            max_retries: s.max_retries,
            base_backoff_ms: s.base_backoff_ms,
        }
    }
}

impl RetryPolicy {
    /// Rate limiting, server errors and transport failures are worth another try.
    pub fn should_retry(status: Option<StatusCode>) -> bool {
        match status {
            Some(s) => s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error(),
            None => true,
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_backoff_ms.saturating_mul(2u64.saturating_pow(attempt)))
    }
}

async fn fetch_with_retry(
    client: &Client,
    page_id: i64,
    url: &str,
    policy: RetryPolicy,
) -> ScrapeRow {
    let mut attempt = 0;
    loop {
        let (row, status) = fetch_one(client, page_id, url).await;

        let give_up = !RetryPolicy::should_retry(status) || attempt >= policy.max_retries;
        if row.error.is_none() || give_up {
            return row;
        }

        let backoff = policy.backoff(attempt);
        warn!(
            "Retrying {} (attempt {}/{}), backing off {:.1}s: {}",
            url,
            attempt + 1,
            policy.max_retries,
            backoff.as_secs_f64(),
            row.error.as_deref().unwrap_or_default()
        );
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}

async fn fetch_one(client: &Client, page_id: i64, url: &str) -> (ScrapeRow, Option<StatusCode>) {
    let start = Instant::now();
    let mut row = ScrapeRow {
        page_id,
        url: url.to_string(),
        html: None,
        status: None,
        error: None,
        latency_ms: None,
    };

    let response = client.get(url).send().await;
    let status = match response {
        Ok(resp) => {
            let status = resp.status();
            row.status = Some(status.as_u16() as i32);
            if status.is_success() {
                match resp.text().await {
                    Ok(body) => row.html = Some(body),
                    Err(e) => row.error = Some(format!("body: {}", e)),
                }
            } else {
                row.error = Some(format!("HTTP {}", status));
            }
            Some(status)
        }
        Err(e) => {
            row.error = Some(e.to_string());
            None
        }
    };
    row.latency_ms = Some(start.elapsed().as_millis() as i64);

    (row, status)
}

/// Fetch a single page as text (listing pages, ad-hoc inspection).
pub async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", url))?
        .error_for_status()
        .with_context(|| format!("Bad status for {}", url))?;
    resp.text()
        .await
        .with_context(|| format!("Failed to read body of {}", url))
}
