use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use scraper::Html;
use tracing::{info, warn};

use crate::config::Settings;
use crate::dedupe::UrlDeduplicator;
use crate::fetch;
use crate::parser::blocks::parse_selector;

/// Fetch every listing page and return unique profile URLs in discovery order.
/// A listing that fails to load is logged and skipped.
pub async fn fetch_profile_urls(settings: &Settings) -> Result<Vec<String>> {
    let client = fetch::client(&settings.fetch)?;
    let base = Url::parse(&settings.base_url)
        .with_context(|| format!("Invalid base_url {:?}", settings.base_url))?;
    let mut unique = UrlDeduplicator::new();

    for (i, listing) in settings.listing_urls.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(settings.fetch.delay_ms)).await;
        }
        info!("Fetching listing: {}", listing);
        let html = match fetch::fetch_text(&client, listing).await {
            Ok(h) => h,
            Err(e) => {
                warn!("Skipping listing {}: {:#}", listing, e);
                continue;
            }
        };
        let links = extract_profile_links(&html, &base, &settings.listing_link_selector)?;
        let added = unique.extend(&links);
        info!("{}: {} profile links ({} new)", listing, links.len(), added);
    }

    let urls = unique.into_urls();
    info!("Unique profile URLs: {}", urls.len());
    Ok(urls)
}

/// Resolve every matching `href` against `base`.
pub fn extract_profile_links(html: &str, base: &Url, selector: &str) -> Result<Vec<String>> {
    let sel = parse_selector(selector)?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .map(String::from)
        .collect())
}
