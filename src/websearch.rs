// ABOUTME: Web search behind a small trait, with a DuckDuckGo HTML implementation.
// ABOUTME: Returns result snippets only; callers treat failures as "no results".

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;

const DUCKDUCKGO_URL: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Up to `max_results` text snippets for `query`
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>>;
}

pub struct DuckDuckGo {
    client: reqwest::Client,
}

impl DuckDuckGo {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client for web search")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGo {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        let url = format!("{}?q={}", DUCKDUCKGO_URL, urlencoding::encode(query));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("DuckDuckGo request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("DuckDuckGo returned HTTP {}", response.status().as_u16());
        }
        let html = response
            .text()
            .await
            .context("Failed to read DuckDuckGo response")?;
        parse_snippets(&html, max_results)
    }
}

/// Snippet text of each result on a DuckDuckGo HTML results page
pub fn parse_snippets(html: &str, max_results: usize) -> Result<Vec<String>> {
    let selector = Selector::parse(".result__snippet")
        .map_err(|e| anyhow!("Invalid snippet selector: {:?}", e))?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&selector)
        .map(|el| {
            el.text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|snippet| !snippet.is_empty())
        .take(max_results)
        .collect())
}
