// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tracing::debug;
use url::Url;

use scout_config::PageConfig;

/// One fetched document.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: Url,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

/// Loads documents for a [`PageSession`](super::session::PageSession).
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> anyhow::Result<FetchedPage>;
}

/// HTTP fetcher.  Documents are loaded as-is; scripts are not executed.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(cfg: &PageConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.fetch_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(cfg.user_agent.clone())
            .build()
            .context("building HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> anyhow::Result<FetchedPage> {
        debug!(url = %url, "fetching page");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        let body = response.text().await.with_context(|| format!("reading body of {url}"))?;
        Ok(FetchedPage { url: final_url, status, content_type, body })
    }
}

/// Serves canned HTML keyed by URL.  Unknown URLs answer 404.
#[derive(Debug, Default, Clone)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        let key = Url::parse(url).map(|u| u.to_string()).unwrap_or_else(|_| url.to_string());
        self.pages.insert(key, html.into());
        self
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &Url) -> anyhow::Result<FetchedPage> {
        let (status, body) = match self.pages.get(url.as_str()) {
            Some(html) => (200, html.clone()),
            None => (404, "<html><body><h1>Not Found</h1></body></html>".to_string()),
        };
        Ok(FetchedPage {
            url: url.clone(),
            status,
            content_type: "text/html".into(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_fetcher_normalizes_keys() {
        let f = StaticFetcher::new().with_page("https://example.com", "<p>hi</p>");
        let page = f.fetch(&Url::parse("https://example.com/").unwrap()).await.unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(page.body, "<p>hi</p>");
    }

    #[tokio::test]
    async fn static_fetcher_unknown_url_is_404() {
        let f = StaticFetcher::new();
        let page = f.fetch(&Url::parse("https://example.com/missing").unwrap()).await.unwrap();
        assert_eq!(page.status, 404);
    }
}
