//! Page fetching.
//!
//! Uses reqwest for fetching; the body is handed to the extractor.

use crate::config::FetchConfig;
use crate::extract::{self, ExtractedContent};
use crate::transport::USER_AGENT;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to fetch URL: {0}")]
    FetchError(#[from] reqwest::Error),
    #[error("server answered {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("no readable content found at {0}")]
    NoContent(String),
}

/// Create a configured HTTP client for fetching pages
fn create_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeout())
        .build()
}

/// Fetch a URL and extract its readable content
pub async fn fetch_content(url: &str, config: &FetchConfig) -> Result<ExtractedContent, FetchError> {
    let client = create_client(config)?;

    debug!(url, "fetching page");
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let html = response.text().await?;
    let content = extract::extract_html(&html, url);
    if content.text.is_empty() {
        return Err(FetchError::NoContent(url.to_string()));
    }

    debug!(url, chars = content.text.chars().count(), "extracted page text");
    Ok(content)
}
