//! Web search capability used by the agent for supplementary research.
//!
//! The agent depends on the [`SearchProvider`] trait; [`DuckDuckGoProvider`]
//! is the built-in backend, using the DuckDuckGo Instant Answer API, which
//! needs no API key.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use video_summarizer_common::error::Error;

/// Default number of results handed back to the model.
pub const DEFAULT_MAX_RESULTS: usize = 5;

const DUCKDUCKGO_BASE_URL: &str = "https://api.duckduckgo.com";

/// A single web search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]({})\n{}", self.title, self.url, self.snippet)
    }
}

/// Pluggable search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync + fmt::Debug {
    /// Short name used in logs and errors.
    fn provider_name(&self) -> &str;

    /// Run a query and return at most `max_results` results.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, Error>;
}

/// DuckDuckGo Instant Answer backend.
#[derive(Debug, Clone)]
pub struct DuckDuckGoProvider {
    client: reqwest::Client,
    base_url: String,
}

impl Default for DuckDuckGoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DuckDuckGoProvider {
    pub fn new() -> Self {
        Self::with_base_url(DUCKDUCKGO_BASE_URL)
    }

    /// Point the provider at a different host (for testing).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/?q={}&format=json&no_html=1&skip_disambig=1",
            self.base_url,
            urlencoding::encode(query)
        )
    }
}

// DuckDuckGo response types (private).
#[derive(Debug, Default, Deserialize)]
struct DdgResponse {
    #[serde(rename = "Heading", default)]
    heading: String,
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "Results", default)]
    results: Vec<DdgTopic>,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<DdgTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DdgTopic {
    Item {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL")]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<DdgTopic>,
    },
}

impl DdgTopic {
    fn flatten_into(self, out: &mut Vec<SearchResult>) {
        match self {
            DdgTopic::Item { text, first_url } => {
                let title = text
                    .split(" - ")
                    .next()
                    .unwrap_or(&text)
                    .trim()
                    .to_string();
                out.push(SearchResult {
                    title,
                    url: first_url,
                    snippet: text,
                });
            }
            DdgTopic::Group { topics } => {
                for topic in topics {
                    topic.flatten_into(out);
                }
            }
        }
    }
}

impl DdgResponse {
    fn into_results(self, max_results: usize) -> Vec<SearchResult> {
        let mut out = Vec::new();

        if !self.abstract_text.is_empty() {
            out.push(SearchResult {
                title: if self.heading.is_empty() {
                    self.abstract_url.clone()
                } else {
                    self.heading
                },
                url: self.abstract_url,
                snippet: self.abstract_text,
            });
        }

        for topic in self.results.into_iter().chain(self.related_topics) {
            topic.flatten_into(&mut out);
        }

        out.truncate(max_results);
        out
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn provider_name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, Error> {
        let url = self.search_url(query);
        debug!(query = %query, max_results, "Searching DuckDuckGo");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::search(self.provider_name(), format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::search(
                self.provider_name(),
                format!("HTTP {}: {}", status.as_u16(), body),
            ));
        }

        // The API answers with `application/x-javascript`, so parse the text
        // instead of relying on the JSON content type.
        let body = response
            .text()
            .await
            .map_err(|e| Error::search(self.provider_name(), format!("Failed to read body: {}", e)))?;
        let parsed: DdgResponse = serde_json::from_str(&body).map_err(|e| {
            Error::search(self.provider_name(), format!("Failed to parse response: {}", e))
        })?;

        let results = parsed.into_results(max_results);
        debug!(count = results.len(), "DuckDuckGo returned results");
        Ok(results)
    }
}
