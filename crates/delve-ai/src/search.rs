//! One-shot web search.

use serde::{Deserialize, Serialize};

use crate::client::{AuthScheme, ParallelClient};
use crate::error::{AiError, Result};

const DEFAULT_MAX_RESULTS: u32 = 10;
const DEFAULT_MAX_CHARS_PER_RESULT: u32 = 6000;
const MAX_SEARCH_QUERIES: usize = 5;
const SEARCH_PROCESSOR: &str = "base";

/// Web search request
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub objective: String,
    processor: &'static str,
    pub max_results: u32,
    pub max_chars_per_result: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub search_queries: Vec<String>,
}

impl SearchRequest {
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            processor: SEARCH_PROCESSOR,
            max_results: DEFAULT_MAX_RESULTS,
            max_chars_per_result: DEFAULT_MAX_CHARS_PER_RESULT,
            search_queries: Vec::new(),
        }
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_max_chars_per_result(mut self, max_chars: u32) -> Self {
        self.max_chars_per_result = max_chars;
        self
    }

    /// Add keyword queries. Entries may be comma-separated; at most five are kept.
    pub fn with_queries<I, S>(mut self, queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.search_queries = queries
            .into_iter()
            .flat_map(|q| {
                q.as_ref()
                    .split(',')
                    .map(|part| part.trim().to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|q| !q.is_empty())
            .take(MAX_SEARCH_QUERIES)
            .collect();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.objective.trim().is_empty() {
            return Err(AiError::InvalidInput("search objective is empty".into()));
        }
        if self.max_results == 0 {
            return Err(AiError::InvalidInput("max_results must be at least 1".into()));
        }
        if self.max_chars_per_result == 0 {
            return Err(AiError::InvalidInput(
                "max_chars_per_result must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// A ranked search hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub excerpt: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawSearchResult>,
}

#[derive(Deserialize)]
struct RawSearchResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    excerpts: Vec<String>,
}

impl From<RawSearchResult> for SearchResult {
    fn from(raw: RawSearchResult) -> Self {
        let excerpt = raw.excerpt.unwrap_or_else(|| raw.excerpts.join("\n\n"));
        Self {
            title: raw.title.unwrap_or_default(),
            url: raw.url,
            excerpt,
        }
    }
}

impl ParallelClient {
    /// Run a web search; results keep the remote ranking.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        request.validate()?;
        let response: SearchResponse = self
            .post_json("/v1beta/search", AuthScheme::ApiKey, request)
            .await?;

        tracing::debug!(count = response.results.len(), "Search results received");
        Ok(response.results.into_iter().map(SearchResult::from).collect())
    }
}
