//! External search clients backing the validation gates.
//!
//! [`SerpClient`] talks to a serper.dev-compatible endpoint for organic
//! results; [`SuggestClient`] reads autocomplete suggestions in the
//! OpenSearch wire shape `[query, [suggestion, ...], ...]`. Both take their
//! base URL from configuration so tests can point them at a local server.

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PipelineError;

/// One organic result from a SERP lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerpResult {
    pub title: String,
    pub link: String,
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic: Vec<SerpOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerpOrganic {
    title: Option<String>,
    link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SerpClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl SerpClient {
    /// # Errors
    ///
    /// Returns [`PipelineError::Http`] if the underlying client cannot be
    /// constructed.
    pub fn new(api_key: &str, base_url: &str, timeout_secs: u64) -> Result<Self, PipelineError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Top organic results for `query`, at most `limit` of them. Entries
    /// missing a title or link are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Http`] on request failure or a non-2xx reply.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SerpResult>, PipelineError> {
        let response = self
            .http
            .post(&self.base_url)
            .header("X-API-KEY", &self.api_key)
            .json(&serde_json::json!({ "q": query, "num": limit }))
            .send()
            .await?
            .error_for_status()?;
        let body: SerpResponse = response.json().await?;
        let results = body
            .organic
            .into_iter()
            .filter_map(|entry| {
                Some(SerpResult {
                    title: entry.title?,
                    link: entry.link?,
                })
            })
            .take(limit)
            .collect();
        Ok(results)
    }
}

#[derive(Debug, Clone)]
pub struct SuggestClient {
    http: Client,
    base_url: String,
}

impl SuggestClient {
    /// # Errors
    ///
    /// Returns [`PipelineError::Http`] if the underlying client cannot be
    /// constructed.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, PipelineError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Autocomplete suggestions for a seed keyword. Non-string entries in
    /// the suggestion array are skipped.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Http`] on request failure or a non-2xx reply.
    /// - [`PipelineError::UnexpectedPayload`] when the body is not the
    ///   OpenSearch array shape.
    pub async fn suggestions(&self, keyword: &str) -> Result<Vec<String>, PipelineError> {
        let encoded = utf8_percent_encode(keyword, NON_ALPHANUMERIC).to_string();
        let url = format!("{}?client=firefox&q={encoded}", self.base_url);
        let body: Value = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let Some(entries) = body.get(1).and_then(Value::as_array) else {
            return Err(PipelineError::UnexpectedPayload {
                context: "reading autocomplete suggestions",
            });
        };
        Ok(entries
            .iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect())
    }
}
