//! Blocking SPARQL-over-HTTP client.
//!
//! Queries are sent as `GET <endpoint>?query=...&format=json` and the body is
//! decoded as SPARQL 1.1 JSON results. There is no retry; the only timeout is
//! the one fixed at construction.

use crate::QueryError;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:1234/api/endpoint/sparql";
const DEFAULT_USER_AGENT: &str = "fbwd/0.1 (+https://github.com/fbwd/fbwd)";
const SPARQL_JSON_ACCEPT: &str = "application/sparql-results+json, application/json;q=0.9";

// ============================================================================
// Results model
// ============================================================================

/// Decoded SPARQL JSON results.
///
/// `results` is optional: some endpoints answer with a bare `head` (or an
/// error object with status 200), and callers treat that as "no data".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SparqlResults {
    #[serde(default)]
    pub results: Option<ResultSet>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResultSet {
    pub bindings: Vec<Binding>,
}

/// One result row: variable name → value descriptor.
pub type Binding = HashMap<String, BindingValue>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BindingValue {
    pub value: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub datatype: Option<String>,
    #[serde(rename = "xml:lang", default)]
    pub lang: Option<String>,
}

impl SparqlResults {
    /// Result rows, or `None` when the response carried no `results` member.
    pub fn bindings(&self) -> Option<&[Binding]> {
        self.results.as_ref().map(|r| r.bindings.as_slice())
    }
}

// ============================================================================
// Endpoint seam
// ============================================================================

pub trait SparqlEndpoint {
    fn query(&self, sparql: &str) -> Result<SparqlResults, QueryError>;

    /// Run a query, logging any failure and reporting it as `None`.
    fn query_or_none(&self, sparql: &str) -> Option<SparqlResults> {
        match self.query(sparql) {
            Ok(results) => Some(results),
            Err(e) => {
                tracing::warn!(error = %e, "sparql query failed");
                None
            }
        }
    }
}

impl<T: SparqlEndpoint + ?Sized> SparqlEndpoint for &T {
    fn query(&self, sparql: &str) -> Result<SparqlResults, QueryError> {
        (**self).query(sparql)
    }
}

impl<T: SparqlEndpoint + ?Sized> SparqlEndpoint for Box<T> {
    fn query(&self, sparql: &str) -> Result<SparqlResults, QueryError> {
        (**self).query(sparql)
    }
}

// ============================================================================
// HTTP client
// ============================================================================

#[derive(Debug, Clone)]
pub struct SparqlClientConfig {
    pub endpoint: String,
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for SparqlClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl SparqlClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

pub struct SparqlClient {
    client: Client,
    endpoint: Url,
}

impl SparqlClient {
    pub fn new(config: SparqlClientConfig) -> Result<Self, QueryError> {
        let endpoint = Url::parse(&config.endpoint).map_err(|source| QueryError::InvalidEndpoint {
            url: config.endpoint.clone(),
            source,
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
        );
        headers.insert(ACCEPT, HeaderValue::from_static(SPARQL_JSON_ACCEPT));

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(QueryError::Client)?;

        Ok(Self { client, endpoint })
    }

    /// Client for [`DEFAULT_ENDPOINT`].
    pub fn local() -> Result<Self, QueryError> {
        Self::new(SparqlClientConfig::default())
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl SparqlEndpoint for SparqlClient {
    fn query(&self, sparql: &str) -> Result<SparqlResults, QueryError> {
        tracing::debug!(endpoint = %self.endpoint, "sending sparql query");

        let resp = self
            .client
            .get(self.endpoint.clone())
            .query(&[("query", sparql), ("format", "json")])
            .send()
            .map_err(QueryError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().map_err(QueryError::Transport)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
