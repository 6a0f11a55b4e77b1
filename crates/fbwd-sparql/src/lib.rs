//! SPARQL access for the Freebase ⇄ Wikidata bridge.
//!
//! Two layers:
//!
//! - [`client`]: a blocking SPARQL-over-HTTP client behind the
//!   [`SparqlEndpoint`] trait. Every transport, status and decoding problem is
//!   reported as a [`QueryError`].
//! - [`entity`]: the [`EntityConverter`], which templates the two lookup
//!   queries (QID → Freebase MID, MID → QID) and shapes their results.
//!
//! Lookups come in two flavours. The `try_*` methods return a
//! [`QueryOutcome`] that keeps "the endpoint is down" apart from "there is no
//! such fact". The plain methods collapse both into `None`, which is what
//! batch conversion wants: a best-effort answer and a log line.

pub mod client;
pub mod entity;

pub use client::{
    Binding, BindingValue, ResultSet, SparqlClient, SparqlClientConfig, SparqlEndpoint,
    SparqlResults, DEFAULT_ENDPOINT,
};
pub use entity::{EntityConverter, IdLookup};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid endpoint url {url:?}: {source}")]
    InvalidEndpoint {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("identifier cannot be used in a query: {0:?}")]
    InvalidIdentifier(String),
    #[error("request to sparql endpoint failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("sparql endpoint returned http status {status}")]
    Status { status: u16, body: String },
    #[error("failed to decode sparql json results: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("result row has no binding for ?{0}")]
    MissingVariable(String),
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of a lookup that distinguishes an empty answer from a failed query.
#[derive(Debug)]
pub enum QueryOutcome<T> {
    Found(T),
    NotFound,
    Failed(QueryError),
}

impl<T> QueryOutcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, QueryOutcome::Found(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, QueryOutcome::Failed(_))
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> QueryOutcome<U> {
        match self {
            QueryOutcome::Found(v) => QueryOutcome::Found(f(v)),
            QueryOutcome::NotFound => QueryOutcome::NotFound,
            QueryOutcome::Failed(e) => QueryOutcome::Failed(e),
        }
    }

    /// Collapse to `Option`, dropping the failure reason.
    pub fn into_option(self) -> Option<T> {
        match self {
            QueryOutcome::Found(v) => Some(v),
            QueryOutcome::NotFound | QueryOutcome::Failed(_) => None,
        }
    }

    /// Like [`QueryOutcome::into_option`], but the failure is logged first.
    pub fn into_option_logged(self, context: &str) -> Option<T> {
        if let QueryOutcome::Failed(e) = &self {
            tracing::warn!(error = %e, "{context}");
        }
        self.into_option()
    }
}

impl<T> From<Result<Option<T>, QueryError>> for QueryOutcome<T> {
    fn from(value: Result<Option<T>, QueryError>) -> Self {
        match value {
            Ok(Some(v)) => QueryOutcome::Found(v),
            Ok(None) => QueryOutcome::NotFound,
            Err(e) => QueryOutcome::Failed(e),
        }
    }
}
