//! Entity id conversion between Wikidata QIDs and Freebase MIDs.
//!
//! Both directions go through Wikidata's "Freebase ID" property (P646).

use crate::{QueryError, QueryOutcome, SparqlEndpoint};

pub const WIKIDATA_ENTITY_PREFIX: &str = "http://www.wikidata.org/entity/";
pub const WIKIDATA_DIRECT_PREFIX: &str = "http://www.wikidata.org/prop/direct/";
pub const FREEBASE_ID_PROPERTY: &str = "P646";

const MID_VAR: &str = "mid";
const QID_VAR: &str = "qid";

/// Shape of a successful lookup.
///
/// `limit == 1` yields `Single`; any other limit yields `Multiple`, which is
/// never empty (an empty answer is "not found").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdLookup {
    Single(String),
    Multiple(Vec<String>),
}

impl IdLookup {
    pub fn as_slice(&self) -> &[String] {
        match self {
            IdLookup::Single(id) => std::slice::from_ref(id),
            IdLookup::Multiple(ids) => ids,
        }
    }

    pub fn first(&self) -> Option<&str> {
        self.as_slice().first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        match self {
            IdLookup::Single(id) => vec![id],
            IdLookup::Multiple(ids) => ids,
        }
    }
}

pub struct EntityConverter<E> {
    endpoint: E,
}

impl<E: SparqlEndpoint> EntityConverter<E> {
    pub fn new(endpoint: E) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Freebase MID(s) for a Wikidata QID, e.g. `Q42` → `/m/0bwd_0`.
    pub fn freebase_id(&self, qid: &str, limit: usize) -> Option<IdLookup> {
        self.try_freebase_id(qid, limit)
            .into_option_logged("freebase id lookup failed")
    }

    /// Wikidata QID(s) for a Freebase MID, e.g. `/m/0bwd_0` → `Q42`.
    pub fn wikidata_id(&self, mid: &str, limit: usize) -> Option<IdLookup> {
        self.try_wikidata_id(mid, limit)
            .into_option_logged("wikidata id lookup failed")
    }

    pub fn try_freebase_id(&self, qid: &str, limit: usize) -> QueryOutcome<IdLookup> {
        match freebase_id_query(qid, limit) {
            Ok(query) => self.lookup(&query, MID_VAR, limit, |v| v),
            Err(e) => QueryOutcome::Failed(e),
        }
    }

    pub fn try_wikidata_id(&self, mid: &str, limit: usize) -> QueryOutcome<IdLookup> {
        let query = wikidata_id_query(mid, limit);
        self.lookup(&query, QID_VAR, limit, last_path_segment)
    }

    fn lookup(
        &self,
        query: &str,
        var: &str,
        limit: usize,
        normalize: fn(&str) -> &str,
    ) -> QueryOutcome<IdLookup> {
        let results = match self.endpoint.query(query) {
            Ok(results) => results,
            Err(e) => return QueryOutcome::Failed(e),
        };
        let Some(rows) = results.bindings() else {
            return QueryOutcome::NotFound;
        };

        let mut values = Vec::with_capacity(rows.len().min(limit));
        for row in rows.iter().take(limit) {
            let Some(binding) = row.get(var) else {
                return QueryOutcome::Failed(QueryError::MissingVariable(var.to_string()));
            };
            values.push(normalize(&binding.value).to_string());
        }
        shape_lookup(values, limit)
    }
}

fn shape_lookup(values: Vec<String>, limit: usize) -> QueryOutcome<IdLookup> {
    if values.is_empty() {
        return QueryOutcome::NotFound;
    }
    if limit == 1 {
        match values.into_iter().next() {
            Some(first) => QueryOutcome::Found(IdLookup::Single(first)),
            None => QueryOutcome::NotFound,
        }
    } else {
        QueryOutcome::Found(IdLookup::Multiple(values))
    }
}

// ============================================================================
// Query templates
// ============================================================================

pub fn freebase_id_query(qid: &str, limit: usize) -> Result<String, QueryError> {
    if !is_iri_safe_local_name(qid) {
        return Err(QueryError::InvalidIdentifier(qid.to_string()));
    }
    Ok(format!(
        "SELECT DISTINCT ?{MID_VAR} WHERE {{\n    \
         <{WIKIDATA_ENTITY_PREFIX}{qid}> <{WIKIDATA_DIRECT_PREFIX}{FREEBASE_ID_PROPERTY}> ?{MID_VAR}\n\
         }}\n\
         LIMIT {limit}\n"
    ))
}

pub fn wikidata_id_query(mid: &str, limit: usize) -> String {
    format!(
        "PREFIX wdt: <{WIKIDATA_DIRECT_PREFIX}>\n\
         SELECT DISTINCT ?{QID_VAR} WHERE {{\n    \
         ?{QID_VAR} wdt:{FREEBASE_ID_PROPERTY} \"{}\".\n\
         }}\n\
         LIMIT {limit}\n",
        escape_string_literal(mid)
    )
}

/// QIDs are spliced into an IRI, so only plain local-name characters pass.
fn is_iri_safe_local_name(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn escape_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// `http://www.wikidata.org/entity/Q42` → `Q42`.
pub fn last_path_segment(s: &str) -> &str {
    s.rsplit('/').next().unwrap_or(s)
}
