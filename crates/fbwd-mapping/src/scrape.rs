//! Scraper for the Wikidata "WikiProject Freebase/Mapping" page.
//!
//! The page is a set of wiki tables whose first column links to a Freebase
//! property (`https://www.freebase.com/...`) and whose second column, when
//! filled in, links to a Wikidata property (`/wiki/Property:P...`).

use crate::MappingError;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

pub const DEFAULT_MAPPING_URL: &str =
    "https://www.wikidata.org/wiki/Wikidata:WikiProject_Freebase/Mapping";
pub const FREEBASE_HOST_MARKER: &str = "www.freebase.com";
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_USER_AGENT: &str = "fbwd/0.1 (+https://github.com/fbwd/fbwd)";

/// One table row: Freebase href and, if present, Wikidata href.
pub type MappingRow = (String, Option<String>);

// ============================================================================
// Fetching
// ============================================================================

/// Source of the mapping page HTML.
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<String, MappingError>;
}

impl<T: PageFetcher + ?Sized> PageFetcher for &T {
    fn fetch(&self, url: &str) -> Result<String, MappingError> {
        (**self).fetch(url)
    }
}

pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self, MappingError> {
        Self::with_timeout(PAGE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, MappingError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(MappingError::Client)?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpPageFetcher {
    fn fetch(&self, url: &str) -> Result<String, MappingError> {
        tracing::debug!(url, "fetching property mapping page");
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|source| MappingError::Transport {
                url: url.to_string(),
                source,
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(MappingError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().map_err(|source| MappingError::Transport {
            url: url.to_string(),
            source,
        })
    }
}

/// Fetch the page at `url` and extract its mapping rows.
pub fn fetch_mapping_rows<F: PageFetcher>(
    fetcher: &F,
    url: &str,
) -> Result<Vec<MappingRow>, MappingError> {
    let html = fetcher.fetch(url)?;
    Ok(parse_mapping_rows(&html))
}

// ============================================================================
// Parsing
// ============================================================================

struct RowSelectors {
    tr: Selector,
    td: Selector,
    a: Selector,
}

impl RowSelectors {
    fn new() -> Option<Self> {
        Some(Self {
            tr: Selector::parse("tr").ok()?,
            td: Selector::parse("td").ok()?,
            a: Selector::parse("a").ok()?,
        })
    }
}

/// Extract `(freebase_href, wikidata_href)` rows in document order.
///
/// A repeated Freebase href keeps the position of its first row and the value
/// of its last one.
pub fn parse_mapping_rows(html: &str) -> Vec<MappingRow> {
    let Some(sel) = RowSelectors::new() else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);

    let mut rows = OrderedRows::default();
    for tr in doc.select(&sel.tr) {
        let mut cells = tr.select(&sel.td);
        let Some(first) = cells.next() else {
            continue;
        };
        let Some(freebase_href) = first_anchor_href(first, &sel.a) else {
            continue;
        };
        if !freebase_href.contains(FREEBASE_HOST_MARKER) {
            continue;
        }
        let wikidata_href = cells
            .next()
            .and_then(|cell| first_anchor_href(cell, &sel.a));
        rows.insert(freebase_href.to_string(), wikidata_href.map(str::to_string));
    }

    let rows = rows.into_vec();
    log_row_stats(&rows);
    rows
}

/// `href` of the first `<a>` inside `cell`; `None` if there is no anchor or
/// the first anchor has no `href`.
fn first_anchor_href<'a>(cell: ElementRef<'a>, a: &Selector) -> Option<&'a str> {
    cell.select(a).next()?.value().attr("href")
}

fn log_row_stats(rows: &[MappingRow]) {
    let mapped = rows.iter().filter(|(_, wd)| wd.is_some()).count();
    let distinct: HashSet<Option<&str>> = rows.iter().map(|(_, wd)| wd.as_deref()).collect();
    tracing::info!(rows = rows.len(), "freebase properties on mapping page");
    tracing::info!(mapped, "freebase properties with a wikidata counterpart");
    tracing::info!(
        distinct = distinct.len(),
        "distinct wikidata properties referenced"
    );
}

/// Insertion-ordered accumulator: first position wins, last value wins.
#[derive(Debug, Default)]
pub(crate) struct OrderedRows<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> OrderedRows<V> {
    pub(crate) fn insert(&mut self, key: String, value: V) {
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub(crate) fn into_vec(self) -> Vec<(String, V)> {
        self.entries
    }
}
