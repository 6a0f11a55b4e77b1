//! Freebase ⇄ Wikidata property mapping.
//!
//! The mapping is scraped from the Wikidata "WikiProject Freebase/Mapping"
//! page ([`scrape`]) and normalised into a [`PropertyMapping`] snapshot:
//!
//! - Freebase keys lose their `https://www.freebase.com` prefix
//!   (`/organization/organization/child`).
//! - Wikidata values lose their `/wiki/Property:` prefix (`P355`).
//! - Freebase properties listed without a Wikidata counterpart stay in the
//!   forward table with no value.
//!
//! A snapshot never changes after it is built. [`PropertyConverter::refresh`]
//! builds a new one and swaps it in only once the scrape succeeded.

pub mod scrape;

use scrape::{fetch_mapping_rows, MappingRow, OrderedRows};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

pub use scrape::{HttpPageFetcher, PageFetcher, DEFAULT_MAPPING_URL};

pub const FREEBASE_URL_PREFIX: &str = "https://www.freebase.com";
pub const WIKIDATA_PROPERTY_PATH: &str = "/wiki/Property:";

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to fetch {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("fetching {url} returned http status {status}")]
    Status { url: String, status: u16 },
}

// ============================================================================
// Snapshot
// ============================================================================

/// Immutable bidirectional property table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMapping {
    entries: Vec<(String, Option<String>)>,
    forward: HashMap<String, Option<String>>,
    backward: HashMap<String, String>,
}

impl PropertyMapping {
    /// Scrape `url` through `fetcher` and build a fresh snapshot.
    pub fn fetch<F: PageFetcher>(fetcher: &F, url: &str) -> Result<Self, MappingError> {
        let rows = fetch_mapping_rows(fetcher, url)?;
        Ok(Self::from_rows(rows))
    }

    /// Normalise raw `(freebase_href, wikidata_href)` rows.
    ///
    /// Keys that collide after normalisation keep their first position and
    /// their last value. The backward table is the inverse of the mapped
    /// forward entries in that order, so for a Wikidata property claimed by
    /// several Freebase properties the last one wins.
    pub fn from_rows(rows: impl IntoIterator<Item = MappingRow>) -> Self {
        let mut ordered = OrderedRows::default();
        for (freebase_href, wikidata_href) in rows {
            let key = after_last(&freebase_href, FREEBASE_URL_PREFIX).to_string();
            let value = wikidata_href
                .as_deref()
                .map(|href| after_last(href, WIKIDATA_PROPERTY_PATH).to_string());
            ordered.insert(key, value);
        }
        let entries = ordered.into_vec();

        let forward: HashMap<String, Option<String>> = entries.iter().cloned().collect();
        let mut backward = HashMap::new();
        for (freebase, wikidata) in &entries {
            if let Some(wikidata) = wikidata {
                backward.insert(wikidata.clone(), freebase.clone());
            }
        }

        Self {
            entries,
            forward,
            backward,
        }
    }

    pub fn wikidata_property(&self, freebase_property: &str) -> Option<&str> {
        self.forward.get(freebase_property)?.as_deref()
    }

    pub fn freebase_property(&self, wikidata_property: &str) -> Option<&str> {
        self.backward.get(wikidata_property).map(String::as_str)
    }

    /// Forward entries in page order, unmapped ones included.
    pub fn forward_entries(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(fb, wd)| (fb.as_str(), wd.as_deref()))
    }

    pub fn backward_table(&self) -> &HashMap<String, String> {
        &self.backward
    }

    /// Number of Freebase properties on the page.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of Freebase properties with a Wikidata counterpart.
    pub fn mapped_len(&self) -> usize {
        self.entries.iter().filter(|(_, wd)| wd.is_some()).count()
    }
}

impl Serialize for PropertyMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (freebase, wikidata) in &self.entries {
            map.serialize_entry(freebase, wikidata)?;
        }
        map.end()
    }
}

/// Substring after the last occurrence of `pat`, or `s` if `pat` is absent.
fn after_last<'a>(s: &'a str, pat: &str) -> &'a str {
    s.rsplit(pat).next().unwrap_or(s)
}

// ============================================================================
// Converter
// ============================================================================

pub struct PropertyConverter<F = HttpPageFetcher> {
    fetcher: F,
    url: String,
    mapping: PropertyMapping,
}

impl PropertyConverter<HttpPageFetcher> {
    /// Scrape `url` over HTTP. Fails if the page cannot be fetched.
    pub fn new(url: impl Into<String>) -> Result<Self, MappingError> {
        Self::with_fetcher(HttpPageFetcher::new()?, url)
    }

    /// Scrape [`DEFAULT_MAPPING_URL`].
    pub fn from_wikidata() -> Result<Self, MappingError> {
        Self::new(DEFAULT_MAPPING_URL)
    }
}

impl<F: PageFetcher> PropertyConverter<F> {
    pub fn with_fetcher(fetcher: F, url: impl Into<String>) -> Result<Self, MappingError> {
        let url = url.into();
        let mapping = PropertyMapping::fetch(&fetcher, &url)?;
        Ok(Self {
            fetcher,
            url,
            mapping,
        })
    }

    /// Wikidata property for a Freebase property, e.g.
    /// `/organization/organization/child` → `P355`.
    ///
    /// `None` both for unknown properties and for properties the page lists
    /// without a Wikidata counterpart.
    pub fn wikidata_property(&self, freebase_property: &str) -> Option<&str> {
        self.mapping.wikidata_property(freebase_property)
    }

    /// Freebase property for a Wikidata property, e.g. `P355` →
    /// `/organization/organization/child`.
    pub fn freebase_property(&self, wikidata_property: &str) -> Option<&str> {
        self.mapping.freebase_property(wikidata_property)
    }

    /// Re-scrape the page. On error the current mapping is kept.
    pub fn refresh(&mut self) -> Result<(), MappingError> {
        let mapping = PropertyMapping::fetch(&self.fetcher, &self.url)?;
        self.mapping = mapping;
        Ok(())
    }

    pub fn mapping(&self) -> &PropertyMapping {
        &self.mapping
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    const FIXTURE: &str = r#"<table>
        <tr>
          <td><a href="https://www.freebase.com/organization/organization/child">child</a></td>
          <td><a href="https://www.wikidata.org/wiki/Property:P355">P355</a></td>
        </tr>
        <tr>
          <td><a href="https://en.wikipedia.org/wiki/Organization">elsewhere</a></td>
          <td><a href="https://www.wikidata.org/wiki/Property:P31">P31</a></td>
        </tr>
        <tr>
          <td><a href="https://www.freebase.com/people/person/gender">gender</a></td>
          <td>?</td>
        </tr>
    </table>"#;

    /// Serves pages in order; the last one repeats.
    struct ScriptedPages {
        pages: Mutex<Vec<Result<String, u16>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedPages {
        fn new(pages: Vec<Result<&str, u16>>) -> Self {
            Self {
                pages: Mutex::new(
                    pages
                        .into_iter()
                        .rev()
                        .map(|p| p.map(str::to_string))
                        .collect(),
                ),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl PageFetcher for ScriptedPages {
        fn fetch(&self, url: &str) -> Result<String, MappingError> {
            *self.calls.lock().unwrap() += 1;
            let mut pages = self.pages.lock().unwrap();
            let next = if pages.len() > 1 {
                pages.pop().unwrap()
            } else {
                pages.last().cloned().unwrap()
            };
            next.map_err(|status| MappingError::Status {
                url: url.to_string(),
                status,
            })
        }
    }

    #[test]
    fn fixture_yields_forward_and_backward_tables() {
        let conv = PropertyConverter::with_fetcher(
            ScriptedPages::new(vec![Ok(FIXTURE)]),
            DEFAULT_MAPPING_URL,
        )
        .unwrap();

        let forward: Vec<(&str, Option<&str>)> = conv.mapping().forward_entries().collect();
        assert_eq!(
            forward,
            vec![
                ("/organization/organization/child", Some("P355")),
                ("/people/person/gender", None),
            ]
        );
        let backward = conv.mapping().backward_table();
        assert_eq!(backward.len(), 1);
        assert_eq!(
            backward.get("P355").map(String::as_str),
            Some("/organization/organization/child")
        );

        assert_eq!(
            conv.wikidata_property("/organization/organization/child"),
            Some("P355")
        );
        assert_eq!(
            conv.freebase_property("P355"),
            Some("/organization/organization/child")
        );
        // known-but-unmapped and unknown look the same
        assert_eq!(conv.wikidata_property("/people/person/gender"), None);
        assert_eq!(conv.wikidata_property("/no/such/property"), None);
        assert_eq!(conv.freebase_property("P31"), None);
    }

    #[test]
    fn construction_scrapes_once_and_fails_hard() {
        let pages = ScriptedPages::new(vec![Ok(FIXTURE)]);
        let conv = PropertyConverter::with_fetcher(&pages, "http://mapping").unwrap();
        assert_eq!(pages.calls(), 1);
        assert_eq!(conv.url(), "http://mapping");

        let err = PropertyConverter::with_fetcher(ScriptedPages::new(vec![Err(503)]), "u")
            .err()
            .expect("construction must fail");
        assert!(matches!(err, MappingError::Status { status: 503, .. }));
    }

    #[test]
    fn refresh_is_idempotent_on_unchanged_page() {
        let mut conv =
            PropertyConverter::with_fetcher(ScriptedPages::new(vec![Ok(FIXTURE)]), "u").unwrap();
        let before = conv.mapping().clone();
        conv.refresh().unwrap();
        assert_eq!(conv.mapping(), &before);
        conv.refresh().unwrap();
        assert_eq!(conv.mapping(), &before);
    }

    #[test]
    fn refresh_replaces_whole_snapshot() {
        let updated = r#"<table><tr>
            <td><a href="https://www.freebase.com/people/person/gender">gender</a></td>
            <td><a href="/wiki/Property:P21">P21</a></td>
        </tr></table>"#;
        let mut conv = PropertyConverter::with_fetcher(
            ScriptedPages::new(vec![Ok(FIXTURE), Ok(updated)]),
            "u",
        )
        .unwrap();
        conv.refresh().unwrap();

        assert_eq!(conv.wikidata_property("/people/person/gender"), Some("P21"));
        assert_eq!(conv.wikidata_property("/organization/organization/child"), None);
        assert_eq!(conv.freebase_property("P355"), None);
        assert_eq!(conv.mapping().len(), 1);
    }

    #[test]
    fn failed_refresh_keeps_previous_snapshot() {
        let mut conv = PropertyConverter::with_fetcher(
            ScriptedPages::new(vec![Ok(FIXTURE), Err(500)]),
            "u",
        )
        .unwrap();
        assert!(conv.refresh().is_err());
        assert_eq!(
            conv.wikidata_property("/organization/organization/child"),
            Some("P355")
        );
    }

    #[test]
    fn many_to_one_backward_keeps_last_inserted() {
        let mapping = PropertyMapping::from_rows(vec![
            (
                "https://www.freebase.com/a".to_string(),
                Some("/wiki/Property:P1".to_string()),
            ),
            (
                "https://www.freebase.com/b".to_string(),
                Some("/wiki/Property:P1".to_string()),
            ),
        ]);
        assert_eq!(mapping.freebase_property("P1"), Some("/b"));
        assert_eq!(mapping.wikidata_property("/a"), Some("P1"));
        assert_eq!(mapping.mapped_len(), 2);
    }

    #[test]
    fn normalisation_uses_last_prefix_occurrence() {
        let mapping = PropertyMapping::from_rows(vec![
            (
                "http://www.freebase.com/x/y".to_string(),
                Some("Property:P9".to_string()),
            ),
            (
                "https://www.freebase.com/https://www.freebase.com/z".to_string(),
                None,
            ),
        ]);
        // no https prefix: key kept whole; no /wiki/Property: path: value kept whole
        assert_eq!(
            mapping.wikidata_property("http://www.freebase.com/x/y"),
            Some("Property:P9")
        );
        let keys: Vec<&str> = mapping.forward_entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["http://www.freebase.com/x/y", "/z"]);
    }

    #[test]
    fn normalised_key_collision_keeps_first_position() {
        let mapping = PropertyMapping::from_rows(vec![
            ("https://www.freebase.com/a".to_string(), Some("/wiki/Property:P1".to_string())),
            ("https://www.freebase.com/b".to_string(), Some("/wiki/Property:P2".to_string())),
            ("x https://www.freebase.com/a".to_string(), Some("/wiki/Property:P3".to_string())),
        ]);
        let forward: Vec<(&str, Option<&str>)> = mapping.forward_entries().collect();
        assert_eq!(forward, vec![("/a", Some("P3")), ("/b", Some("P2"))]);
        assert_eq!(mapping.freebase_property("P1"), None);
        assert_eq!(mapping.freebase_property("P3"), Some("/a"));
    }

    #[test]
    fn serializes_as_flat_ordered_object() {
        let mapping = PropertyMapping::from_rows(vec![
            ("https://www.freebase.com/b".to_string(), Some("/wiki/Property:P2".to_string())),
            ("https://www.freebase.com/a".to_string(), None),
        ]);
        let json = serde_json::to_string(&mapping).unwrap();
        assert_eq!(json, r#"{"/b":"P2","/a":null}"#);
    }

    fn arb_rows() -> impl Strategy<Value = Vec<(String, Option<String>)>> {
        prop::collection::vec(
            (
                "[a-c]{1,2}",
                prop::option::of(0u8..4),
            ),
            0..12,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .map(|(path, p)| {
                    (
                        format!("{FREEBASE_URL_PREFIX}/{path}"),
                        p.map(|n| format!("https://www.wikidata.org{WIKIDATA_PROPERTY_PATH}P{n}")),
                    )
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn backward_inverts_forward_except_shadowed(rows in arb_rows()) {
            let mapping = PropertyMapping::from_rows(rows);

            for (wd, fb) in mapping.backward_table() {
                prop_assert_eq!(mapping.wikidata_property(fb), Some(wd.as_str()));
            }

            let mut claims: HashMap<&str, usize> = HashMap::new();
            for (_, wd) in mapping.forward_entries() {
                if let Some(wd) = wd {
                    *claims.entry(wd).or_default() += 1;
                }
            }
            for (fb, wd) in mapping.forward_entries() {
                if let Some(wd) = wd {
                    if claims[wd] == 1 {
                        prop_assert_eq!(mapping.freebase_property(wd), Some(fb));
                    }
                }
            }
        }

        #[test]
        fn rebuilding_from_same_rows_is_identical(rows in arb_rows()) {
            let a = PropertyMapping::from_rows(rows.clone());
            let b = PropertyMapping::from_rows(rows);
            prop_assert_eq!(a, b);
        }
    }
}
