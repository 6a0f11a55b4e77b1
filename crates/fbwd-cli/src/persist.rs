//! Flat JSON files: the QID collection going in, dictionaries coming out.

use anyhow::{Context, Result};
use serde::de::{Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Identifier collection in file order.
///
/// Accepts a JSON array of strings, or an object whose keys are the
/// identifiers (values are ignored).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdCollection(pub Vec<String>);

impl<'de> Deserialize<'de> for IdCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdsVisitor;

        impl<'de> Visitor<'de> for IdsVisitor {
            type Value = IdCollection;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an array of identifier strings or an object keyed by identifier")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut ids = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(id) = seq.next_element::<String>()? {
                    ids.push(id);
                }
                Ok(IdCollection(ids))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut ids = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((id, IgnoredAny)) = map.next_entry::<String, IgnoredAny>()? {
                    ids.push(id);
                }
                Ok(IdCollection(ids))
            }
        }

        deserializer.deserialize_any(IdsVisitor)
    }
}

pub fn read_id_collection(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read id collection: {}", path.display()))?;
    let ids: IdCollection = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse id collection: {}", path.display()))?;
    Ok(ids.0)
}

/// Write any serializable dictionary as pretty JSON.
pub fn write_dictionary<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)
        .with_context(|| format!("failed to write dictionary: {}", path.display()))
}
