//! Run-scoped resolution state for placeholder substitution.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::constants::{FIELD_FOLDER_ID, FIELD_ITEM_ID, FIELD_URL};

use super::TokenMap;

/// What a token resolved to once its template was created.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionRecord {
    /// Id of the newly created item
    pub new_id: String,
    /// Url of the newly created item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Folder the item was created in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    /// Handler-specific fields such as per-layer urls
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl ResolutionRecord {
    /// A record holding only the new id.
    pub fn new(new_id: impl Into<String>) -> Self {
        Self {
            new_id: new_id.into(),
            ..Self::default()
        }
    }

    /// Look up a dotted field path such as `itemId` or `layer0.url`.
    ///
    /// Non-string leaves render as their JSON text.
    #[must_use]
    pub fn field(&self, path: &str) -> Option<String> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        match (head, rest) {
            (FIELD_ITEM_ID, None) => Some(self.new_id.clone()),
            (FIELD_URL, None) => self.url.clone(),
            (FIELD_FOLDER_ID, None) => self.folder_id.clone(),
            _ => {
                let mut current = self.extra.get(head)?;
                if let Some(rest) = rest {
                    for segment in rest.split('.') {
                        current = match current {
                            Value::Object(map) => map.get(segment)?,
                            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                            _ => return None,
                        };
                    }
                }
                match current {
                    Value::String(s) => Some(s.clone()),
                    Value::Null | Value::Object(_) | Value::Array(_) => None,
                    other => Some(other.to_string()),
                }
            }
        }
    }
}

/// Mapping from token to its resolution record.
///
/// Append-only: a token is resolved exactly once, when its template finishes
/// creation. Owned by a single deployment run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateDictionary {
    entries: BTreeMap<String, ResolutionRecord>,
}

impl TemplateDictionary {
    /// An empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity dictionary for a token map: every token resolves back to
    /// the concrete id and url it was derived from.
    #[must_use]
    pub fn from_token_map(map: &TokenMap) -> Self {
        let mut dictionary = Self::new();
        for (id, entry) in map.iter() {
            let record = ResolutionRecord {
                new_id: id.to_string(),
                url: entry.url.clone(),
                ..ResolutionRecord::default()
            };
            dictionary.entries.insert(entry.token.clone(), record);
        }
        dictionary
    }

    /// Resolve `token`.
    ///
    /// Returns `false` and leaves the existing record in place if the token
    /// was already resolved.
    pub fn resolve(&mut self, token: impl Into<String>, record: ResolutionRecord) -> bool {
        match self.entries.entry(token.into()) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// The record for `token`, if resolved.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<&ResolutionRecord> {
        self.entries.get(token)
    }

    /// Whether `token` has been resolved.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    /// Number of resolved tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolved tokens and their records, ordered by token.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolutionRecord)> {
        self.entries.iter().map(|(token, record)| (token.as_str(), record))
    }
}
