//! Resource data model shared by the extractor, builder, and orchestrators.
//!
//! A [`Resource`] is an item as it exists live on the source platform. The
//! engine never mutates resources; it reads them once while building the
//! template graph.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::constants::ITEM_ID_LEN;

/// Name of a resource kind such as `Web Map` or `Feature Service`.
///
/// Comparison and hashing ignore ASCII case so registries keyed by type
/// accept `web map` and `Web Map` alike. The original spelling is kept for
/// display and serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(String);

impl ResourceType {
    /// Create a resource type from its display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The type name as originally spelled.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased key used for registry lookups.
    #[must_use]
    pub fn key(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl PartialEq for ResourceType {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for ResourceType {}

impl Hash for ResourceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A resource id with an optional sub-part selector.
///
/// The first [`ITEM_ID_LEN`] characters are the base id whenever the value is
/// longer than that and starts with a full-width id; the rest (minus one
/// leading `_` or `/` separator) is the selector, e.g. a layer index within a
/// multi-layer service. Shorter values are all base.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtendedId {
    base: String,
    selector: Option<String>,
}

impl ExtendedId {
    /// An extended id with no selector.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            selector: None,
        }
    }

    /// An extended id selecting a sub-part of `base`.
    pub fn with_selector(base: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            selector: Some(selector.into()),
        }
    }

    /// Parse `raw`, splitting off any selector after the fixed-width base id.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let splittable = raw.len() > ITEM_ID_LEN
            && raw.is_char_boundary(ITEM_ID_LEN)
            && raw[..ITEM_ID_LEN].chars().all(|c| c.is_ascii_hexdigit());
        if !splittable {
            return Self::new(raw);
        }

        let (base, rest) = raw.split_at(ITEM_ID_LEN);
        let rest = rest.strip_prefix(['_', '/']).unwrap_or(rest);
        if rest.is_empty() {
            Self::new(base)
        } else {
            Self::with_selector(base, rest)
        }
    }

    /// The base resource id used for graph edges.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The sub-part selector, if any.
    #[must_use]
    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }
}

impl fmt::Display for ExtendedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.selector {
            Some(selector) => write!(f, "{}_{}", self.base, selector),
            None => f.write_str(&self.base),
        }
    }
}

impl FromStr for ExtendedId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Opaque payload of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "camelCase")]
pub enum ResourceData {
    /// A JSON document.
    Json(serde_json::Value),
    /// A zip archive with named entries.
    Archive(#[serde(with = "base64_bytes")] Vec<u8>),
}

/// A named binary payload attached to a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name of the attachment
    pub name: String,
    /// Attachment content
    pub content: AttachmentContent,
}

/// Content of an [`Attachment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "camelCase")]
pub enum AttachmentContent {
    /// UTF-8 text (JSON, XML, CSS, ...).
    Text(String),
    /// A zip archive whose text entries are rewritten like documents.
    Archive(#[serde(with = "base64_bytes")] Vec<u8>),
    /// Anything else; never rewritten.
    Binary(#[serde(with = "base64_bytes")] Vec<u8>),
}

/// A unit as it exists live on the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Platform-assigned id
    pub id: String,
    /// Resource kind
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Metadata document (title, url, typeKeywords, properties, ...)
    #[serde(default)]
    pub base: serde_json::Value,
    /// Optional payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResourceData>,
    /// Ordered attachments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Groups the resource is shared into
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_ids: Vec<String>,
}

impl Resource {
    /// A resource with an empty base document and no payload.
    pub fn new(id: impl Into<String>, resource_type: impl Into<ResourceType>) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            base: serde_json::Value::Object(serde_json::Map::new()),
            data: None,
            attachments: Vec::new(),
            group_ids: Vec::new(),
        }
    }

    /// Replace the base document.
    #[must_use]
    pub fn with_base(mut self, base: serde_json::Value) -> Self {
        self.base = base;
        self
    }

    /// Attach a JSON data document.
    #[must_use]
    pub fn with_json_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(ResourceData::Json(data));
        self
    }

    /// Record membership in `group_id`.
    #[must_use]
    pub fn in_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_ids.push(group_id.into());
        self
    }

    /// The JSON data document, if the payload is JSON.
    #[must_use]
    pub fn json_data(&self) -> Option<&serde_json::Value> {
        match &self.data {
            Some(ResourceData::Json(value)) => Some(value),
            _ => None,
        }
    }

    /// The service or item url from the base document.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.base.get("url").and_then(serde_json::Value::as_str).filter(|url| !url.is_empty())
    }

    /// Whether `keyword` appears in the base document's `typeKeywords`.
    #[must_use]
    pub fn has_type_keyword(&self, keyword: &str) -> bool {
        self.base
            .get("typeKeywords")
            .and_then(serde_json::Value::as_array)
            .is_some_and(|keywords| keywords.iter().any(|k| k.as_str() == Some(keyword)))
    }
}

/// Serde adapter storing bytes as standard base64 text.
pub(crate) mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}
