//! Token codec: concrete ids and urls to `{{token.field}}` placeholders and back.
//!
//! Templatization is textual rather than schema aware, because payloads are
//! heterogeneous and partly unstructured. The rules are:
//!
//! - Known item urls are replaced first, longest first, with `{{<token>.url}}`.
//!   A url matches only where it ends at a boundary: end of text, or a
//!   character that cannot continue a path segment (anything but ASCII
//!   alphanumerics and `-._~%`). `https://host/svc` therefore matches in
//!   `https://host/svc/0` and `https://host/svc?f=json` but not in
//!   `https://host/svc2`. A url ending in `/` matches wherever it occurs.
//! - Hex runs of exactly 32 characters that are known ids are replaced with
//!   `{{<token>.itemId}}`. Longer hex runs (commit hashes, digests) are never
//!   split, and unknown ids are left alone.
//! - Text that is already a `{{...}}` placeholder is never re-scanned, so
//!   templatizing twice yields the same result.
//! - Object keys are rewritten as well as string values.
//!
//! Detemplatization looks every placeholder up in a [`TemplateDictionary`]
//! or in the run-wide [`RunContext`] (`portalBaseUrl`, `user.orgId`,
//! `user.username`) and fails with [`SolutionError::UnresolvedToken`] when
//! neither knows it.
//!
//! Known limitation: input text that already contains `{{...}}` sequences of
//! its own is passed through templatization untouched and will be treated as
//! a placeholder on the way back.
//!
//! # Example
//!
//! ```rust
//! use soldeploy_cli::tokens::{RunContext, TemplateDictionary, TokenMap, detemplatize, templatize};
//! use serde_json::json;
//!
//! let id = "0123456789abcdef0123456789abcdef";
//! let mut map = TokenMap::new();
//! map.insert(id, id, None);
//!
//! let original = json!({"webmap": id});
//! let templated = templatize(&original, &map);
//! assert_eq!(templated["webmap"], format!("{{{{{id}.itemId}}}}"));
//!
//! let dictionary = TemplateDictionary::from_token_map(&map);
//! let restored = detemplatize(&templated, &dictionary, &RunContext::default()).unwrap();
//! assert_eq!(restored, original);
//! ```

mod dictionary;

pub use dictionary::{ResolutionRecord, TemplateDictionary};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::LazyLock;

use crate::constants::{
    FIELD_ITEM_ID, FIELD_URL, HEX_RUN_PATTERN, ITEM_ID_LEN, PLACEHOLDER_PATTERN,
    TOKEN_PORTAL_BASE_URL, TOKEN_USER_ORG_ID, TOKEN_USER_USERNAME,
};
use crate::core::{Result, SolutionError};

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is valid"));

static HEX_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(HEX_RUN_PATTERN).expect("hex run pattern is valid"));

/// Render a placeholder for `path`.
#[must_use]
pub fn placeholder(path: &str) -> String {
    format!("{{{{{path}}}}}")
}

/// Render the `{{token.field}}` placeholder.
#[must_use]
pub fn token_placeholder(token: &str, field: &str) -> String {
    placeholder(&format!("{token}.{field}"))
}

/// Token and url known for one concrete id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEntry {
    /// Symbolic key, normally equal to the id
    pub token: String,
    /// Item or service url to replace with `{{token.url}}`
    pub url: Option<String>,
}

/// Concrete ids (and their urls) that templatization replaces.
#[derive(Debug, Clone, Default)]
pub struct TokenMap {
    entries: BTreeMap<String, TokenEntry>,
    // (url, token), longest url first
    urls: Vec<(String, String)>,
}

impl TokenMap {
    /// An empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` under `token`, optionally with its url.
    pub fn insert(&mut self, id: impl Into<String>, token: impl Into<String>, url: Option<String>) {
        let id = id.into();
        let token = token.into();
        let url = url.filter(|u| !u.is_empty());

        self.urls.retain(|(_, t)| *t != token);
        if let Some(url) = &url {
            self.urls.push((url.clone(), token.clone()));
            self.urls.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        }
        self.entries.insert(id, TokenEntry { token, url });
    }

    /// A copy without `id` and its url.
    #[must_use]
    pub fn without(&self, id: &str) -> Self {
        let mut map = self.clone();
        if let Some(entry) = map.entries.remove(id) {
            map.urls.retain(|(_, t)| *t != entry.token);
        }
        map
    }

    /// The token registered for `id`.
    #[must_use]
    pub fn token_for(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|entry| entry.token.as_str())
    }

    /// Registered ids with their entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TokenEntry)> {
        self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    /// Number of registered ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no ids are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Run-wide values behind the special tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunContext {
    /// Destination organization id (`{{user.orgId}}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    /// Destination portal base url (`{{portalBaseUrl}}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portal_base_url: Option<String>,
    /// Acting user name (`{{user.username}}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl RunContext {
    fn special(&self, path: &str) -> Option<Option<&str>> {
        match path {
            TOKEN_PORTAL_BASE_URL => Some(self.portal_base_url.as_deref()),
            TOKEN_USER_ORG_ID => Some(self.org_id.as_deref()),
            TOKEN_USER_USERNAME => Some(self.username.as_deref()),
            _ => None,
        }
    }
}

/// Whether `path` names a run-wide token rather than a template token.
#[must_use]
pub fn is_special_token(path: &str) -> bool {
    matches!(path, TOKEN_PORTAL_BASE_URL | TOKEN_USER_ORG_ID | TOKEN_USER_USERNAME)
}

/// The template token a placeholder path refers to, or `None` for run-wide tokens.
#[must_use]
pub fn token_of(path: &str) -> Option<&str> {
    if is_special_token(path) {
        return None;
    }
    Some(path.split_once('.').map_or(path, |(token, _)| token))
}

/// Apply `f` to the parts of `text` outside existing placeholders.
fn map_plain_segments(text: &str, mut f: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in PLACEHOLDER_RE.find_iter(text) {
        out.push_str(&f(&text[last..m.start()]));
        out.push_str(m.as_str());
        last = m.end();
    }
    out.push_str(&f(&text[last..]));
    out
}

fn continues_segment(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '%')
}

/// Replace occurrences of `url` that end at a boundary.
fn replace_url(text: &str, url: &str, replacement: &str) -> String {
    let open_ended = url.ends_with('/');
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, _) in text.match_indices(url) {
        if start < last {
            continue;
        }
        let end = start + url.len();
        let bounded = open_ended || !text[end..].chars().next().is_some_and(continues_segment);
        if bounded {
            out.push_str(&text[last..start]);
            out.push_str(replacement);
            last = end;
        }
    }
    out.push_str(&text[last..]);
    out
}

/// Templatize a single string.
#[must_use]
pub fn templatize_str(text: &str, map: &TokenMap) -> String {
    if map.is_empty() {
        return text.to_string();
    }

    let with_urls = map_plain_segments(text, |segment| {
        let mut segment = segment.to_string();
        for (url, token) in &map.urls {
            if segment.contains(url.as_str()) {
                segment = replace_url(&segment, url, &token_placeholder(token, FIELD_URL));
            }
        }
        segment
    });

    map_plain_segments(&with_urls, |segment| {
        HEX_RUN_RE
            .replace_all(segment, |caps: &Captures<'_>| {
                let run = &caps[0];
                match map.token_for(run) {
                    Some(token) if run.len() == ITEM_ID_LEN => {
                        token_placeholder(token, FIELD_ITEM_ID)
                    }
                    _ => run.to_string(),
                }
            })
            .into_owned()
    })
}

/// Templatize every string (and object key) in a nested value.
#[must_use]
pub fn templatize(value: &Value, map: &TokenMap) -> Value {
    match map_strings::<Infallible>(value, &mut |s| Ok(templatize_str(s, map))) {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

fn resolve_path(path: &str, dictionary: &TemplateDictionary, context: &RunContext) -> Option<String> {
    if let Some(special) = context.special(path) {
        return special.map(str::to_string);
    }
    let (token, field) = path.split_once('.')?;
    dictionary.get(token)?.field(field)
}

/// Detemplatize a single string.
pub fn detemplatize_str(
    text: &str,
    dictionary: &TemplateDictionary,
    context: &RunContext,
) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in PLACEHOLDER_RE.captures_iter(text) {
        let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let resolved = resolve_path(path.as_str(), dictionary, context).ok_or_else(|| {
            SolutionError::UnresolvedToken {
                placeholder: path.as_str().to_string(),
            }
        })?;
        out.push_str(&text[last..whole.start()]);
        out.push_str(&resolved);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Detemplatize every string (and object key) in a nested value.
pub fn detemplatize(
    value: &Value,
    dictionary: &TemplateDictionary,
    context: &RunContext,
) -> Result<Value> {
    map_strings(value, &mut |s| detemplatize_str(s, dictionary, context))
}

/// Placeholder paths in `text` that cannot be resolved, in encounter order.
#[must_use]
pub fn find_unresolved_str(
    text: &str,
    dictionary: &TemplateDictionary,
    context: &RunContext,
) -> Vec<String> {
    let mut missing = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(text) {
        let path = &caps[1];
        if resolve_path(path, dictionary, context).is_none() && !missing.iter().any(|m| m == path)
        {
            missing.push(path.to_string());
        }
    }
    missing
}

/// Placeholder paths anywhere in `value` that cannot be resolved.
///
/// This is the reporting counterpart of [`detemplatize`] for preview tooling:
/// it never fails, it lists what a deployment with this dictionary would miss.
#[must_use]
pub fn find_unresolved(
    value: &Value,
    dictionary: &TemplateDictionary,
    context: &RunContext,
) -> Vec<String> {
    let mut missing = Vec::new();
    visit_strings(value, &mut |s| {
        for path in find_unresolved_str(s, dictionary, context) {
            if !missing.contains(&path) {
                missing.push(path);
            }
        }
    });
    missing
}

/// Every placeholder path in `value`, deduplicated in encounter order.
#[must_use]
pub fn placeholder_paths(value: &Value) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    visit_strings(value, &mut |s| {
        for caps in PLACEHOLDER_RE.captures_iter(s) {
            let path = &caps[1];
            if !paths.iter().any(|p| p == path) {
                paths.push(path.to_string());
            }
        }
    });
    paths
}

/// Placeholder paths in a single string.
#[must_use]
pub fn placeholder_paths_str(text: &str) -> Vec<String> {
    placeholder_paths(&Value::String(text.to_string()))
}

fn visit_strings(value: &Value, f: &mut impl FnMut(&str)) {
    match value {
        Value::String(s) => f(s),
        Value::Array(items) => items.iter().for_each(|item| visit_strings(item, f)),
        Value::Object(map) => {
            for (key, item) in map {
                f(key);
                visit_strings(item, f);
            }
        }
        _ => {}
    }
}

fn map_strings<E>(
    value: &Value,
    f: &mut impl FnMut(&str) -> std::result::Result<String, E>,
) -> std::result::Result<Value, E> {
    Ok(match value {
        Value::String(s) => Value::String(f(s)?),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| map_strings(item, f)).collect::<Result<_, E>>()?)
        }
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(f(key)?, map_strings(item, f)?);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1";
    const B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb2";
    const UNKNOWN: &str = "ccccccccccccccccccccccccccccccc3";
    const SERVICE_URL: &str = "https://services.example.com/org/arcgis/rest/services/Parcels/FeatureServer";

    fn sample_map() -> TokenMap {
        let mut map = TokenMap::new();
        map.insert(A, A, None);
        map.insert(B, B, Some(SERVICE_URL.to_string()));
        map
    }

    #[test]
    fn test_templatize_ids_and_urls() {
        let value = json!({
            "webmap": A,
            "layers": [{"url": format!("{SERVICE_URL}/0"), "itemId": B}],
            "other": UNKNOWN,
        });
        let templated = templatize(&value, &sample_map());

        assert_eq!(templated["webmap"], format!("{{{{{A}.itemId}}}}"));
        assert_eq!(templated["layers"][0]["url"], format!("{{{{{B}.url}}}}/0"));
        assert_eq!(templated["layers"][0]["itemId"], format!("{{{{{B}.itemId}}}}"));
        assert_eq!(templated["other"], UNKNOWN);
    }

    #[test]
    fn test_url_matches_end_at_a_boundary() {
        let map = sample_map();
        let url = format!("{{{{{B}.url}}}}");
        assert_eq!(templatize_str(&format!("{SERVICE_URL}/0"), &map), format!("{url}/0"));
        assert_eq!(templatize_str(&format!("{SERVICE_URL}?f=json"), &map), format!("{url}?f=json"));
        assert_eq!(templatize_str(&format!("\"{SERVICE_URL}\""), &map), format!("\"{url}\""));
        assert_eq!(templatize_str(SERVICE_URL, &map), url);

        let sibling = format!("{SERVICE_URL}2/0");
        assert_eq!(templatize_str(&sibling, &map), sibling);
        let suffixed = format!("{SERVICE_URL}_view");
        assert_eq!(templatize_str(&suffixed, &map), suffixed);

        let both = format!("{SERVICE_URL}2 {SERVICE_URL}");
        assert_eq!(templatize_str(&both, &map), format!("{SERVICE_URL}2 {url}"));
    }

    #[test]
    fn test_map_without_leaves_id_and_url_concrete() {
        let map = sample_map().without(B);
        let text = format!("{SERVICE_URL}/0 {B} {A}");
        assert_eq!(templatize_str(&text, &map), format!("{SERVICE_URL}/0 {B} {{{{{A}.itemId}}}}"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_templatize_is_idempotent() {
        let value = json!({"text": format!("see {A} and {SERVICE_URL}/2 and id={B}")});
        let map = sample_map();
        let once = templatize(&value, &map);
        let twice = templatize(&once, &map);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_longer_hex_runs_are_not_split() {
        let digest = format!("{A}deadbeef");
        let text = format!("sha={digest}");
        assert_eq!(templatize_str(&text, &sample_map()), text);
    }

    #[test]
    fn test_object_keys_are_rewritten() {
        let value = json!({ A: {"visible": true} });
        let templated = templatize(&value, &sample_map());
        let key = format!("{{{{{A}.itemId}}}}");
        assert!(templated.get(&key).is_some());
    }

    #[test]
    fn test_round_trip_law() {
        let map = sample_map();
        let dictionary = TemplateDictionary::from_token_map(&map);
        let context = RunContext::default();
        let cases = vec![
            json!(null),
            json!(42),
            json!("no ids here"),
            json!(A),
            json!([A, B, UNKNOWN, {"nested": [format!("{SERVICE_URL}/3?x={A}")]}]),
            json!({A: B, "deep": {"deeper": {"url": SERVICE_URL, "n": 1.5, "flag": false}}}),
            json!({"mixed": format!("{A}{B}"), "spaced": format!("{A} {B}"), "digest": format!("{A}0")}),
        ];

        for case in cases {
            let templated = templatize(&case, &map);
            let restored = detemplatize(&templated, &dictionary, &context).unwrap();
            assert_eq!(restored, case, "round trip failed for {case}");
        }
    }

    #[test]
    fn test_round_trip_over_generated_values() {
        // Pseudo-random nesting over a fixed alphabet of fragments.
        let map = sample_map();
        let dictionary = TemplateDictionary::from_token_map(&map);
        let fragments = [A, B, UNKNOWN, SERVICE_URL, "/", "-", "text", "0", " "];
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        for _ in 0..200 {
            let mut items = Vec::new();
            for _ in 0..(next() % 5) {
                let mut s = String::new();
                for _ in 0..(next() % 6) {
                    s.push_str(fragments[(next() % fragments.len() as u64) as usize]);
                }
                items.push(json!({ s.clone(): [s.clone(), {"v": s}] }));
            }
            let case = Value::Array(items);
            let templated = templatize(&case, &map);
            let restored = detemplatize(&templated, &dictionary, &RunContext::default()).unwrap();
            assert_eq!(restored, case);
        }
    }

    #[test]
    fn test_detemplatize_special_tokens() {
        let context = RunContext {
            org_id: Some("org42".to_string()),
            portal_base_url: Some("https://dest.example.com/portal".to_string()),
            username: Some("casey".to_string()),
        };
        let value = json!("{{portalBaseUrl}}/home?org={{user.orgId}}&u={{user.username}}");
        let resolved = detemplatize(&value, &TemplateDictionary::new(), &context).unwrap();
        assert_eq!(resolved, json!("https://dest.example.com/portal/home?org=org42&u=casey"));
    }

    #[test]
    fn test_detemplatize_unresolved_token_fails() {
        let value = json!({"webmap": format!("{{{{{A}.itemId}}}}")});
        let err = detemplatize(&value, &TemplateDictionary::new(), &RunContext::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SolutionError::UnresolvedToken { ref placeholder } if placeholder == &format!("{A}.itemId")
        ));
    }

    #[test]
    fn test_find_unresolved_reports_instead_of_failing() {
        let mut dictionary = TemplateDictionary::new();
        dictionary.resolve(A, ResolutionRecord::new("new-a"));
        let value = json!([
            format!("{{{{{A}.itemId}}}}"),
            format!("{{{{{B}.itemId}}}} {{{{{B}.itemId}}}}"),
            "{{portalBaseUrl}}",
        ]);
        let missing = find_unresolved(&value, &dictionary, &RunContext::default());
        assert_eq!(missing, vec![format!("{B}.itemId"), "portalBaseUrl".to_string()]);
    }

    #[test]
    fn test_token_of() {
        assert_eq!(token_of("abc.itemId"), Some("abc"));
        assert_eq!(token_of("abc.layer0.url"), Some("abc"));
        assert_eq!(token_of("user.orgId"), None);
        assert_eq!(token_of("portalBaseUrl"), None);
    }

    #[test]
    fn test_placeholder_paths() {
        let value = json!({"{{a.itemId}}": ["{{b.url}}/0", "{{a.itemId}}"]});
        assert_eq!(placeholder_paths(&value), vec!["a.itemId".to_string(), "b.url".to_string()]);
    }
}
