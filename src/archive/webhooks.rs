//! Webhook url templatization inside form packages.
//!
//! Form packages keep their webhook descriptors in `*.info` JSON entries
//! under `notificationsInfo.webhooks`. Each descriptor's `url` is classified:
//!
//! - host is the automation service: its org-id path segment becomes `{{user.orgId}}`
//! - prefixed by the source portal base url: the prefix becomes `{{portalBaseUrl}}`
//! - anything else is left byte-for-byte unchanged

use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use super::{ArchiveEntry, EntryContent};
use crate::core::Result;
use crate::tokens::placeholder;
use crate::constants::{TOKEN_PORTAL_BASE_URL, TOKEN_USER_ORG_ID};

/// Name suffix of entries that may hold webhook descriptors.
pub const WEBHOOK_INFO_SUFFIX: &str = ".info";

static URL_PARTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<scheme>[A-Za-z][A-Za-z0-9+.-]*://)(?P<host>[^/?#]+)/(?P<first>[^/?#]+)(?P<rest>.*)$")
        .expect("url parts pattern is valid")
});

/// Templatize one webhook url, or `None` if neither rule applies.
#[must_use]
pub fn templatize_webhook_url(
    url: &str,
    source_base_url: Option<&str>,
    automation_host: &str,
) -> Option<String> {
    if let Some(caps) = URL_PARTS_RE.captures(url) {
        let host = caps["host"].split(':').next().unwrap_or_default();
        if host.eq_ignore_ascii_case(automation_host) {
            return Some(format!(
                "{}{}/{}{}",
                &caps["scheme"],
                &caps["host"],
                placeholder(TOKEN_USER_ORG_ID),
                &caps["rest"]
            ));
        }
    }

    let base = source_base_url?.trim_end_matches('/');
    if base.is_empty() {
        return None;
    }
    let rest = url.strip_prefix(base)?;
    if rest.is_empty() || rest.starts_with(['/', '?', '#']) {
        Some(format!("{}{rest}", placeholder(TOKEN_PORTAL_BASE_URL)))
    } else {
        None
    }
}

/// Rewrite descriptor urls in `info`, returning each `(old, new)` pair.
fn templatize_descriptor_urls(
    info: &mut Value,
    source_base_url: Option<&str>,
    automation_host: &str,
) -> Vec<(String, String)> {
    let Some(webhooks) = info
        .pointer_mut("/notificationsInfo/webhooks")
        .and_then(Value::as_array_mut)
    else {
        return Vec::new();
    };

    let mut changes = Vec::new();
    for hook in webhooks {
        let Some(url) = hook.get("url").and_then(Value::as_str) else {
            continue;
        };
        if let Some(templated) = templatize_webhook_url(url, source_base_url, automation_host) {
            changes.push((url.to_string(), templated.clone()));
            hook["url"] = Value::String(templated);
        }
    }
    changes
}

/// Splice the new url strings into `text`, keeping the rest of the document
/// byte-for-byte. `None` when the result would not parse back to `expected`,
/// for example when the original escapes characters differently.
fn splice_urls(text: &str, changes: &[(String, String)], expected: &Value) -> Option<String> {
    let mut rewritten = text.to_string();
    let mut seen = BTreeSet::new();
    for (old, new) in changes {
        if !seen.insert(old.as_str()) {
            continue;
        }
        let old = serde_json::to_string(old).ok()?;
        let new = serde_json::to_string(new).ok()?;
        if !rewritten.contains(&old) {
            return None;
        }
        rewritten = rewritten.replace(&old, &new);
    }
    let reparsed: Value = serde_json::from_str(&rewritten).ok()?;
    (reparsed == *expected).then_some(rewritten)
}

/// Templatize webhook urls in every `*.info` entry; returns how many urls changed.
///
/// Entries without webhooks, or whose urls match neither rule, keep their
/// original text exactly. In rewritten entries only the url strings change;
/// key order and formatting elsewhere are kept. Entries that are not valid
/// JSON are skipped.
pub fn templatize_webhooks(
    entries: &mut [ArchiveEntry],
    source_base_url: Option<&str>,
    automation_host: &str,
) -> Result<usize> {
    let mut total = 0;
    for entry in entries.iter_mut() {
        if !entry.name.ends_with(WEBHOOK_INFO_SUFFIX) {
            continue;
        }
        let EntryContent::Text(text) = &entry.content else {
            continue;
        };
        let Ok(mut info) = serde_json::from_str::<Value>(text) else {
            tracing::debug!("Skipping non-JSON info entry {}", entry.name);
            continue;
        };

        let changes = templatize_descriptor_urls(&mut info, source_base_url, automation_host);
        if changes.is_empty() {
            continue;
        }
        let rewritten = match splice_urls(text, &changes, &info) {
            Some(rewritten) => rewritten,
            None => {
                tracing::debug!("Re-serializing {} to rewrite its webhook urls", entry.name);
                serde_json::to_string(&info)?
            }
        };
        entry.content = EntryContent::Text(rewritten);
        total += changes.len();
    }
    Ok(total)
}
