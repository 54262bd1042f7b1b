//! Helpers shared by the command implementations.

use anyhow::{Context, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;

use crate::delete::ResourceSummary;
use crate::handlers::ConfirmDeletion;
use crate::portal::LocalPortal;
use crate::template::SolutionBundle;

/// Load the bundle at `path`.
pub async fn load_bundle(path: &Path) -> Result<SolutionBundle> {
    SolutionBundle::load(path).await
}

/// Open the portal directory at `path`.
pub async fn open_portal(path: &Path) -> Result<Arc<LocalPortal>> {
    let portal = LocalPortal::open(path)
        .await
        .with_context(|| format!("'{}' is not a portal directory", path.display()))?;
    Ok(Arc::new(portal))
}

/// Read a JSON document.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write `value` as pretty JSON.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Default deployment summary path for `bundle`: `<stem>.deployment.json`.
#[must_use]
pub fn default_summary_path(bundle: &Path) -> PathBuf {
    let stem = bundle.file_stem().and_then(|s| s.to_str()).unwrap_or("solution");
    bundle.with_file_name(format!("{stem}.deployment.json"))
}

/// Asks on stderr and reads `y`/`n` answers from stdin.
pub struct StdinConfirm {
    input: Mutex<BufReader<Stdin>>,
}

impl StdinConfirm {
    /// A gate reading from this process's stdin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            input: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

impl Default for StdinConfirm {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(token: &str, summary: &ResourceSummary) -> String {
    let mut text = format!("{token} ({})", summary.item_type);
    if let Some(title) = &summary.title {
        text.push_str(&format!(" \"{title}\""));
    }
    if let Some(modified) = summary.modified {
        text.push_str(&format!(", modified {}", modified.format("%Y-%m-%d %H:%M")));
    }
    text
}

impl ConfirmDeletion for StdinConfirm {
    fn confirm<'a>(&'a self, token: &'a str, summary: &'a ResourceSummary) -> BoxFuture<'a, bool> {
        async move {
            let mut stderr = tokio::io::stderr();
            let prompt = format!("Delete {}? [y/N] ", describe(token, summary));
            if stderr.write_all(prompt.as_bytes()).await.is_err() {
                return false;
            }
            let _ = stderr.flush().await;

            let mut answer = String::new();
            let mut input = self.input.lock().await;
            match input.read_line(&mut answer).await {
                Ok(0) | Err(_) => false,
                Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            }
        }
        .boxed()
    }
}
