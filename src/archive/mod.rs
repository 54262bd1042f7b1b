//! Archive content rewriting for zip-packaged payloads.
//!
//! Some resources carry their payload as a zip container with many named
//! entries (form packages, configuration bundles). The token codec has to
//! reach into every text entry of such a container, while binary entries
//! (images, media, fonts) must come through byte-for-byte.
//!
//! The module reads an archive into memory as an [`Archive`], rewrites
//! entries through a caller-supplied function, and writes a new archive with
//! the same entry names in the same order.

mod webhooks;

pub use webhooks::{WEBHOOK_INFO_SUFFIX, templatize_webhook_url, templatize_webhooks};

use std::io::{Cursor, Read, Write};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::core::{Result, SolutionError};
use crate::tokens::{RunContext, TemplateDictionary, TokenMap, detemplatize_str, templatize_str};

/// Content of one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryContent {
    /// Valid UTF-8 without NUL bytes.
    Text(String),
    /// Anything else.
    Binary(Vec<u8>),
    /// A directory marker.
    Directory,
}

impl EntryContent {
    fn classify(bytes: Vec<u8>) -> Self {
        if bytes.contains(&0) {
            return Self::Binary(bytes);
        }
        match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(err) => Self::Binary(err.into_bytes()),
        }
    }
}

/// One named entry of an [`Archive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry path inside the archive
    pub name: String,
    /// Entry content
    pub content: EntryContent,
    compression: CompressionMethod,
}

impl ArchiveEntry {
    /// The text content, if the entry is text.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            EntryContent::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// An in-memory zip container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    entries: Vec<ArchiveEntry>,
}

impl Archive {
    /// An empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text entry.
    #[must_use]
    pub fn with_text(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.entries.push(ArchiveEntry {
            name: name.into(),
            content: EntryContent::Text(text.into()),
            compression: CompressionMethod::Deflated,
        });
        self
    }

    /// Add a binary entry.
    #[must_use]
    pub fn with_binary(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.entries.push(ArchiveEntry {
            name: name.into(),
            content: EntryContent::Binary(bytes),
            compression: CompressionMethod::Stored,
        });
        self
    }

    /// Read a zip container.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(zip.len());

        for index in 0..zip.len() {
            let mut file = zip.by_index(index)?;
            let name = file.name().to_string();
            let compression = file.compression();
            let content = if file.is_dir() {
                EntryContent::Directory
            } else {
                let mut buf = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
                file.read_to_end(&mut buf).map_err(|e| SolutionError::ArchiveError {
                    reason: format!("Failed to read entry {name}: {e}"),
                })?;
                EntryContent::classify(buf)
            };
            entries.push(ArchiveEntry {
                name,
                content,
                compression,
            });
        }

        Ok(Self { entries })
    }

    /// Write the archive as a zip container.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            let method = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = SimpleFileOptions::default().compression_method(method);
            match &entry.content {
                EntryContent::Directory => writer.add_directory(entry.name.as_str(), options)?,
                EntryContent::Text(text) => {
                    writer.start_file(entry.name.as_str(), options)?;
                    writer.write_all(text.as_bytes())?;
                }
                EntryContent::Binary(bytes) => {
                    writer.start_file(entry.name.as_str(), options)?;
                    writer.write_all(bytes)?;
                }
            }
        }

        Ok(writer.finish()?.into_inner())
    }

    /// Entries in archive order.
    #[must_use]
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Mutable entries in archive order.
    pub fn entries_mut(&mut self) -> &mut [ArchiveEntry] {
        &mut self.entries
    }

    /// The entry named `name`.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}

/// Apply `rewrite(name, text)` to every text entry accepted by `filter`
/// (all entries when `None`), returning a new archive.
///
/// Binary and directory entries are copied untouched.
pub fn rewrite_archive<F, E>(
    archive: &Archive,
    mut rewrite: F,
    filter: Option<&dyn Fn(&str) -> bool>,
) -> std::result::Result<Archive, E>
where
    F: FnMut(&str, &str) -> std::result::Result<String, E>,
{
    let mut out = archive.clone();
    for entry in &mut out.entries {
        if filter.is_some_and(|accept| !accept(&entry.name)) {
            continue;
        }
        if let EntryContent::Text(text) = &entry.content {
            let rewritten = rewrite(&entry.name, text)?;
            entry.content = EntryContent::Text(rewritten);
        }
    }
    Ok(out)
}

/// Templatize a zip payload: webhook urls first, then ids and urls in every
/// text entry.
pub fn templatize_archive(
    bytes: &[u8],
    map: &TokenMap,
    source_base_url: Option<&str>,
    automation_host: &str,
) -> Result<Vec<u8>> {
    let mut archive = Archive::from_bytes(bytes)?;
    let webhooks = templatize_webhooks(archive.entries_mut(), source_base_url, automation_host)?;
    if webhooks > 0 {
        tracing::debug!("Templatized {webhooks} webhook url(s) in archive");
    }
    let templated =
        rewrite_archive::<_, std::convert::Infallible>(&archive, |_, text| Ok(templatize_str(text, map)), None)
            .unwrap_or_else(|never| match never {});
    templated.to_bytes()
}

/// Detemplatize every text entry of a zip payload.
pub fn detemplatize_archive(
    bytes: &[u8],
    dictionary: &TemplateDictionary,
    context: &RunContext,
) -> Result<Vec<u8>> {
    let archive = Archive::from_bytes(bytes)?;
    rewrite_archive(&archive, |_, text| detemplatize_str(text, dictionary, context), None)?
        .to_bytes()
}
