//! Durable storage, autosave, and the portable import/export format.
//!
//! ## Record format
//!
//! The book is stored as one JSON record under a fixed key:
//!
//! ```json
//! { "pages": [ { "id": "cover-1", "type": "cover", ... }, ... ],
//!   "theme": { "bg": "#fffaf3", "text": "#2b2b2b", "accent": "#c0392b" } }
//! ```
//!
//! Older records are a bare page array without the wrapper; they still load,
//! with the default theme. Import/export files use exactly the same shape,
//! pretty-printed, so an exported file re-imports losslessly.
//!
//! ## Storage backends
//!
//! [`Storage`] is a small key-value seam. [`FileStorage`] keeps each key in
//! `<dir>/<key>.json`; [`MemoryStorage`] lives in memory and can enforce a
//! byte quota, which is how quota failures are exercised.
//!
//! ## Autosave
//!
//! [`Autosave`] debounces writes: every change re-arms a timer and the save
//! happens once the timer has run for the configured delay without another
//! change, so a burst of edits costs one write. Time is passed in by the
//! caller (milliseconds), which keeps the policy deterministic under test.
//! The SHA-256 digest of the last written payload suppresses writes that
//! would store identical bytes.

use crate::types::{Document, Page};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not a readable recipe book: {0}")]
    Malformed(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => "the file is not valid JSON",
            serde_json::error::Category::Eof => "the file ends unexpectedly (truncated?)",
            serde_json::error::Category::Data => "the JSON does not describe a recipe book",
            serde_json::error::Category::Io => "the file could not be read",
        };
        PersistError::Malformed(format!("{hint} ({e})"))
    }
}

// ============================================================================
// Record encoding
// ============================================================================

/// Parse a stored record or import file.
///
/// Accepts the `{pages, theme}` wrapper and the legacy bare page array.
pub fn parse_document(text: &str) -> Result<Document, PersistError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    match value {
        serde_json::Value::Array(_) => {
            let pages: Vec<Page> = serde_json::from_value(value)?;
            Ok(Document {
                pages,
                theme: Default::default(),
            })
        }
        serde_json::Value::Object(_) => Ok(serde_json::from_value(value)?),
        _ => Err(PersistError::Malformed(
            "expected an object with `pages` or an array of pages".into(),
        )),
    }
}

/// Encode a book as pretty-printed JSON.
pub fn serialize_document(doc: &Document) -> Result<String, PersistError> {
    Ok(serde_json::to_string_pretty(doc)?)
}

/// Read an import file. Nothing is applied anywhere; the caller decides.
pub fn import_file(path: &Path) -> Result<Document, PersistError> {
    let text = fs::read_to_string(path)?;
    parse_document(&text)
}

/// Write an export file.
pub fn export_file(path: &Path, doc: &Document) -> Result<(), PersistError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serialize_document(doc)?)?;
    Ok(())
}

// ============================================================================
// Storage backends
// ============================================================================

/// Key-value durable storage.
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError>;
    fn remove(&mut self, key: &str) -> Result<(), PersistError>;
}

/// Load the book stored under `key`, if any.
pub fn load(storage: &impl Storage, key: &str) -> Result<Option<Document>, PersistError> {
    storage
        .get(key)?
        .map(|text| parse_document(&text))
        .transpose()
}

/// Store the book under `key` right away.
pub fn save(storage: &mut impl Storage, key: &str, doc: &Document) -> Result<(), PersistError> {
    storage.set(key, &serialize_document(doc)?)
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    /// Writes to a sibling temp file first and renames it over the record,
    /// so a failed write never leaves a half-written book behind.
    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistError> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// In-memory storage with an optional total byte quota.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
    quota: Option<usize>,
    writes: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::default()
        }
    }

    /// Number of successful `set` calls so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError> {
        if let Some(quota) = self.quota {
            let others: usize = self
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            if others + value.len() > quota {
                return Err(PersistError::Storage(format!(
                    "quota exceeded: {} bytes needed, {quota} available",
                    others + value.len()
                )));
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistError> {
        self.entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// Autosave
// ============================================================================

/// What an autosave step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing to save.
    Idle,
    /// A change is waiting for the debounce delay to pass.
    Pending,
    /// The book was written.
    Saved,
    /// A save was due but the payload matched the last write.
    Unchanged,
}

/// Debounced, deduplicating autosave.
#[derive(Debug, Clone)]
pub struct Autosave {
    key: String,
    delay_ms: u64,
    pending_since: Option<u64>,
    retry: bool,
    seen_version: Option<u64>,
    last_digest: Option<String>,
}

impl Autosave {
    pub fn new(key: impl Into<String>, delay_ms: u64) -> Self {
        Self {
            key: key.into(),
            delay_ms,
            pending_since: None,
            retry: false,
            seen_version: None,
            last_digest: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Record `doc` as what storage already holds (e.g. right after loading),
    /// so saving it unchanged is skipped.
    pub fn mark_saved(&mut self, doc: &Document) -> Result<(), PersistError> {
        self.last_digest = Some(digest(&serialize_document(doc)?));
        Ok(())
    }

    /// Arm (or re-arm) the debounce timer.
    pub fn note_change(&mut self, now_ms: u64) {
        self.pending_since = Some(now_ms);
    }

    /// Arm the timer if the store's version moved since the last call.
    pub fn observe(&mut self, version: u64, now_ms: u64) {
        if self.seen_version.is_some_and(|seen| seen != version) {
            self.note_change(now_ms);
        }
        self.seen_version = Some(version);
    }

    /// Whether a change (or a failed save) is waiting to be written.
    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some() || self.retry
    }

    /// Save if the delay has elapsed since the last change.
    pub fn poll(
        &mut self,
        now_ms: u64,
        doc: &Document,
        storage: &mut impl Storage,
    ) -> Result<SaveOutcome, PersistError> {
        match self.pending_since {
            None => Ok(SaveOutcome::Idle),
            Some(since) if now_ms.saturating_sub(since) < self.delay_ms => Ok(SaveOutcome::Pending),
            Some(_) => self.write(doc, storage),
        }
    }

    /// Save now if anything is pending, ignoring the delay.
    pub fn flush(
        &mut self,
        doc: &Document,
        storage: &mut impl Storage,
    ) -> Result<SaveOutcome, PersistError> {
        if !self.is_pending() {
            return Ok(SaveOutcome::Idle);
        }
        self.write(doc, storage)
    }

    /// On failure the in-memory book is untouched and the save stays due, so
    /// the next `flush` (or change) retries it.
    fn write(
        &mut self,
        doc: &Document,
        storage: &mut impl Storage,
    ) -> Result<SaveOutcome, PersistError> {
        self.pending_since = None;
        let payload = serialize_document(doc)?;
        let payload_digest = digest(&payload);
        if self.last_digest.as_deref() == Some(payload_digest.as_str()) {
            self.retry = false;
            return Ok(SaveOutcome::Unchanged);
        }
        match storage.set(&self.key, &payload) {
            Ok(()) => {
                self.retry = false;
                self.last_digest = Some(payload_digest);
                Ok(SaveOutcome::Saved)
            }
            Err(e) => {
                self.retry = true;
                Err(e)
            }
        }
    }
}

fn digest(payload: &str) -> String {
    format!("{:x}", Sha256::digest(payload.as_bytes()))
}
