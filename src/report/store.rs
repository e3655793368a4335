//! Durable report storage with an append-only feedback ledger.
//!
//! The store is the single owner of report read/modify/write logic. Bodies
//! are normalized (fences stripped) on every read and before every write, so
//! callers always see canonical text. The ledger is a durability backstop:
//! a section is appended to it only after being merged into the body.

use super::markdown::normalize_body;
use crate::errors::StoreError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Identifies a report by its subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportId {
    subject: String,
    slug: String,
}

impl ReportId {
    /// Derives a stable id from a subject name.
    #[must_use]
    pub fn for_subject(subject: &str) -> Self {
        let mut slug = String::with_capacity(subject.len());
        let mut last_dash = true;
        for ch in subject.chars() {
            if ch.is_ascii_alphanumeric() {
                slug.push(ch.to_ascii_lowercase());
                last_dash = false;
            } else if !last_dash {
                slug.push('-');
                last_dash = true;
            }
        }
        let slug = slug.trim_end_matches('-').to_string();
        let slug = if slug.is_empty() { "report".to_string() } else { slug };

        Self {
            subject: subject.to_string(),
            slug,
        }
    }

    /// The original subject name.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The filesystem-safe key for this report.
    #[must_use]
    pub fn slug(&self) -> &str {
        &self.slug
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slug)
    }
}

/// Storage capability for report bodies and their feedback ledgers.
///
/// Injected into the orchestrator and the revision loop so both can be
/// exercised against an in-memory store in tests.
pub trait ReportStore: Send + Sync + fmt::Debug {
    /// Reads the normalized report body, or `None` if never written.
    fn read(&self, id: &ReportId) -> Result<Option<String>, StoreError>;

    /// Persists a normalized body, creating the parent location if missing.
    /// Full overwrite, not append.
    fn write(&self, id: &ReportId, body: &str) -> Result<(), StoreError>;

    /// Appends a normalized section to the feedback ledger, separated from
    /// prior content by one blank line; creates the ledger if absent.
    fn append_feedback(&self, id: &ReportId, section: &str) -> Result<(), StoreError>;

    /// Reads the full feedback ledger, or `None` if never written.
    fn read_feedback(&self, id: &ReportId) -> Result<Option<String>, StoreError>;

    /// The body and ledger concatenated, for display and export only. Never
    /// used as a write-back source.
    fn combined(&self, id: &ReportId) -> Result<Option<String>, StoreError> {
        let Some(body) = self.read(id)? else {
            return Ok(None);
        };
        match self.read_feedback(id)? {
            Some(ledger) if !ledger.trim().is_empty() => {
                Ok(Some(format!("{}\n\n{}\n", body.trim_end(), ledger.trim_end())))
            }
            _ => Ok(Some(body)),
        }
    }
}

/// Filesystem-backed report store.
///
/// Per subject: the report at `<root>/<slug>.md` and the ledger at
/// `<root>/<slug>.feedback.md`.
#[derive(Debug, Clone)]
pub struct FsReportStore {
    root: PathBuf,
}

impl FsReportStore {
    /// Creates a store rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The path of the report document for an id.
    #[must_use]
    pub fn report_path(&self, id: &ReportId) -> PathBuf {
        self.root.join(format!("{}.md", id.slug()))
    }

    /// The path of the feedback ledger for an id.
    #[must_use]
    pub fn ledger_path(&self, id: &ReportId) -> PathBuf {
        self.root.join(format!("{}.feedback.md", id.slug()))
    }

    fn read_document(path: &Path) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Read {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    fn write_document(path: &Path, text: &str) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Write {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        fs::write(path, text).map_err(|e| StoreError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl ReportStore for FsReportStore {
    fn read(&self, id: &ReportId) -> Result<Option<String>, StoreError> {
        Ok(Self::read_document(&self.report_path(id))?.map(|text| normalize_body(&text)))
    }

    fn write(&self, id: &ReportId, body: &str) -> Result<(), StoreError> {
        Self::write_document(&self.report_path(id), &normalize_body(body))
    }

    fn append_feedback(&self, id: &ReportId, section: &str) -> Result<(), StoreError> {
        let path = self.ledger_path(id);
        let section = normalize_body(section);
        let next = match Self::read_document(&path)? {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{}\n\n{}", existing.trim_end(), section)
            }
            _ => section,
        };
        Self::write_document(&path, &next)
    }

    fn read_feedback(&self, id: &ReportId) -> Result<Option<String>, StoreError> {
        Self::read_document(&self.ledger_path(id))
    }
}

/// In-memory report store for deterministic tests.
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    reports: RwLock<HashMap<String, String>>,
    ledgers: RwLock<HashMap<String, String>>,
}

impl MemoryReportStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the raw stored body without normalization, bypassing the
    /// store contract. Simulates the out-of-band writer racing the revision
    /// loop.
    pub fn clobber(&self, id: &ReportId, raw: &str) {
        self.reports
            .write()
            .insert(id.slug().to_string(), raw.to_string());
    }
}

impl ReportStore for MemoryReportStore {
    fn read(&self, id: &ReportId) -> Result<Option<String>, StoreError> {
        Ok(self
            .reports
            .read()
            .get(id.slug())
            .map(|text| normalize_body(text)))
    }

    fn write(&self, id: &ReportId, body: &str) -> Result<(), StoreError> {
        self.reports
            .write()
            .insert(id.slug().to_string(), normalize_body(body));
        Ok(())
    }

    fn append_feedback(&self, id: &ReportId, section: &str) -> Result<(), StoreError> {
        let section = normalize_body(section);
        let mut ledgers = self.ledgers.write();
        let entry = ledgers.entry(id.slug().to_string()).or_default();
        if entry.trim().is_empty() {
            *entry = section;
        } else {
            *entry = format!("{}\n\n{}", entry.trim_end(), section);
        }
        Ok(())
    }

    fn read_feedback(&self, id: &ReportId) -> Result<Option<String>, StoreError> {
        Ok(self.ledgers.read().get(id.slug()).cloned())
    }
}
