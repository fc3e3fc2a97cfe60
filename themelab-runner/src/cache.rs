//! Report cache keyed by run fingerprint.
//!
//! Layout: `<root>/<fingerprint>/entry.json`. Entries are written atomically
//! and returned verbatim, so a warm run yields the same report bytes as the
//! cold run that stored it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use themelab_core::fingerprint::Fingerprint;

use crate::atomic::atomic_write;
use crate::report::{Report, SCHEMA_VERSION};

const ENTRY_FILE: &str = "entry.json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt cache entry {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("cache entry fingerprint mismatch: stored under {expected}, entry says {found}")]
    FingerprintMismatch { expected: String, found: String },

    #[error("failed to serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What is stored on disk for one fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub created_at: DateTime<Utc>,
    pub report: Report,
}

/// Cache for screen reports.
#[derive(Debug, Clone)]
pub struct ReportCache {
    root: PathBuf,
}

impl ReportCache {
    /// The root directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the entry for `fingerprint` lives, whether or not it exists.
    pub fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.root.join(fingerprint.as_str()).join(ENTRY_FILE)
    }

    /// Checks if a report is cached for the given fingerprint.
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entry_path(fingerprint).is_file()
    }

    /// Read the entry for `fingerprint`.
    ///
    /// Returns `None` if nothing is cached. An entry that does not parse, was
    /// written with a newer report schema, or whose embedded fingerprint
    /// differs from its key, is an error.
    pub fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(fingerprint);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        let entry: CacheEntry = serde_json::from_str(&json).map_err(|e| CacheError::Corrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        if entry.report.schema_version > SCHEMA_VERSION {
            return Err(CacheError::Corrupt {
                path,
                reason: format!(
                    "report schema version {} is newer than supported {SCHEMA_VERSION}",
                    entry.report.schema_version
                ),
            });
        }

        if &entry.fingerprint != fingerprint || &entry.report.fingerprint != fingerprint {
            let found = if &entry.fingerprint != fingerprint {
                &entry.fingerprint
            } else {
                &entry.report.fingerprint
            };
            return Err(CacheError::FingerprintMismatch {
                expected: fingerprint.to_string(),
                found: found.to_string(),
            });
        }
        Ok(Some(entry))
    }

    /// Store a report under its own fingerprint.
    pub fn put(&self, report: &Report) -> Result<CacheEntry, CacheError> {
        let entry = CacheEntry {
            fingerprint: report.fingerprint.clone(),
            created_at: Utc::now(),
            report: report.clone(),
        };
        let json = serde_json::to_string_pretty(&entry)?;
        let path = self.entry_path(&entry.fingerprint);
        atomic_write(&path, json.as_bytes()).map_err(|source| CacheError::Io { path, source })?;
        Ok(entry)
    }

    /// Return the cached report, or compute, store and return it.
    ///
    /// A failed computation stores nothing. The boolean is `true` on a hit.
    pub fn get_or_compute<E, F>(
        &self,
        fingerprint: &Fingerprint,
        compute: F,
    ) -> Result<(Report, bool), E>
    where
        F: FnOnce() -> Result<Report, E>,
        E: From<CacheError>,
    {
        if let Some(entry) = self.get(fingerprint)? {
            return Ok((entry.report, true));
        }
        let report = compute()?;
        if &report.fingerprint != fingerprint {
            return Err(CacheError::FingerprintMismatch {
                expected: fingerprint.to_string(),
                found: report.fingerprint.to_string(),
            }
            .into());
        }
        self.put(&report)?;
        Ok((report, false))
    }

    /// Removes the entry for a fingerprint, if any.
    pub fn remove(&self, fingerprint: &Fingerprint) -> Result<(), CacheError> {
        let dir = self.root.join(fingerprint.as_str());
        if dir.exists() {
            std::fs::remove_dir_all(&dir).map_err(|source| CacheError::Io { path: dir, source })?;
        }
        Ok(())
    }

    /// Fingerprints of every stored entry, sorted.
    ///
    /// Directories whose name is not a fingerprint, or which hold no entry
    /// file, are ignored.
    pub fn entries(&self) -> Result<Vec<Fingerprint>, CacheError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let io_err = |source| CacheError::Io {
            path: self.root.clone(),
            source,
        };
        let mut fingerprints = Vec::new();
        for dir_entry in std::fs::read_dir(&self.root).map_err(io_err)? {
            let dir_entry = dir_entry.map_err(io_err)?;
            let name = dir_entry.file_name().to_string_lossy().into_owned();
            if Fingerprint::is_well_formed(&name) && dir_entry.path().join(ENTRY_FILE).is_file() {
                fingerprints.push(Fingerprint(name));
            }
        }
        fingerprints.sort();
        Ok(fingerprints)
    }

    /// Clears all cached entries. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let fingerprints = self.entries()?;
        for fingerprint in &fingerprints {
            self.remove(fingerprint)?;
        }
        Ok(fingerprints.len())
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> Result<usize, CacheError> {
        Ok(self.entries()?.len())
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}
