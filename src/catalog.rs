//! Resource Catalog
//!
//! Maps (message kind, language, encoding) to pre-rendered audio files found
//! in the audio directory. Filenames follow `<kind>.<language>.<encoding>`,
//! with the language defaulting to "default" when only two parts are present
//! (e.g. `ready.wav` is stored under kind "ready", language "default").

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// kind -> language -> encoding -> file path
pub type CatalogEntries = BTreeMap<String, BTreeMap<String, BTreeMap<String, PathBuf>>>;

/// Result of a catalog rescan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    /// Number of distinct message kinds found
    pub kinds: usize,
    /// Total audio files indexed
    pub files: usize,
}

pub struct ResourceCatalog {
    entries: CatalogEntries,
    audio_dir: PathBuf,
    formats: Vec<String>,
}

impl ResourceCatalog {
    /// Create an empty catalog for the given directory and supported formats
    pub fn new(audio_dir: impl Into<PathBuf>, formats: Vec<String>) -> Self {
        Self {
            entries: CatalogEntries::new(),
            audio_dir: audio_dir.into(),
            formats,
        }
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub fn formats(&self) -> &[String] {
        &self.formats
    }

    /// Message kinds currently present in the catalog
    pub fn kinds(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn contains_kind(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    /// Build a fresh entry map from the audio directory.
    ///
    /// Never fails past this boundary: unparsable filenames are skipped and a
    /// missing or unreadable directory yields an empty map with a logged
    /// warning.
    pub fn scan(audio_dir: &Path, formats: &[String]) -> (CatalogEntries, ScanReport) {
        let mut entries = CatalogEntries::new();
        let mut files = 0usize;

        if !audio_dir.exists() {
            warn!("⚠️ Audio directory does not exist: {}", audio_dir.display());
            return (entries, ScanReport { kinds: 0, files: 0 });
        }

        for entry in WalkDir::new(audio_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().to_string();

            let Some((kind, language, encoding)) = parse_filename(&filename) else {
                continue;
            };
            if !formats.iter().any(|f| f == &encoding) {
                continue;
            }

            debug!(
                "Found audio file: {} -> {} ({}/{})",
                kind,
                entry.path().display(),
                language,
                encoding
            );

            entries
                .entry(kind)
                .or_default()
                .entry(language)
                .or_default()
                .insert(encoding, entry.path().to_path_buf());
            files += 1;
        }

        let kinds = entries.len();
        info!("Audio file scan complete. Found {} message kinds", kinds);
        (entries, ScanReport { kinds, files })
    }

    /// Replace the entry map wholesale (rebuild-then-swap)
    pub fn install(&mut self, entries: CatalogEntries) {
        self.entries = entries;
    }

    /// Clear and rebuild the catalog from the audio directory
    pub fn rescan(&mut self) -> ScanReport {
        let (entries, report) = Self::scan(&self.audio_dir, &self.formats);
        self.entries = entries;
        report
    }

    /// Resolve a playable file for the given kind and language.
    ///
    /// Language fallback: exact -> "en" -> "default" -> any available. At the
    /// matched language, the first encoding from `preferred` that is present
    /// wins, else any encoding available for that language.
    pub fn resolve(&self, kind: &str, language: &str, preferred: &[String]) -> Option<PathBuf> {
        let languages = self.entries.get(kind)?;

        let by_language = languages
            .get(language)
            .or_else(|| languages.get("en"))
            .or_else(|| languages.get("default"))
            .or_else(|| languages.values().next())?;

        preferred
            .iter()
            .find_map(|enc| by_language.get(enc))
            .or_else(|| by_language.values().next())
            .cloned()
    }
}

/// Parse `<kind>.<language>.<encoding>` (language optional) from a filename
fn parse_filename(filename: &str) -> Option<(String, String, String)> {
    let mut parts = filename.rsplitn(3, '.');
    let encoding = parts.next()?.to_lowercase();
    let second = parts.next()?;

    match parts.next() {
        Some(kind) => Some((kind.to_string(), second.to_string(), encoding)),
        None => Some((second.to_string(), "default".to_string(), encoding)),
    }
}
