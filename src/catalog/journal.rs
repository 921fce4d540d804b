// src/catalog/journal.rs

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::FileEntry;
use crate::errors::Result;

/// Default catalog journal location, relative to the working directory.
pub const CATALOG_FILE_PATH: &str = ".radargen/catalog.jsonl";

/// Append-only JSON-lines copy of the catalog: one `FileEntry` per line.
///
/// Replayed and compacted on open; trims rewrite the file.
#[derive(Debug)]
pub(crate) struct CatalogJournal {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl CatalogJournal {
    /// Open (or create) the journal and return the entries it holds.
    pub(crate) fn open(path: &Path) -> Result<(Self, Vec<FileEntry>)> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let entries = replay(path)?;
        compact(path, &entries)?;
        let journal = Self {
            path: path.to_path_buf(),
            writer: append_to(path)?,
        };
        info!(path = %path.display(), entries = entries.len(), "opened catalog journal");
        Ok((journal, entries))
    }

    pub(crate) fn append(&mut self, entry: &FileEntry) -> Result<()> {
        writeln!(self.writer, "{}", serde_json::to_string(entry)?)?;
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Replace the journal with exactly `entries`.
    pub(crate) fn rewrite(&mut self, entries: &[FileEntry]) -> Result<()> {
        compact(&self.path, entries)?;
        self.writer = append_to(&self.path)?;
        Ok(())
    }
}

fn append_to(path: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    Ok(BufWriter::new(file))
}

fn compact(path: &Path, entries: &[FileEntry]) -> Result<()> {
    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut out = BufWriter::new(File::create(&tmp)?);
        for entry in entries {
            writeln!(out, "{}", serde_json::to_string(entry)?)?;
        }
        out.flush()?;
        out.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn replay(path: &Path) -> Result<Vec<FileEntry>> {
    let mut entries = Vec::new();
    if !path.exists() {
        return Ok(entries);
    }

    let mut seen = HashSet::new();
    let reader = BufReader::new(File::open(path)?);
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<FileEntry>(trimmed) {
            Ok(entry) => {
                if seen.insert(entry.uuid) {
                    entries.push(entry);
                }
            }
            Err(err) => warn!(
                path = %path.display(),
                line = n + 1,
                error = %err,
                "skipping unreadable catalog line"
            ),
        }
    }
    Ok(entries)
}
