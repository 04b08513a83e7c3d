use regex::Regex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::ExportConfig;
use crate::models::{RowRecord, ScrapeEntry};
use crate::utils::error::Result;

/// Lets spreadsheet tools detect UTF-8 (the rupee sign, Devanagari labels).
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const FALLBACK_NAME: &str = "file";

/// Builds filesystem-safe, length-bounded export file names.
#[derive(Debug, Clone)]
pub struct FileNamer {
    non_word: Regex,
    max_name_len: usize,
    max_label_len: usize,
    max_file_name_len: usize,
}

impl FileNamer {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            // Reserved characters (`<>:"/\|?*`), whitespace and punctuation are
            // all non-word characters
            non_word: Regex::new(r"[\W_]+").expect("non-word pattern is valid"),
            max_name_len: config.max_name_len,
            max_label_len: config.max_label_len,
            max_file_name_len: config.max_file_name_len,
        }
    }

    /// Collapses every run of non-word characters to one `_`, trims it from
    /// the ends and cuts the result to `max_len` characters. Never empty.
    pub fn sanitize(&self, name: &str, max_len: usize) -> String {
        let collapsed = self.non_word.replace_all(name, "_");
        let truncated = truncate_chars(collapsed.trim_matches('_'), max_len);
        let trimmed = truncated.trim_matches('_');
        if trimmed.is_empty() {
            FALLBACK_NAME.to_string()
        } else {
            trimmed.to_string()
        }
    }

    pub fn target_name(&self, target: &str) -> String {
        self.sanitize(target, self.max_name_len)
    }

    pub fn archive_name(&self, target: &str) -> String {
        format!("{}_fees.zip", self.target_name(target))
    }

    /// `{name}_{label}_{ordinal}.csv`, re-cutting the label when the whole
    /// name would exceed the ceiling. The ordinal is always kept so equal
    /// labels stay distinct.
    pub fn csv_name(&self, target: &str, label: &str, ordinal: usize) -> String {
        let safe_name = self.target_name(target);
        let ordinal = ordinal.to_string();
        let compose = |label: &str| format!("{}_{}_{}.csv", safe_name, label, ordinal);

        let candidate = compose(&self.sanitize(label, self.max_label_len));
        if candidate.chars().count() <= self.max_file_name_len {
            return candidate;
        }

        let fixed = safe_name.chars().count() + ordinal.len() + "__.csv".len();
        let budget = self.max_file_name_len.saturating_sub(fixed).max(1);
        let label = self.sanitize(label, budget);
        compose(truncate_chars(&label, budget))
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &s[..byte_index],
        None => s,
    }
}

/// A transient file or directory removed (best effort) when dropped.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    is_dir: bool,
}

impl TempArtifact {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), is_dir: false }
    }

    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), is_dir: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        let result = if self.is_dir {
            std::fs::remove_dir_all(&self.path)
        } else {
            std::fs::remove_file(&self.path)
        };
        match result {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed temporary artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), "Failed to remove temporary artifact: {}", e),
        }
    }
}

/// The finished archive. Dropping the bundle deletes the archive and its
/// staging directory, so it should be kept alive until the response body
/// has been sent.
#[derive(Debug)]
pub struct ExportBundle {
    pub archive_name: String,
    pub file_names: Vec<String>,
    archive: TempArtifact,
    staging: TempArtifact,
}

impl ExportBundle {
    pub fn archive_path(&self) -> &Path {
        self.archive.path()
    }

    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportEvent {
    CsvWritten { created: usize, total: usize },
    Archiving,
}

#[derive(Debug, Clone)]
pub struct ExportPackager {
    namer: FileNamer,
    work_dir: PathBuf,
}

impl ExportPackager {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            namer: FileNamer::new(config),
            work_dir: config.work_dir(),
        }
    }

    pub fn namer(&self) -> &FileNamer {
        &self.namer
    }

    /// Writes one CSV per entry with rows, zips them and deletes each CSV as
    /// soon as it is in the archive. Ordinals follow the entry position.
    pub fn package<F>(&self, target: &str, results: &[ScrapeEntry], mut on_event: F) -> Result<ExportBundle>
    where
        F: FnMut(ExportEvent),
    {
        let staging_path = self.work_dir.join(format!("export-{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&staging_path)?;
        let staging = TempArtifact::dir(staging_path);

        let total = results.iter().filter(|e| !e.rows.is_empty()).count();
        let mut written: Vec<(String, TempArtifact)> = Vec::with_capacity(total);

        for (position, entry) in results.iter().enumerate() {
            if entry.rows.is_empty() {
                continue;
            }
            let name = self.namer.csv_name(target, &entry.label, position + 1);
            let artifact = TempArtifact::file(staging.path().join(&name));
            write_csv(artifact.path(), &entry.rows)?;
            written.push((name, artifact));
            on_event(ExportEvent::CsvWritten { created: written.len(), total });
        }

        on_event(ExportEvent::Archiving);

        let archive_name = self.namer.archive_name(target);
        let archive = TempArtifact::file(staging.path().join(&archive_name));
        let mut zip = ZipWriter::new(File::create(archive.path())?);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut file_names = Vec::with_capacity(written.len());
        for (name, artifact) in written {
            zip.start_file(name.as_str(), options)?;
            let mut source = File::open(artifact.path())?;
            std::io::copy(&mut source, &mut zip)?;
            drop(source);
            drop(artifact);
            file_names.push(name);
        }
        zip.finish()?;

        tracing::info!(
            target,
            archive = %archive_name,
            files = file_names.len(),
            "Export archive ready"
        );

        Ok(ExportBundle {
            archive_name,
            file_names,
            archive,
            staging,
        })
    }
}

/// Header is the key order of the first row; later rows are written
/// positionally, ragged or not.
fn write_csv(path: &Path, rows: &[RowRecord]) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::CRLF)
        .from_writer(file);
    if let Some(first) = rows.first() {
        writer.write_record(first.keys())?;
    }
    for row in rows {
        writer.write_record(row.values())?;
    }
    writer.flush()?;
    Ok(())
}
