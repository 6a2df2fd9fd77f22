//! Record loader — raw rows from tabular sources into typed records.
//!
//! A malformed row never stops loading: it is dropped and reported
//! through the sink. The only hard failure is a source that cannot be
//! read at all.

use crate::{
    config::LoaderConfig,
    error::{PotentialError, PotentialResult, RowParseError},
    event::{EventSink, PipelineEvent},
    record::{parse_row, InputRecord, RawRow},
    store::RecordStore,
};
use std::fs::File;
use std::path::{Path, PathBuf};

/// A row as delivered by a source: decoded, or already known to be bad.
pub type SourceRow = Result<RawRow, RowParseError>;

/// Anything that can hand over a batch of raw rows.
pub trait RowSource {
    /// Stable name used in events.
    fn name(&self) -> &str;

    /// Read every row, in source order.
    fn read_rows(&mut self) -> PotentialResult<Vec<SourceRow>>;
}

// ── CSV files ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path: PathBuf,
    name: String,
    config: LoaderConfig,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>, config: &LoaderConfig) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            name,
            config: config.clone(),
        }
    }
}

impl RowSource for CsvFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_rows(&mut self) -> PotentialResult<Vec<SourceRow>> {
        let file = File::open(&self.path).map_err(|error| PotentialError::SourceUnreadable {
            source_name: self.name.clone(),
            error,
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.config.delimiter_byte())
            .has_headers(self.config.has_header)
            .flexible(true)
            .from_reader(file);

        let mut rows = Vec::new();
        for result in reader.records() {
            match result {
                Ok(record) => {
                    // Whitespace-only lines carry no data.
                    if record.len() == 1 && record[0].trim().is_empty() {
                        continue;
                    }
                    rows.push(Ok(record.iter().collect()));
                }
                Err(e) if e.is_io_error() => return Err(PotentialError::Csv(e)),
                Err(e) => rows.push(Err(RowParseError::Malformed {
                    line: e.position().map(|p| p.line()).unwrap_or(0),
                    reason: e.to_string(),
                })),
            }
        }
        Ok(rows)
    }
}

/// Part files in `dir` matching the configured pattern, sorted by name.
pub fn discover_csv_sources(
    dir: &Path,
    config: &LoaderConfig,
    sink: &mut dyn EventSink,
) -> PotentialResult<Vec<CsvFileSource>> {
    let unreadable = |error| PotentialError::SourceUnreadable {
        source_name: dir.display().to_string(),
        error,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let file_name = entry.file_name();
        if config.is_part_file(&file_name.to_string_lossy()) && entry.path().is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    if paths.is_empty() {
        sink.emit(PipelineEvent::NoSourcesFound {
            location: dir.display().to_string(),
        });
    }
    Ok(paths
        .into_iter()
        .map(|p| CsvFileSource::new(p, config))
        .collect())
}

// ── SQLite ─────────────────────────────────────────────────────────

/// Rows of `data_table` in insertion order.
pub struct SqliteSource<'a> {
    store: &'a RecordStore,
    name: String,
}

impl<'a> SqliteSource<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self {
            name: format!("sqlite:{}", store.location()),
            store,
        }
    }
}

impl RowSource for SqliteSource<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_rows(&mut self) -> PotentialResult<Vec<SourceRow>> {
        Ok(self.store.raw_rows()?.into_iter().map(Ok).collect())
    }
}

// ── In memory ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    rows: Vec<RawRow>,
}

impl MemorySource {
    pub fn new(name: &str, rows: Vec<RawRow>) -> Self {
        Self {
            name: name.to_string(),
            rows,
        }
    }
}

impl RowSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_rows(&mut self) -> PotentialResult<Vec<SourceRow>> {
        Ok(self.rows.iter().cloned().map(Ok).collect())
    }
}

// ── Loading ────────────────────────────────────────────────────────

/// Parse rows of one source, dropping and reporting the bad ones.
pub fn load_rows<I>(source: &str, rows: I, sink: &mut dyn EventSink) -> Vec<InputRecord>
where
    I: IntoIterator<Item = SourceRow>,
{
    let mut records = Vec::new();
    let mut dropped = 0;
    for (index, row) in rows.into_iter().enumerate() {
        match row.and_then(|r| parse_row(&r)) {
            Ok(record) => records.push(record),
            Err(e) => {
                dropped += 1;
                sink.emit(PipelineEvent::row_dropped(source, index, &e));
            }
        }
    }
    sink.emit(PipelineEvent::SourceLoaded {
        source: source.to_string(),
        loaded: records.len(),
        dropped,
    });
    records
}

/// Copy every part file in `dir` into `store`, verbatim.
///
/// Rows the CSV reader rejects are reported and skipped; the rest are
/// inserted under one import timestamp. Returns the number of rows stored.
pub fn import_csv_parts(
    dir: &Path,
    config: &LoaderConfig,
    store: &RecordStore,
    imported_at: &str,
    sink: &mut dyn EventSink,
) -> PotentialResult<usize> {
    let mut total = 0;
    for mut source in discover_csv_sources(dir, config, sink)? {
        let mut rows = Vec::new();
        let mut dropped = 0;
        for (index, row) in source.read_rows()?.into_iter().enumerate() {
            match row {
                Ok(row) => rows.push(row),
                Err(e) => {
                    dropped += 1;
                    sink.emit(PipelineEvent::row_dropped(source.name(), index, &e));
                }
            }
        }
        let inserted = store.insert_raw_rows(&rows, imported_at)?;
        sink.emit(PipelineEvent::SourceLoaded {
            source: source.name().to_string(),
            loaded: inserted,
            dropped,
        });
        total += inserted;
    }
    Ok(total)
}

/// Load every source in order; records keep source order then row order.
pub fn load_sources(
    sources: &mut [Box<dyn RowSource + '_>],
    sink: &mut dyn EventSink,
) -> PotentialResult<Vec<InputRecord>> {
    let mut records = Vec::new();
    for source in sources.iter_mut() {
        let rows = source.read_rows()?;
        records.extend(load_rows(source.name(), rows, sink));
    }
    Ok(records)
}
