use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::{info, warn};

use crate::models::{EventRow, SignalBatch, SignalRow};

/// Header lookup tolerant of case, stray whitespace and the misspelled column
/// names found in hand-maintained sheets.
struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim().trim_start_matches('\u{feff}').to_lowercase(), idx))
            .collect();
        Self { index }
    }

    fn position(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|alias| self.index.get(*alias).copied())
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, aliases: &[&str]) -> Option<&'r str> {
        self.position(aliases).and_then(|idx| record.get(idx))
    }

    fn optional(&self, record: &csv::StringRecord, aliases: &[&str]) -> Option<String> {
        self.get(record, aliases).map(str::to_string)
    }

    fn text(&self, record: &csv::StringRecord, aliases: &[&str]) -> String {
        self.get(record, aliases).unwrap_or_default().to_string()
    }
}

const DATE: &[&str] = &["date"];
const CATEGORY: &[&str] = &["category"];
const KEYWORD: &[&str] = &["keyword", "ketworad"];
const TAG: &[&str] = &["tag"];
const DEPARTMENT: &[&str] = &["department", "dept_name"];
const COUNT: &[&str] = &["count"];
const ACTIVITY: &[&str] = &["activity", "activiy"];
const CONTENT: &[&str] = &["content"];
const ENTITY: &[&str] = &["entity_id", "student", "studentname"];

/// Paths matching `pattern`, sorted so that later-named files (later years)
/// are aggregated last and win tag conflicts.
pub fn discover(pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern {pattern}"))? {
        paths.push(entry?);
    }
    paths.sort();
    Ok(paths)
}

/// Entity id encoded in the file name: everything before the first `_`.
pub fn entity_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.split('_').next().unwrap_or_default().trim().to_string()
}

fn batch_label(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn read_signal_batch(path: &Path) -> anyhow::Result<SignalBatch> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open signal file {}", path.display()))?;
    let columns = Columns::from_headers(reader.headers()?);
    for (name, aliases) in [("Date", DATE), ("Keyword", KEYWORD), ("Count", COUNT)] {
        if columns.position(aliases).is_none() {
            bail!("signal file {} is missing the {name} column", path.display());
        }
    }

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("{}: malformed row {}", path.display(), line + 2))?;
        let raw_count = columns.text(&record, COUNT);
        let count = match raw_count.trim().parse::<u64>() {
            Ok(count) => count,
            Err(_) => {
                warn!(file = %path.display(), line = line + 2, count = %raw_count, "skipping row with invalid count");
                continue;
            }
        };
        rows.push(SignalRow {
            date: columns.text(&record, DATE),
            category: columns.text(&record, CATEGORY),
            keyword: columns.text(&record, KEYWORD),
            tag: columns.optional(&record, TAG),
            department: columns.optional(&record, DEPARTMENT),
            count,
        });
    }

    Ok(SignalBatch::new(batch_label(path), rows))
}

pub fn read_event_rows(path: &Path) -> anyhow::Result<Vec<EventRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open record file {}", path.display()))?;
    let columns = Columns::from_headers(reader.headers()?);
    if columns.position(DATE).is_none() {
        bail!("record file {} is missing the Date column", path.display());
    }
    let fallback_entity = entity_from_path(path);

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("{}: malformed row {}", path.display(), line + 2))?;
        let entity_id = columns
            .get(&record, ENTITY)
            .map(str::trim)
            .filter(|entity| !entity.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| fallback_entity.clone());
        rows.push(EventRow {
            date: columns.text(&record, DATE),
            entity_id,
            tag: columns.optional(&record, TAG),
            keyword: columns.optional(&record, KEYWORD),
            category: columns.optional(&record, CATEGORY),
            department: columns.optional(&record, DEPARTMENT),
            activity: columns.text(&record, ACTIVITY),
            content: columns.text(&record, CONTENT),
        });
    }

    Ok(rows)
}

/// Reads every signal file matching `pattern`; batches whose label appears in
/// `superseded` are marked so aggregation skips them.
pub fn load_signal_batches(pattern: &str, superseded: &[String]) -> anyhow::Result<Vec<SignalBatch>> {
    let mut batches = Vec::new();
    for path in discover(pattern)? {
        let mut batch = read_signal_batch(&path)?;
        if superseded.iter().any(|label| label == &batch.label) {
            batch = batch.superseded();
        }
        info!(file = %path.display(), rows = batch.rows.len(), superseded = batch.superseded, "loaded signal batch");
        batches.push(batch);
    }
    if batches.is_empty() {
        bail!("no signal files matched {pattern}");
    }
    Ok(batches)
}

pub fn load_event_rows(pattern: &str) -> anyhow::Result<Vec<EventRow>> {
    let mut rows = Vec::new();
    let paths = discover(pattern)?;
    if paths.is_empty() {
        bail!("no record files matched {pattern}");
    }
    for path in paths {
        let file_rows = read_event_rows(&path)?;
        info!(file = %path.display(), rows = file_rows.len(), "loaded record file");
        rows.extend(file_rows);
    }
    Ok(rows)
}
