use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::info;

use crate::aggregate::PresenceMatrix;
use crate::columns::{self, ResolvedColumns};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::metric;
use crate::models::{MetricTable, YearMonth};
use crate::normalize::{self, Diagnostics};
use crate::range::{self, DateWindow};

/// Loosely typed rows as read from the export, before any role is known.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<StringRecord>,
}

impl RawTable {
    pub fn header_refs(&self) -> Vec<&str> {
        self.headers.iter().map(String::as_str).collect()
    }

    pub fn header(&self, idx: usize) -> &str {
        self.headers.get(idx).map(String::as_str).unwrap_or("")
    }
}

pub fn read_table<R: Read>(reader: R, delimiter: u8) -> Result<RawTable> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(reader);

    let headers = reader.headers()?.iter().map(str::to_string).collect();
    let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(RawTable { headers, rows })
}

const WORKBOOK_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| WORKBOOK_EXTENSIONS.iter().any(|w| ext.eq_ignore_ascii_case(w)))
}

/// Native date cells become `DD.MM.YYYY` so they read back unambiguously day-first.
fn workbook_cell(cell: &Data) -> String {
    match cell {
        Data::DateTime(value) => value
            .as_datetime()
            .map(|dt| dt.format("%d.%m.%Y").to_string())
            .unwrap_or_default(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Reads the first worksheet; its first row is the header.
pub fn read_workbook(path: &Path) -> Result<RawTable> {
    let workbook_err = |source: calamine::Error| PipelineError::Workbook {
        path: path.display().to_string(),
        source,
    };

    let mut workbook = open_workbook_auto(path).map_err(workbook_err)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::NoWorksheet(path.display().to_string()))?
        .map_err(workbook_err)?;

    let mut sheet_rows = range.rows();
    let headers = sheet_rows
        .next()
        .map(|row| row.iter().map(|c| workbook_cell(c).trim().to_string()).collect())
        .unwrap_or_default();
    let rows = sheet_rows
        .map(|row| row.iter().map(workbook_cell).collect::<StringRecord>())
        .collect();

    Ok(RawTable { headers, rows })
}

pub fn read_path(path: &Path, delimiter: u8) -> Result<RawTable> {
    let table = if is_workbook(path) {
        read_workbook(path)?
    } else {
        let file = File::open(path).map_err(|source| PipelineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        read_table(file, delimiter)?
    };
    info!(path = %path.display(), rows = table.rows.len(), "loaded attendance export");
    Ok(table)
}

/// Everything derived from one upload up to (not including) the metric itself.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub columns: ResolvedColumns,
    pub diagnostics: Diagnostics,
    pub window: DateWindow,
    pub matrix: PresenceMatrix,
}

pub fn analyze(table: &RawTable, config: &PipelineConfig) -> Result<Analysis> {
    let columns = columns::resolve(&table.header_refs(), &config.columns)?;
    let normalized = normalize::normalize(&table.rows, &columns, &config.session_types);
    let diagnostics = normalized.diagnostics.clone();
    let records = normalized.into_records()?;

    let window = range::resolve_window(&records, config.start, config.end)?;
    let records = range::filter_range(records, window)?;
    let matrix = PresenceMatrix::build(&records);

    Ok(Analysis {
        columns,
        diagnostics,
        window,
        matrix,
    })
}

pub fn compute(analysis: &Analysis, config: &PipelineConfig) -> MetricTable {
    let mut table = metric::compute(&analysis.matrix, config.metric);
    if config.sort_descending {
        metric::sort_descending(&mut table.rows);
    }
    table
}

pub fn run(table: &RawTable, config: &PipelineConfig) -> Result<MetricTable> {
    let analysis = analyze(table, config)?;
    Ok(compute(&analysis, config))
}

/// Column resolution and row accounting without requiring any surviving rows.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub columns: ResolvedColumns,
    pub diagnostics: Diagnostics,
    pub months: Vec<YearMonth>,
}

pub fn inspect(table: &RawTable, config: &PipelineConfig) -> Result<Inspection> {
    let columns = columns::resolve(&table.header_refs(), &config.columns)?;
    let normalized = normalize::normalize(&table.rows, &columns, &config.session_types);
    let months: BTreeSet<YearMonth> = normalized
        .records
        .iter()
        .map(|r| YearMonth::of(r.visit_date))
        .collect();

    Ok(Inspection {
        columns,
        diagnostics: normalized.diagnostics,
        months: months.into_iter().collect(),
    })
}
