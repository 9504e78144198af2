use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::{debug, info};

use crate::columns::ResolvedColumns;
use crate::error::{PipelineError, Result};
use crate::models::AttendanceRecord;

// Two-digit years first: chrono's %Y would otherwise read "24" as year 24.
const TOKEN_FORMATS: [&str; 12] = [
    "%d.%m.%y", "%d/%m/%y", "%d-%m-%y", "%d-%b-%y", "%d.%m.%Y", "%d/%m/%Y", "%d-%m-%Y",
    "%d-%b-%Y", "%d-%B-%Y", "%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d",
];

// Month names written out with spaces, e.g. "5 Feb 2024".
const SPACED_FORMATS: [&str; 2] = ["%d %b %Y", "%d %B %Y"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionValue {
    pub value: String,
    pub rows: usize,
    pub kept: bool,
}

/// Row accounting for one upload. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub total_rows: usize,
    pub invalid_dates: usize,
    pub missing_names: usize,
    pub excluded_sessions: usize,
    pub kept_rows: usize,
    pub distinct_clients: usize,
    pub first_visit: Option<NaiveDate>,
    pub last_visit: Option<NaiveDate>,
    pub session_values: Vec<SessionValue>,
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub records: Vec<AttendanceRecord>,
    pub diagnostics: Diagnostics,
}

impl Normalized {
    pub fn into_records(self) -> Result<Vec<AttendanceRecord>> {
        if self.records.is_empty() {
            return Err(PipelineError::EmptyDataset);
        }
        Ok(self.records)
    }
}

fn parse_with(value: &str, formats: &[&str]) -> Option<NaiveDate> {
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Parses a day-first date, ignoring any trailing time of day.
///
/// Ambiguous numeric dates are always read day-first; `12/13/2024` is
/// rejected rather than reinterpreted month-first.
pub fn parse_day_first(raw: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|p| !p.is_empty())
        .collect();
    let first = *parts.first()?;

    if let Some(date) = parse_with(first, &TOKEN_FORMATS) {
        return Some(date);
    }
    // ISO timestamps glue the time on with 'T'.
    if let Some((day, _)) = first.split_once('T') {
        if let Some(date) = parse_with(day, &TOKEN_FORMATS) {
            return Some(date);
        }
    }
    if parts.len() >= 3 {
        return parse_with(&parts[..3].join(" "), &SPACED_FORMATS);
    }
    None
}

fn cell(row: &StringRecord, idx: usize) -> &str {
    row.get(idx).unwrap_or("")
}

pub fn normalize_session(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

pub fn normalize(
    rows: &[StringRecord],
    columns: &ResolvedColumns,
    session_types: &[String],
) -> Normalized {
    let allowed: HashSet<String> = session_types.iter().map(|s| normalize_session(s)).collect();
    let mut diagnostics = Diagnostics {
        total_rows: rows.len(),
        ..Diagnostics::default()
    };
    let mut sessions: BTreeMap<String, (usize, bool)> = BTreeMap::new();
    let mut clients: BTreeSet<String> = BTreeSet::new();
    let mut records = Vec::new();

    for row in rows {
        let Some(visit_date) = parse_day_first(cell(row, columns.date)) else {
            diagnostics.invalid_dates += 1;
            debug!(value = cell(row, columns.date), "dropping row with unparseable date");
            continue;
        };

        let client_id = cell(row, columns.name).trim();
        if client_id.is_empty() {
            diagnostics.missing_names += 1;
            continue;
        }

        let raw_session = cell(row, columns.session).trim();
        let session_type = normalize_session(raw_session);
        let kept = allowed.contains(&session_type);
        let entry = sessions
            .entry(raw_session.to_string())
            .or_insert((0, kept));
        entry.0 += 1;

        if !kept {
            diagnostics.excluded_sessions += 1;
            continue;
        }

        clients.insert(client_id.to_string());
        diagnostics.first_visit = Some(
            diagnostics
                .first_visit
                .map_or(visit_date, |d| d.min(visit_date)),
        );
        diagnostics.last_visit = Some(
            diagnostics
                .last_visit
                .map_or(visit_date, |d| d.max(visit_date)),
        );
        records.push(AttendanceRecord {
            client_id: client_id.to_string(),
            visit_date,
            session_type,
        });
    }

    diagnostics.kept_rows = records.len();
    diagnostics.distinct_clients = clients.len();
    diagnostics.session_values = sessions
        .into_iter()
        .map(|(value, (rows, kept))| SessionValue { value, rows, kept })
        .collect();

    info!(
        total = diagnostics.total_rows,
        kept = diagnostics.kept_rows,
        invalid_dates = diagnostics.invalid_dates,
        missing_names = diagnostics.missing_names,
        excluded_sessions = diagnostics.excluded_sessions,
        clients = diagnostics.distinct_clients,
        "normalized attendance rows"
    );

    Normalized {
        records,
        diagnostics,
    }
}
