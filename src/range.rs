use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::models::AttendanceRecord;

/// Inclusive date window applied before aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Defaults missing bounds to the observed span and clamps requested bounds into it.
pub fn resolve_window(
    records: &[AttendanceRecord],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<DateWindow> {
    let min = records.iter().map(|r| r.visit_date).min();
    let max = records.iter().map(|r| r.visit_date).max();
    let (Some(min), Some(max)) = (min, max) else {
        return Err(PipelineError::EmptyDataset);
    };

    let window = DateWindow {
        start: start.map_or(min, |d| d.max(min)),
        end: end.map_or(max, |d| d.min(max)),
    };

    if start.is_some_and(|d| d < min) || end.is_some_and(|d| d > max) {
        debug!(%min, %max, start = %window.start, end = %window.end, "clamped date window to observed span");
    }

    Ok(window)
}

pub fn filter_range(
    records: Vec<AttendanceRecord>,
    window: DateWindow,
) -> Result<Vec<AttendanceRecord>> {
    let empty = || PipelineError::EmptyRange {
        start: window.start,
        end: window.end,
    };

    if window.start > window.end {
        warn!(start = %window.start, end = %window.end, "start date is after end date");
        return Err(empty());
    }

    let kept: Vec<AttendanceRecord> = records
        .into_iter()
        .filter(|r| window.contains(r.visit_date))
        .collect();

    if kept.is_empty() {
        return Err(empty());
    }

    debug!(kept = kept.len(), start = %window.start, end = %window.end, "applied date window");
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(client: &str, visit_date: NaiveDate) -> AttendanceRecord {
        AttendanceRecord {
            client_id: client.to_string(),
            visit_date,
            session_type: "GYM".to_string(),
        }
    }

    fn sample() -> Vec<AttendanceRecord> {
        vec![
            record("A", date(2024, 1, 10)),
            record("B", date(2024, 2, 14)),
            record("A", date(2024, 3, 20)),
        ]
    }

    #[test]
    fn defaults_to_observed_span() {
        let window = resolve_window(&sample(), None, None).unwrap();
        assert_eq!(window.start, date(2024, 1, 10));
        assert_eq!(window.end, date(2024, 3, 20));
    }

    #[test]
    fn clamps_requested_bounds() {
        let window =
            resolve_window(&sample(), Some(date(2023, 6, 1)), Some(date(2025, 1, 1))).unwrap();
        assert_eq!(window.start, date(2024, 1, 10));
        assert_eq!(window.end, date(2024, 3, 20));
    }

    #[test]
    fn window_is_inclusive() {
        let window = DateWindow {
            start: date(2024, 2, 14),
            end: date(2024, 3, 20),
        };
        let kept = filter_range(sample(), window).unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].client_id, "B");
    }

    #[test]
    fn inverted_window_is_an_empty_range() {
        let window =
            resolve_window(&sample(), Some(date(2024, 3, 1)), Some(date(2024, 2, 1))).unwrap();
        assert!(matches!(
            filter_range(sample(), window),
            Err(PipelineError::EmptyRange { .. })
        ));
    }

    #[test]
    fn start_after_last_visit_is_not_pulled_back() {
        let window = resolve_window(&sample(), Some(date(2024, 4, 1)), None).unwrap();
        assert_eq!(window.start, date(2024, 4, 1));
        assert_eq!(window.end, date(2024, 3, 20));
        assert!(matches!(
            filter_range(sample(), window),
            Err(PipelineError::EmptyRange { .. })
        ));
    }

    #[test]
    fn window_without_visits_is_an_empty_range() {
        let window = DateWindow {
            start: date(2024, 1, 11),
            end: date(2024, 2, 13),
        };
        assert!(matches!(
            filter_range(sample(), window),
            Err(PipelineError::EmptyRange { .. })
        ));
    }

    #[test]
    fn no_records_means_no_window() {
        assert!(matches!(
            resolve_window(&[], None, None),
            Err(PipelineError::EmptyDataset)
        ));
    }
}
