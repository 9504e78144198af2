use tracing::debug;

use crate::aggregate::PresenceMatrix;
use crate::models::{MetricKind, MetricRow, MetricTable, YearMonth};

/// Client movement between a month and the next observed month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthTransition {
    pub month: YearMonth,
    pub next: YearMonth,
    pub active: usize,
    pub retained: usize,
    pub churned: usize,
}

impl MonthTransition {
    pub fn rate(&self, kind: MetricKind) -> f64 {
        if self.active == 0 {
            return 0.0;
        }
        let count = match kind {
            MetricKind::Retention => self.retained,
            MetricKind::Churn => self.churned,
        };
        round2(count as f64 / self.active as f64 * 100.0)
    }
}

pub fn transitions(matrix: &PresenceMatrix) -> Vec<MonthTransition> {
    matrix
        .months()
        .windows(2)
        .map(|pair| {
            let current = matrix.active_in(pair[0]);
            let next = matrix.active_in(pair[1]);
            let retained = current.intersection(&next).count();
            MonthTransition {
                month: pair[0],
                next: pair[1],
                active: current.len(),
                retained,
                churned: current.len() - retained,
            }
        })
        .collect()
}

/// One row per consecutive month pair; the final month has no successor and never appears.
pub fn compute(matrix: &PresenceMatrix, kind: MetricKind) -> MetricTable {
    let rows = transitions(matrix)
        .iter()
        .map(|t| {
            let value = t.rate(kind);
            debug!(month = %t.month, active = t.active, retained = t.retained, value, "month pair");
            MetricRow {
                month: t.month,
                value,
            }
        })
        .collect();

    MetricTable { metric: kind, rows }
}

/// Stable: rows with equal values keep their chronological order.
pub fn sort_descending(rows: &mut [MetricRow]) {
    rows.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Two decimals, ties away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceRecord;
    use chrono::NaiveDate;

    fn record(client: &str, y: i32, m: u32, d: u32) -> AttendanceRecord {
        AttendanceRecord {
            client_id: client.to_string(),
            visit_date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            session_type: "GYM".to_string(),
        }
    }

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth { year, month }
    }

    fn row(month: u32, value: f64) -> MetricRow {
        MetricRow {
            month: ym(2024, month),
            value,
        }
    }

    #[test]
    fn half_of_january_returns_in_february() {
        let matrix = PresenceMatrix::build(&[
            record("A", 2024, 1, 3),
            record("B", 2024, 1, 4),
            record("A", 2024, 2, 7),
        ]);

        let retention = compute(&matrix, MetricKind::Retention);
        let churn = compute(&matrix, MetricKind::Churn);

        assert_eq!(retention.rows, vec![row(1, 50.0)]);
        assert_eq!(churn.rows, vec![row(1, 50.0)]);
    }

    #[test]
    fn retention_and_churn_sum_to_hundred() {
        let matrix = PresenceMatrix::build(&[
            record("A", 2024, 1, 1),
            record("B", 2024, 1, 1),
            record("C", 2024, 1, 1),
            record("A", 2024, 2, 1),
            record("D", 2024, 2, 1),
            record("D", 2024, 3, 1),
        ]);

        let retention = compute(&matrix, MetricKind::Retention);
        let churn = compute(&matrix, MetricKind::Churn);

        assert_eq!(retention.rows[0].value, 33.33);
        assert_eq!(churn.rows[0].value, 66.67);
        for (r, c) in retention.rows.iter().zip(&churn.rows) {
            assert!((r.value + c.value - 100.0).abs() <= 0.01);
        }
    }

    #[test]
    fn one_row_per_month_pair() {
        let matrix = PresenceMatrix::build(&[
            record("A", 2024, 1, 1),
            record("A", 2024, 3, 1),
            record("A", 2024, 4, 1),
        ]);

        let table = compute(&matrix, MetricKind::Retention);
        let months: Vec<YearMonth> = table.rows.iter().map(|r| r.month).collect();
        assert_eq!(months, vec![ym(2024, 1), ym(2024, 3)]);
        assert!(table.rows.iter().all(|r| r.value == 100.0));
    }

    #[test]
    fn single_month_yields_no_rows() {
        let matrix = PresenceMatrix::build(&[record("A", 2024, 1, 1), record("B", 2024, 1, 9)]);
        assert!(compute(&matrix, MetricKind::Churn).rows.is_empty());
    }

    #[test]
    fn zero_active_clients_report_zero() {
        let transition = MonthTransition {
            month: ym(2024, 1),
            next: ym(2024, 2),
            active: 0,
            retained: 0,
            churned: 0,
        };
        assert_eq!(transition.rate(MetricKind::Retention), 0.0);
        assert_eq!(transition.rate(MetricKind::Churn), 0.0);
    }

    #[test]
    fn descending_sort_is_stable_on_ties() {
        let mut rows = vec![row(1, 50.0), row(2, 75.0), row(3, 50.0), row(4, 100.0)];
        sort_descending(&mut rows);
        assert_eq!(
            rows,
            vec![row(4, 100.0), row(2, 75.0), row(1, 50.0), row(3, 50.0)]
        );
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(100.0 / 3.0), 33.33);
        assert_eq!(round2(200.0 / 3.0), 66.67);
        assert_eq!(round2(12.5), 12.5);
    }
}
