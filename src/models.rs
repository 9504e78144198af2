use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub client_id: String,
    pub visit_date: NaiveDate,
    pub session_type: String,
}

/// Calendar month used as the aggregation and comparison granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Retention,
    Churn,
}

impl MetricKind {
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Retention => "Retention Rate",
            MetricKind::Churn => "Churn Rate",
        }
    }

    pub fn column_header(&self) -> String {
        format!("{} (%)", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub month: YearMonth,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricTable {
    pub metric: MetricKind,
    pub rows: Vec<MetricRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_month_truncates_day_and_orders_chronologically() {
        let jan = YearMonth::of(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        let feb = YearMonth::of(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        let dec = YearMonth::of(NaiveDate::from_ymd_opt(2023, 12, 15).unwrap());

        assert_eq!(jan.to_string(), "2024-01");
        assert!(dec < jan && jan < feb);
    }

    #[test]
    fn headers_follow_metric_label() {
        assert_eq!(MetricKind::Retention.column_header(), "Retention Rate (%)");
        assert_eq!(MetricKind::Churn.column_header(), "Churn Rate (%)");
    }
}
