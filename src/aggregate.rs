use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::models::{AttendanceRecord, YearMonth};

/// Visit counts per client per calendar month.
///
/// Only observed (client, month) pairs are stored; every other cell reads as
/// zero. The month axis holds exactly the months that have at least one visit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceMatrix {
    months: Vec<YearMonth>,
    visits: BTreeMap<String, BTreeMap<YearMonth, u32>>,
    sessions: BTreeMap<String, u32>,
}

impl PresenceMatrix {
    pub fn build(records: &[AttendanceRecord]) -> Self {
        let mut visits: BTreeMap<String, BTreeMap<YearMonth, u32>> = BTreeMap::new();
        let mut months = BTreeSet::new();
        let mut sessions: BTreeMap<String, u32> = BTreeMap::new();

        for record in records {
            let month = YearMonth::of(record.visit_date);
            months.insert(month);
            *sessions.entry(record.session_type.clone()).or_insert(0) += 1;
            *visits
                .entry(record.client_id.clone())
                .or_default()
                .entry(month)
                .or_insert(0) += 1;
        }

        let matrix = Self {
            months: months.into_iter().collect(),
            visits,
            sessions,
        };
        debug!(
            clients = matrix.client_count(),
            months = matrix.months.len(),
            "built monthly presence matrix"
        );
        matrix
    }

    pub fn months(&self) -> &[YearMonth] {
        &self.months
    }

    pub fn client_count(&self) -> usize {
        self.visits.len()
    }

    pub fn visits(&self, client: &str, month: YearMonth) -> u32 {
        self.visits
            .get(client)
            .and_then(|by_month| by_month.get(&month))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_visits(&self, month: YearMonth) -> u32 {
        self.visits
            .values()
            .filter_map(|by_month| by_month.get(&month))
            .sum()
    }

    /// Visits per canonical session type across the whole window.
    pub fn session_totals(&self) -> &BTreeMap<String, u32> {
        &self.sessions
    }

    pub fn active_in(&self, month: YearMonth) -> BTreeSet<&str> {
        self.visits
            .iter()
            .filter(|(client, _)| self.visits(client, month) > 0)
            .map(|(client, _)| client.as_str())
            .collect()
    }
}
