use std::fmt::Write;
use std::io;

use crate::columns::ResolvedColumns;
use crate::metric;
use crate::models::{MetricKind, MetricTable, YearMonth};
use crate::normalize::Diagnostics;
use crate::pipeline::{Analysis, RawTable};

pub fn format_percent(value: f64) -> String {
    format!("{value:.2}")
}

/// CSV export: `Month,<Metric> (%)` header then one row per month, UTF-8.
pub fn write_csv<W: io::Write>(writer: W, table: &MetricTable) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["Month".to_string(), table.metric.column_header()])?;

    for row in &table.rows {
        wtr.write_record([row.month.to_string(), format_percent(row.value)])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn render_json(table: &MetricTable) -> serde_json::Result<String> {
    serde_json::to_string_pretty(table)
}

pub fn render_table(table: &MetricTable) -> String {
    let header = table.metric.column_header();
    let width = header.len();
    let mut output = String::new();

    let _ = writeln!(output, "{:<8}  {:>width$}", "Month", header);
    let _ = writeln!(output, "{}  {}", "-".repeat(8), "-".repeat(width));

    if table.rows.is_empty() {
        let _ = writeln!(output, "Not enough months to compare.");
    }
    for row in &table.rows {
        let _ = writeln!(
            output,
            "{:<8}  {:>width$}",
            row.month.to_string(),
            format_percent(row.value)
        );
    }

    output
}

pub fn render_columns(headers: &RawTable, columns: &ResolvedColumns) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Columns:");
    let _ = writeln!(output, "- date: {}", headers.header(columns.date));
    let _ = writeln!(output, "- name: {}", headers.header(columns.name));
    let _ = writeln!(output, "- group session: {}", headers.header(columns.session));
    output
}

pub fn render_diagnostics(diagnostics: &Diagnostics) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "- Rows read: {}", diagnostics.total_rows);
    let _ = writeln!(output, "- Missing or unparseable dates: {}", diagnostics.invalid_dates);
    let _ = writeln!(output, "- Missing client names: {}", diagnostics.missing_names);
    let _ = writeln!(output, "- Non-group sessions excluded: {}", diagnostics.excluded_sessions);
    let _ = writeln!(output, "- Group-session visits kept: {}", diagnostics.kept_rows);
    let _ = writeln!(output, "- Unique clients: {}", diagnostics.distinct_clients);
    if let (Some(first), Some(last)) = (diagnostics.first_visit, diagnostics.last_visit) {
        let _ = writeln!(output, "- Visits span: {first} to {last}");
    }

    if !diagnostics.session_values.is_empty() {
        let _ = writeln!(output, "- Session types seen:");
        for session in &diagnostics.session_values {
            let label = if session.value.is_empty() {
                "(blank)"
            } else {
                session.value.as_str()
            };
            let status = if session.kept { "kept" } else { "excluded" };
            let _ = writeln!(output, "  - {label}: {} rows ({status})", session.rows);
        }
    }

    output
}

pub fn render_months(months: &[YearMonth]) -> String {
    if months.is_empty() {
        return "Months: none\n".to_string();
    }
    let labels: Vec<String> = months.iter().map(YearMonth::to_string).collect();
    format!("Months: {}\n", labels.join(", "))
}

/// Markdown summary with retention and churn side by side.
pub fn build_report(
    source: &str,
    headers: &RawTable,
    analysis: &Analysis,
    highlight: MetricKind,
) -> String {
    let transitions = metric::transitions(&analysis.matrix);
    let mut output = String::new();

    let _ = writeln!(output, "# Group Session Retention Report");
    let _ = writeln!(
        output,
        "Generated from {} (visits {} to {})",
        source, analysis.window.start, analysis.window.end
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Data Check");
    let _ = write!(output, "{}", render_columns(headers, &analysis.columns));
    let _ = write!(output, "{}", render_diagnostics(&analysis.diagnostics));
    let _ = writeln!(
        output,
        "- Clients in window: {}",
        analysis.matrix.client_count()
    );
    let _ = writeln!(output, "- Visits by session type in window:");
    for (session, count) in analysis.matrix.session_totals() {
        let _ = writeln!(output, "  - {session}: {count}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Month over Month");

    if transitions.is_empty() {
        let _ = writeln!(output, "Only one month of attendance in this window.");
        return output;
    }

    let _ = writeln!(
        output,
        "| Month | Visits | Active | Retained | Churned | {} | {} |",
        MetricKind::Retention.column_header(),
        MetricKind::Churn.column_header()
    );
    let _ = writeln!(output, "|---|---:|---:|---:|---:|---:|---:|");
    for t in &transitions {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} | {} |",
            t.month,
            analysis.matrix.total_visits(t.month),
            t.active,
            t.retained,
            t.churned,
            format_percent(t.rate(MetricKind::Retention)),
            format_percent(t.rate(MetricKind::Churn))
        );
    }

    let lowest = transitions.iter().min_by(|a, b| {
        a.rate(highlight)
            .partial_cmp(&b.rate(highlight))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let highest = transitions.iter().max_by(|a, b| {
        a.rate(highlight)
            .partial_cmp(&b.rate(highlight))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## {} Extremes", highlight.label());
    if let (Some(low), Some(high)) = (lowest, highest) {
        let _ = writeln!(
            output,
            "- Highest: {} ({}% into {})",
            high.month,
            format_percent(high.rate(highlight)),
            high.next
        );
        let _ = writeln!(
            output,
            "- Lowest: {} ({}% into {})",
            low.month,
            format_percent(low.rate(highlight)),
            low.next
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::models::MetricRow;
    use crate::pipeline::{analyze, read_table};

    fn table(metric: MetricKind, values: &[(u32, f64)]) -> MetricTable {
        MetricTable {
            metric,
            rows: values
                .iter()
                .map(|&(month, value)| MetricRow {
                    month: YearMonth { year: 2024, month },
                    value,
                })
                .collect(),
        }
    }

    #[test]
    fn csv_export_has_metric_header_and_two_decimals() {
        let mut buffer = Vec::new();
        write_csv(&mut buffer, &table(MetricKind::Churn, &[(1, 50.0), (2, 33.33)])).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "Month,Churn Rate (%)\n2024-01,50.00\n2024-02,33.33\n");
    }

    #[test]
    fn json_lists_month_labels() {
        let json = render_json(&table(MetricKind::Retention, &[(3, 75.0)])).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metric"], "retention");
        assert_eq!(value["rows"][0]["month"], "2024-03");
        assert_eq!(value["rows"][0]["value"], 75.0);
    }

    #[test]
    fn terminal_table_notes_missing_pairs() {
        let rendered = render_table(&table(MetricKind::Retention, &[]));
        assert!(rendered.contains("Retention Rate (%)"));
        assert!(rendered.contains("Not enough months"));
    }

    #[test]
    fn report_shows_both_metrics_per_month() {
        let raw = read_table(
            "Date,Name,Group Session\n\
             02.01.2024,A,GYM\n03.01.2024,B,GYM\n05.02.2024,A,GYM\nbad,A,GYM\n"
                .as_bytes(),
            b',',
        )
        .unwrap();
        let analysis = analyze(&raw, &PipelineConfig::default()).unwrap();
        let report = build_report("visits.csv", &raw, &analysis, MetricKind::Retention);

        assert!(report.contains("# Group Session Retention Report"));
        assert!(report.contains("- Missing or unparseable dates: 1"));
        assert!(report.contains("  - GYM: 3"));
        assert!(report.contains("| 2024-01 | 2 | 2 | 1 | 1 | 50.00 | 50.00 |"));
        assert!(report.contains("- Highest: 2024-01 (50.00% into 2024-02)"));
    }
}
