// src/report/writer.rs

//! Rendering an [`AggregatedReport`] as CSV, JSON or text.

use std::io::{self, Write};

use crate::report::aggregator::{AggregatedReport, Counter, MetricTotals};
use crate::types::ReportFormat;

pub fn write_report(report: &AggregatedReport, format: ReportFormat, out: &mut impl Write) -> io::Result<()> {
    match format {
        ReportFormat::Csv => write_csv(report, out),
        ReportFormat::Json => write_json(report, out),
        ReportFormat::Text => write_text(report, out),
    }
}

pub fn render(report: &AggregatedReport, format: ReportFormat) -> io::Result<String> {
    let mut buf = Vec::new();
    write_report(report, format, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// `module,metric,covered,missed,ratio` rows, then one `ALL` row per metric.
pub fn write_csv(report: &AggregatedReport, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "module,metric,covered,missed,ratio")?;
    for (module, totals) in &report.modules {
        write_csv_rows(out, module.as_str(), totals)?;
    }
    write_csv_rows(out, "ALL", &report.totals)
}

fn write_csv_rows(out: &mut impl Write, label: &str, totals: &MetricTotals) -> io::Result<()> {
    for (metric, counter) in totals {
        writeln!(
            out,
            "{label},{metric},{},{},{:.4}",
            counter.covered,
            counter.missed,
            counter.ratio()
        )?;
    }
    Ok(())
}

pub fn write_json(report: &AggregatedReport, out: &mut impl Write) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)
}

pub fn write_text(report: &AggregatedReport, out: &mut impl Write) -> io::Result<()> {
    if report.is_empty() {
        return writeln!(out, "Coverage: no records ({} fragments)", report.fragments);
    }

    writeln!(out, "Coverage ({} fragments)", report.fragments)?;
    for (module, totals) in &report.modules {
        writeln!(out, "  {module}")?;
        write_text_rows(out, totals)?;
    }
    writeln!(out, "  total")?;
    write_text_rows(out, &report.totals)
}

fn write_text_rows(out: &mut impl Write, totals: &MetricTotals) -> io::Result<()> {
    for (metric, counter) in totals {
        writeln!(out, "    {:<12} {}", metric.as_str(), percent(counter))?;
    }
    Ok(())
}

fn percent(counter: &Counter) -> String {
    format!(
        "{:>6.2}% ({}/{})",
        counter.ratio() * 100.0,
        counter.covered,
        counter.total()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{CoverageRecord, Metric, ReportAggregator, ReportFragment};
    use crate::types::ModuleId;

    fn sample() -> AggregatedReport {
        let agg = ReportAggregator::new();
        agg.collect(ReportFragment::new(
            ModuleId::new("core").task("test"),
            vec![CoverageRecord::new(Metric::Line, "A.java", (1, 4), 3, 1)],
        ));
        agg.collect(ReportFragment::new(
            ModuleId::new("web").task("test"),
            vec![CoverageRecord::new(Metric::Line, "W.java", (1, 2), 0, 2)],
        ));
        agg.merge().unwrap()
    }

    #[test]
    fn csv_has_module_rows_and_all_row() {
        let csv = render(&sample(), ReportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "module,metric,covered,missed,ratio",
                ":core,line,3,1,0.7500",
                ":web,line,0,2,0.0000",
                "ALL,line,3,3,0.5000",
            ]
        );
    }

    #[test]
    fn json_round_trips_through_serde_value() {
        let json = render(&sample(), ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["totals"]["line"]["covered"], 3);
        assert_eq!(value["modules"][":web"]["line"]["missed"], 2);
    }

    #[test]
    fn text_summary_lists_modules() {
        let text = render(&sample(), ReportFormat::Text).unwrap();
        assert!(text.contains(":core"));
        assert!(text.contains("50.00% (3/6)"));
    }
}
