use std::fmt::Write;

use crate::aggregator::{summarize_years, top_resources, RevenueSummary};
use crate::diagnostics::RunDiagnostics;

fn millions(value: f64) -> f64 {
    value / 1_000_000.0
}

/// Market totals per year, most recent first.
pub fn format_year_summary(rows: &[RevenueSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "BESS Revenue Summary by Year");
    let _ = writeln!(out, "{}", "=".repeat(86));
    let _ = writeln!(
        out,
        "{:<6} {:>15} {:>15} {:>15} {:>15} {:>15}",
        "Year", "Total($M)", "RT($M)", "DAM($M)", "AS($M)", "Resources"
    );
    let _ = writeln!(out, "{}", "-".repeat(86));

    for year in summarize_years(rows).iter().rev() {
        let _ = writeln!(
            out,
            "{:<6} {:>15.2} {:>15.2} {:>15.2} {:>15.2} {:>15}",
            year.year,
            millions(year.total),
            millions(year.rt_energy_arbitrage),
            millions(year.dam_energy),
            millions(year.total_as),
            year.active_resources
        );
    }
    out
}

pub fn format_top_resources(rows: &[RevenueSummary], n: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Top {} resources across all periods", n);
    let _ = writeln!(out, "{}", "=".repeat(86));
    let _ = writeln!(
        out,
        "{:<4} {:<28} {:>14} {:>14} {:>10} {:>12}",
        "#", "Resource", "Total($)", "AS($)", "AS %", "Periods"
    );
    let _ = writeln!(out, "{}", "-".repeat(86));

    for (rank, resource) in top_resources(rows, n).iter().enumerate() {
        let periods = match (resource.periods.first(), resource.periods.last()) {
            (Some(first), Some(last)) if first != last => format!("{first}-{last}"),
            (Some(first), _) => first.to_string(),
            _ => String::new(),
        };
        let _ = writeln!(
            out,
            "{:<4} {:<28} {:>14.0} {:>14.0} {:>9.1}% {:>12}",
            rank + 1,
            resource.resource_id,
            resource.total(),
            resource.ledger.total_as(),
            resource.ledger.as_pct(),
            periods
        );
    }
    out
}

/// One line per non-zero data-quality counter.
pub fn format_diagnostics(diag: &RunDiagnostics) -> String {
    let mut out = String::new();
    let counters = [
        ("files processed", diag.files_processed),
        ("files skipped", diag.skipped_files.len() as u64),
        ("records read", diag.records_read),
        ("records dropped as malformed", diag.malformed_records),
        ("fields coerced to zero", diag.coerced_fields),
        ("records of untracked resources", diag.unknown_resources),
        ("records outside their period", diag.out_of_period_records),
        ("intervals priced at the fallback", diag.energy_price_fallbacks),
        ("AS awards without a clearing price", diag.missing_as_prices),
        ("superseded price quotes", diag.superseded_quotes),
    ];
    for (label, count) in counters.into_iter().filter(|(_, count)| *count > 0) {
        let _ = writeln!(out, "  {:>12}  {}", count, label);
    }
    for skipped in &diag.skipped_files {
        let _ = writeln!(out, "  skipped: {}", skipped.reason);
    }
    out
}
