//! Plain-text reports for the terminal

use std::fmt::Write;

use finplanning_core::export::{SummaryRow, rows_for_summary_output};
use finplanning_core::model::{MonteCarloResult, PERCENTILE_KEYS, ProjectionResult};
use finplanning_core::taxes::TaxResult;

use crate::format::{
    format_compact_currency, format_currency, format_currency_short, format_percentage,
};

/// Summary rows whose values are counts, years or ages rather than dollars
const WHOLE_NUMBER_ROWS: &[&str] = &["Start year", "End year", "Depletion age", "Warnings"];

fn summary_value(row: &SummaryRow) -> String {
    match row.value {
        None => "-".to_string(),
        Some(v) if WHOLE_NUMBER_ROWS.contains(&row.label) => format!("{v:.0}"),
        Some(v) => format_currency(v),
    }
}

/// Year-by-year table followed by the run summary and any warnings
pub fn projection_report(result: &ProjectionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>6} {:>5} {:>12} {:>12} {:>12} {:>12} {:>12} {:>14}",
        "Year", "Age", "Income", "Withdrawals", "Tax", "Expenses", "Shortfall", "Net worth"
    );
    for y in &result.years {
        let _ = writeln!(
            out,
            "{:>6} {:>5} {:>12} {:>12} {:>12} {:>12} {:>12} {:>14}",
            y.year,
            y.person1_age,
            format_currency_short(y.total_income),
            format_currency_short(y.total_withdrawals),
            format_currency_short(y.total_tax),
            format_currency_short(y.total_expenses),
            format_currency_short(y.shortfall),
            format_currency_short(y.total_net_worth),
        );
    }

    out.push('\n');
    for row in rows_for_summary_output(result) {
        let _ = writeln!(out, "{:<22} {}", row.label, summary_value(&row));
    }

    if !result.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for warning in &result.warnings {
            let _ = writeln!(out, "  - {}", warning.message);
        }
    }
    out
}

/// Success rate, depletion statistics and final-year net worth bands
pub fn monte_carlo_report(result: &MonteCarloResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Trials: {} ({} returns, seed {})",
        result.n_iterations, result.return_method, result.seed
    );
    let _ = writeln!(out, "Success rate: {}", format_percentage(result.success_rate()));
    let _ = writeln!(
        out,
        "Depleted trials: {} ({})",
        result.depletion_count,
        format_percentage(result.depletion_probability)
    );
    match result.median_depletion_age {
        Some(age) => {
            let _ = writeln!(out, "Median depletion age: {age}");
        }
        None => out.push_str("Median depletion age: -\n"),
    }

    out.push_str("\nFinal net worth by percentile:\n");
    for p in PERCENTILE_KEYS {
        if let Some(value) = result.percentiles.get(&p) {
            let _ = writeln!(out, "  P{p:<3} {}", format_compact_currency(*value));
        }
    }
    out
}

/// Breakdown of a single tax calculation
pub fn tax_report(income: f64, year: i16, province: &str, tax: &TaxResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Taxable income ({year}, {province}): {}", format_currency(income));
    let _ = writeln!(out, "Federal tax:     {}", format_currency(tax.federal_tax));
    let _ = writeln!(out, "Provincial tax:  {}", format_currency(tax.provincial_tax));
    let _ = writeln!(out, "Total tax:       {}", format_currency(tax.total_tax));
    let _ = writeln!(out, "Average rate:    {}", format_percentage(tax.average_rate));
    let _ = writeln!(out, "Marginal rate:   {}", format_percentage(tax.marginal_rate));
    out
}
