//! Flat tabular views of projection results
//!
//! Every numeric field of [`YearlyProjection`] maps to one named column, plus
//! a balance and a net-deposit column per plan account. Cells are
//! `Option<f64>` so values that do not apply (such as a missing second
//! person's age) stay empty rather than reading as zero.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::ExportError;
use crate::model::{HouseholdPlan, ProjectionResult, YearlyProjection};

/// One label/value line of the run summary
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub label: &'static str,
    pub value: Option<f64>,
}

type Extractor = fn(&YearlyProjection) -> Option<f64>;

struct Column {
    label: &'static str,
    value: Extractor,
}

const fn col(label: &'static str, value: Extractor) -> Column {
    Column { label, value }
}

const YEAR_COLUMNS: &[Column] = &[
    col("Year", |y| Some(f64::from(y.year))),
    col("Person 1 age", |y| Some(f64::from(y.person1_age))),
    col("Person 2 age", |y| y.person2_age.map(f64::from)),
    col("Employment income", |y| Some(y.employment_income)),
    col("Pension income", |y| Some(y.pension_income)),
    col("CPP income", |y| Some(y.cpp_income)),
    col("OAS income", |y| Some(y.oas_income)),
    col("Other income", |y| Some(y.other_income)),
    col("Dividend income", |y| Some(y.portfolio_dividend_income)),
    col("Interest income", |y| Some(y.portfolio_interest_income)),
    col("Investment income", |y| Some(y.investment_income)),
    col("One-time income", |y| Some(y.one_time_income)),
    col("Total income", |y| Some(y.total_income)),
    col("Withdrawal non-registered", |y| Some(y.withdrawal_non_reg)),
    col("Withdrawal RRSP/RRIF", |y| Some(y.withdrawal_rrsp_rrif)),
    col("Withdrawal LIRA/LIF", |y| Some(y.withdrawal_lira_lif)),
    col("Withdrawal TFSA", |y| Some(y.withdrawal_tfsa)),
    col("Withdrawal other", |y| Some(y.withdrawal_other)),
    col("Withdrawal cash", |y| Some(y.withdrawal_cash)),
    col("Total withdrawals", |y| Some(y.total_withdrawals)),
    col("RRIF minimum", |y| Some(y.rrif_minimum)),
    col("Realized capital gains", |y| Some(y.realized_capital_gains)),
    col("Taxable capital gains", |y| Some(y.taxable_capital_gains)),
    col("Taxable income", |y| Some(y.taxable_income)),
    col("Federal tax", |y| Some(y.federal_tax)),
    col("Provincial tax", |y| Some(y.provincial_tax)),
    col("Total tax", |y| Some(y.total_tax)),
    col("Income tax", |y| Some(y.income_tax)),
    col("Capital gains tax", |y| Some(y.capital_gains_tax)),
    col("Marginal tax rate", |y| Some(y.marginal_tax_rate)),
    col("Average tax rate", |y| Some(y.average_tax_rate)),
    col("Spending", |y| Some(y.spending)),
    col("Recurring expenses", |y| Some(y.recurring_expenses)),
    col("One-time expenses", |y| Some(y.one_time_expenses)),
    col("Total expenses", |y| Some(y.total_expenses)),
    col("Contributions", |y| Some(y.contributions)),
    col("Net income", |y| Some(y.net_income)),
    col("Cash flow", |y| Some(y.cash_flow)),
    col("Shortfall", |y| Some(y.shortfall)),
    col("Non-registered", |y| Some(y.total_non_reg)),
    col("RRSP/RRIF", |y| Some(y.total_rrsp_rrif)),
    col("LIRA/LIF", |y| Some(y.total_lira_lif)),
    col("TFSA", |y| Some(y.total_tfsa)),
    col("Other accounts", |y| Some(y.total_other)),
    col("Cash", |y| Some(y.cash_balance)),
    col("Net worth", |y| Some(y.total_net_worth)),
    col("Equity return", |y| Some(y.returns.equity)),
    col("Fixed income return", |y| Some(y.returns.fixed_income)),
    col("Cash return", |y| Some(y.returns.cash)),
];

/// Label/value summary of a projection run
pub fn rows_for_summary_output(projection: &ProjectionResult) -> Vec<SummaryRow> {
    let row = |label, value| SummaryRow { label, value };
    vec![
        row("Start year", projection.start_year().map(f64::from)),
        row("End year", projection.end_year().map(f64::from)),
        row("Final net worth", Some(projection.final_net_worth)),
        row("Depletion age", projection.depletion_age.map(f64::from)),
        row("Desired spending", Some(projection.desired_spending)),
        row("Sustainable spending", projection.sustainable_spending),
        row("Total tax", Some(projection.total_tax())),
        row("Total withdrawals", Some(projection.total_withdrawals())),
        row("Warnings", Some(projection.warnings.len() as f64)),
    ]
}

/// Column labels for the per-year table of a plan
pub fn header_labels_for_plan(plan: &HouseholdPlan) -> Vec<String> {
    let mut labels: Vec<String> = YEAR_COLUMNS.iter().map(|c| c.label.to_string()).collect();
    labels.extend(plan.accounts.iter().map(|a| format!("Balance: {}", a.id)));
    labels.extend(plan.accounts.iter().map(|a| format!("Net deposits: {}", a.id)));
    labels
}

/// One row per projected year, aligned with [`header_labels_for_plan`]
pub fn rows_for_tabular_output(
    projection: &ProjectionResult,
    plan: &HouseholdPlan,
) -> Vec<Vec<Option<f64>>> {
    projection
        .years
        .iter()
        .map(|year| {
            let mut cells: Vec<Option<f64>> =
                YEAR_COLUMNS.iter().map(|c| (c.value)(year)).collect();
            cells.extend(
                plan.accounts
                    .iter()
                    .map(|a| year.account_balances.get(&a.id).copied()),
            );
            cells.extend(
                plan.accounts
                    .iter()
                    .map(|a| year.account_net_deposits.get(&a.id).copied()),
            );
            cells
        })
        .collect()
}

fn format_cell(value: Option<f64>) -> String {
    match value {
        None => String::new(),
        Some(v) if v.fract() == 0.0 => format!("{v:.0}"),
        Some(v) => format!("{v:.2}"),
    }
}

/// Write a header line and rows as CSV; empty cells for `None`.
pub fn write_csv<W: Write>(
    writer: W,
    headers: &[String],
    rows: &[Vec<Option<f64>>],
) -> Result<(), ExportError> {
    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv.write_record(headers)?;
    for (i, row) in rows.iter().enumerate() {
        if row.len() != headers.len() {
            return Err(ExportError::RowWidth {
                row: i,
                found: row.len(),
                expected: headers.len(),
            });
        }
        csv.write_record(row.iter().map(|cell| format_cell(*cell)))?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the per-year table of a projection to a CSV file.
pub fn write_projection_csv(
    path: impl AsRef<Path>,
    projection: &ProjectionResult,
    plan: &HouseholdPlan,
) -> Result<(), ExportError> {
    let file = File::create(path)?;
    write_csv(
        file,
        &header_labels_for_plan(plan),
        &rows_for_tabular_output(projection, plan),
    )
}
