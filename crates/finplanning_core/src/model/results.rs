//! Projection and Monte Carlo outputs
//!
//! Results are built once by the engine and never mutated afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::AccountId;
use super::market::{AssetReturns, ReturnMethod};

/// Immutable snapshot of the household at the end of one projection year
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct YearlyProjection {
    pub year: i16,
    pub person1_age: u8,
    pub person2_age: Option<u8>,

    // Income
    pub employment_income: f64,
    pub pension_income: f64,
    pub cpp_income: f64,
    pub oas_income: f64,
    pub other_income: f64,
    pub portfolio_dividend_income: f64,
    pub portfolio_interest_income: f64,
    /// Dividends plus interest from non-registered holdings
    pub investment_income: f64,
    pub one_time_income: f64,
    pub total_income: f64,

    // Withdrawals
    pub withdrawal_non_reg: f64,
    pub withdrawal_rrsp_rrif: f64,
    pub withdrawal_lira_lif: f64,
    pub withdrawal_tfsa: f64,
    pub withdrawal_other: f64,
    pub withdrawal_cash: f64,
    pub total_withdrawals: f64,
    /// Mandatory RRIF/LIF minimum included in the registered withdrawals
    pub rrif_minimum: f64,

    // Tax
    pub realized_capital_gains: f64,
    pub taxable_capital_gains: f64,
    pub taxable_income: f64,
    pub federal_tax: f64,
    pub provincial_tax: f64,
    pub total_tax: f64,
    pub income_tax: f64,
    pub capital_gains_tax: f64,
    pub marginal_tax_rate: f64,
    pub average_tax_rate: f64,

    // Expenses
    pub spending: f64,
    pub recurring_expenses: f64,
    pub one_time_expenses: f64,
    pub total_expenses: f64,

    // Flows
    pub contributions: f64,
    /// Income after tax, before expenses
    pub net_income: f64,
    /// Income less tax and expenses, before withdrawals
    pub cash_flow: f64,
    /// Spending that could not be funded
    pub shortfall: f64,
    pub account_net_deposits: BTreeMap<AccountId, f64>,

    // Balances
    pub account_balances: BTreeMap<AccountId, f64>,
    pub total_non_reg: f64,
    pub total_rrsp_rrif: f64,
    pub total_lira_lif: f64,
    pub total_tfsa: f64,
    pub total_other: f64,
    pub cash_balance: f64,
    pub total_net_worth: f64,

    pub returns: AssetReturns,
    pub depleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    EventOutsideHorizon,
    RecurringExpenseOutsideHorizon,
    NoWithdrawalRule,
    FundingShortfall,
}

/// Non-fatal condition noticed during a projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionWarning {
    pub kind: WarningKind,
    pub message: String,
    pub year: Option<i16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResult {
    pub years: Vec<YearlyProjection>,
    pub final_net_worth: f64,
    /// person1's age in the first year net worth fell to zero or below
    pub depletion_age: Option<u8>,
    /// Planned spending in today's dollars
    pub desired_spending: f64,
    /// Highest constant spending that does not deplete, when solved for
    pub sustainable_spending: Option<f64>,
    pub warnings: Vec<ProjectionWarning>,
}

impl ProjectionResult {
    pub fn start_year(&self) -> Option<i16> {
        self.years.first().map(|y| y.year)
    }

    pub fn end_year(&self) -> Option<i16> {
        self.years.last().map(|y| y.year)
    }

    pub fn depleted(&self) -> bool {
        self.depletion_age.is_some()
    }

    pub fn total_tax(&self) -> f64 {
        self.years.iter().map(|y| y.total_tax).sum()
    }

    pub fn total_withdrawals(&self) -> f64 {
        self.years.iter().map(|y| y.total_withdrawals).sum()
    }
}

/// Percentile keys reported by Monte Carlo runs
pub const PERCENTILE_KEYS: [u8; 5] = [10, 25, 50, 75, 90];

/// Net worth path of one Monte Carlo trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePath {
    pub trial: usize,
    pub net_worth: Vec<f64>,
    pub depletion_age: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub n_iterations: usize,
    /// Seed the run actually used; replaying it reproduces the result
    pub seed: u64,
    pub return_method: ReturnMethod,
    pub depletion_probability: f64,
    pub depletion_count: usize,
    /// Median person1 depletion age among depleting trials only
    pub median_depletion_age: Option<u8>,
    pub projection_years: Vec<i16>,
    pub person1_ages: Vec<u8>,
    /// Percentile key to net worth per projection year
    pub net_worth_percentiles_by_year: BTreeMap<u8, Vec<f64>>,
    /// Percentile key to final-year net worth
    pub percentiles: BTreeMap<u8, f64>,
    pub sample_paths: Vec<SamplePath>,
}

impl MonteCarloResult {
    pub fn success_rate(&self) -> f64 {
        1.0 - self.depletion_probability
    }

    /// Net worth at `percentile` in every projection year
    pub fn band(&self, percentile: u8) -> Option<&[f64]> {
        self.net_worth_percentiles_by_year
            .get(&percentile)
            .map(Vec::as_slice)
    }
}
