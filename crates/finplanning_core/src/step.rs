//! One year of the household projection
//!
//! [`advance_year`] moves a [`HouseholdState`] from the start of one calendar
//! year to the start of the next and returns the year's snapshot. Within the
//! year the order is fixed:
//!
//! 1. income sources and non-registered distributions
//! 2. spending, recurring and one-time expenses
//! 3. RRIF/LIF minimum withdrawals
//! 4. withdrawals to close the funding gap, recomputing tax each pass
//! 5. growth on the remaining balances
//! 6. year-end deposits: the funded part of contributions, then surplus
//!    (reinvested distributions first)
//! 7. RRSP/LIRA conversion for owners who turned 71

use crate::error::TaxError;
use crate::model::{
    AccountType, AssetReturns, EventType, HouseholdPlan, Owner, Person, YearlyProjection,
    allocation_at, rrif,
};
use crate::projection_state::HouseholdState;
use crate::taxes::{TaxCalculator, TaxResult};

/// Passes of the withdraw-then-retax loop before giving up on convergence
pub const MAX_GAP_ITERATIONS: usize = 50;

/// Remaining gap treated as closed
const GAP_TOLERANCE: f64 = 0.005;

pub const CPP_EARLIEST_AGE: u8 = 60;
pub const CPP_LATEST_AGE: u8 = 70;
pub const OAS_EARLIEST_AGE: u8 = 65;
pub const OAS_LATEST_AGE: u8 = 70;
pub const STANDARD_BENEFIT_AGE: u8 = 65;

/// CPP reduction per month taken before 65
const CPP_EARLY_REDUCTION: f64 = 0.006;
/// CPP increase per month deferred past 65
const CPP_DEFERRAL_INCREASE: f64 = 0.007;
/// OAS increase per month deferred past 65
const OAS_DEFERRAL_INCREASE: f64 = 0.006;

/// Multiplier on the age-65 CPP amount for a given start age
#[must_use]
pub fn cpp_adjustment(start_age: u8) -> f64 {
    let start = start_age.clamp(CPP_EARLIEST_AGE, CPP_LATEST_AGE);
    let months = (i32::from(start) - i32::from(STANDARD_BENEFIT_AGE)) * 12;
    if months < 0 {
        1.0 + f64::from(months) * CPP_EARLY_REDUCTION
    } else {
        1.0 + f64::from(months) * CPP_DEFERRAL_INCREASE
    }
}

/// Multiplier on the age-65 OAS amount for a given start age
#[must_use]
pub fn oas_adjustment(start_age: u8) -> f64 {
    let start = start_age.clamp(OAS_EARLIEST_AGE, OAS_LATEST_AGE);
    let months = (i32::from(start) - i32::from(STANDARD_BENEFIT_AGE)) * 12;
    1.0 + f64::from(months) * OAS_DEFERRAL_INCREASE
}

/// Inputs shared by every year of one projection run
#[derive(Debug, Clone)]
pub struct ProjectionContext<'a> {
    pub plan: &'a HouseholdPlan,
    pub tax: TaxCalculator,
    /// First projected year; inflation compounds from here
    pub start_year: i16,
    /// Spending in today's dollars
    pub annual_spending: f64,
}

impl<'a> ProjectionContext<'a> {
    pub fn new(plan: &'a HouseholdPlan, start_year: i16) -> Self {
        Self {
            plan,
            tax: TaxCalculator::new(plan.assumptions.tax_projection.clone()),
            start_year,
            annual_spending: plan.strategy.annual_spending,
        }
    }

    #[must_use]
    pub fn with_spending(mut self, annual_spending: f64) -> Self {
        self.annual_spending = annual_spending;
        self
    }

    /// Cumulative general inflation from the start year to `year`
    pub fn inflation_factor(&self, year: i16) -> f64 {
        let elapsed = i32::from(year) - i32::from(self.start_year);
        (1.0 + self.plan.assumptions.inflation.general).powi(elapsed)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PersonIncome {
    employment: f64,
    pension: f64,
    cpp: f64,
    oas: f64,
    other: f64,
}

fn person_income(ctx: &ProjectionContext<'_>, person: &Person, year: i16) -> PersonIncome {
    let age = person.age_in(year);
    let elapsed = i32::from(year) - i32::from(ctx.start_year);
    let inflation = ctx.inflation_factor(year);
    let mut income = PersonIncome::default();

    if let Some(job) = &person.employment
        && age < job.retirement_age
    {
        let growth = job
            .growth_rate
            .unwrap_or(ctx.plan.assumptions.inflation.general);
        income.employment = job.annual_income * (1.0 + growth).powi(elapsed);
    }
    if let Some(pension) = &person.pension
        && age >= pension.start_age
    {
        let index = if pension.indexed { inflation } else { 1.0 };
        income.pension = pension.annual_amount * index;
    }
    if let Some(cpp) = &person.cpp
        && age >= cpp.start_age.clamp(CPP_EARLIEST_AGE, CPP_LATEST_AGE)
    {
        income.cpp = cpp.annual_amount_at_65 * cpp_adjustment(cpp.start_age) * inflation;
    }
    if let Some(oas) = &person.oas
        && age >= oas.start_age.clamp(OAS_EARLIEST_AGE, OAS_LATEST_AGE)
    {
        income.oas = oas.annual_amount_at_65 * oas_adjustment(oas.start_age) * inflation;
    }
    income.other = person.other_income * inflation;
    income
}

/// Per-account movements during one year
#[derive(Debug, Clone, Default)]
struct YearLedger {
    withdrawn: Vec<f64>,
    deposited: Vec<f64>,
    cash_drawn: f64,
    realized_gains: f64,
}

impl YearLedger {
    fn new(n_accounts: usize) -> Self {
        Self {
            withdrawn: vec![0.0; n_accounts],
            deposited: vec![0.0; n_accounts],
            ..Self::default()
        }
    }

    fn total_withdrawn(&self) -> f64 {
        self.withdrawn.iter().sum::<f64>() + self.cash_drawn
    }
}

/// Draw up to `needed` from household cash, then accounts in withdrawal
/// order. Returns the amount actually drawn.
///
/// `own_contribution[i]` is the part of `needed` going into account `i`
/// itself; that part is never drawn from account `i`.
fn draw_for_gap(
    order: &[AccountType],
    state: &mut HouseholdState,
    mut needed: f64,
    own_contribution: &[f64],
    ledger: &mut YearLedger,
) -> f64 {
    let mut drawn = 0.0;

    let from_cash = needed.min(state.cash);
    if from_cash > 0.0 {
        state.cash -= from_cash;
        ledger.cash_drawn += from_cash;
        needed -= from_cash;
        drawn += from_cash;
    }

    for rule in order {
        for (i, account) in state.accounts.iter_mut().enumerate() {
            if needed <= 0.0 {
                return drawn;
            }
            if account.account_type.is_locked() || !account.account_type.matches_rule(*rule) {
                continue;
            }
            let usable = needed - own_contribution[i];
            if usable <= 0.0 {
                continue;
            }
            let w = account.withdraw(usable);
            ledger.withdrawn[i] += w.amount;
            ledger.realized_gains += w.realized_gain;
            needed -= w.amount;
            drawn += w.amount;
        }
    }
    drawn
}

/// Project one calendar year and advance `state` to the next.
pub fn advance_year(
    ctx: &ProjectionContext<'_>,
    state: &mut HouseholdState,
    returns: AssetReturns,
) -> Result<YearlyProjection, TaxError> {
    let plan = ctx.plan;
    let household = &plan.household;
    let year = state.year;
    let inflation = ctx.inflation_factor(year);

    let person1_age = household.person1.age_in(year);
    let person2_age = household.person2.as_ref().map(|p| p.age_in(year));
    let owner_age = |owner: Owner| match owner {
        Owner::Person1 => Some(person1_age),
        Owner::Person2 => person2_age,
    };
    let allocation = allocation_at(&plan.assumptions.glide_path, person1_age);

    let mut snap = YearlyProjection {
        year,
        person1_age,
        person2_age,
        returns,
        ..YearlyProjection::default()
    };
    let mut ledger = YearLedger::new(state.accounts.len());

    // Income
    for person in household.persons() {
        let income = person_income(ctx, person, year);
        snap.employment_income += income.employment;
        snap.pension_income += income.pension;
        snap.cpp_income += income.cpp;
        snap.oas_income += income.oas;
        snap.other_income += income.other;
    }

    let dividend_yield = plan.assumptions.dividend_yield;
    let distributions: Vec<(usize, f64)> = state
        .accounts
        .iter()
        .enumerate()
        .filter(|(_, a)| a.account_type == AccountType::NonRegistered && a.balance > 0.0)
        .map(|(i, a)| (i, a.balance * dividend_yield))
        .collect();
    let distributed: f64 = distributions.iter().map(|(_, d)| d).sum();
    snap.portfolio_dividend_income = distributed * allocation.equity;
    snap.portfolio_interest_income = distributed * (allocation.fixed_income + allocation.cash);
    snap.investment_income = snap.portfolio_dividend_income + snap.portfolio_interest_income;

    let mut taxable_one_time = 0.0;
    for event in plan.one_time_events.iter().filter(|e| e.year == year) {
        match event.event_type {
            EventType::Income => {
                snap.one_time_income += event.amount;
                if event.taxable {
                    taxable_one_time += event.amount;
                }
            }
            EventType::Expense => snap.one_time_expenses += event.amount,
        }
    }

    snap.total_income = snap.employment_income
        + snap.pension_income
        + snap.cpp_income
        + snap.oas_income
        + snap.other_income
        + snap.investment_income
        + snap.one_time_income;

    // Expenses
    snap.spending = ctx.annual_spending * inflation;
    snap.recurring_expenses = plan
        .recurring_expenses
        .iter()
        .filter(|e| e.is_due(year))
        .map(|e| e.amount * inflation)
        .sum();
    snap.total_expenses = snap.spending + snap.recurring_expenses + snap.one_time_expenses;

    let contributions: Vec<(usize, f64)> = plan
        .contributions
        .iter()
        .filter(|c| c.is_active(year))
        .filter_map(|c| {
            let idx = state.account_index(&c.account_id)?;
            let amount = if c.indexed {
                c.annual_amount * inflation
            } else {
                c.annual_amount
            };
            Some((idx, amount))
        })
        .collect();
    snap.contributions = contributions.iter().map(|(_, amount)| amount).sum();
    let mut own_contribution = vec![0.0; state.accounts.len()];
    for &(idx, amount) in &contributions {
        own_contribution[idx] += amount;
    }

    // Mandatory minimums, based on age at the start of the year
    for (i, account) in state.accounts.iter_mut().enumerate() {
        if !account.account_type.has_minimum_withdrawal() {
            continue;
        }
        let Some(age) = owner_age(account.owner) else {
            continue;
        };
        let minimum = rrif::minimum_withdrawal(account.balance, age.saturating_sub(1));
        let w = account.withdraw(minimum);
        ledger.withdrawn[i] += w.amount;
        snap.rrif_minimum += w.amount;
    }

    // Close the funding gap; each draw can raise tax, so iterate
    let base_taxable = snap.employment_income
        + snap.pension_income
        + snap.cpp_income
        + snap.oas_income
        + snap.other_income
        + snap.investment_income
        + taxable_one_time;
    let inclusion_rate = ctx.tax.assumptions().capital_gains_inclusion_rate;
    let outflow = snap.total_expenses + snap.contributions;

    let mut passes = 0;
    let (tax, gap, taxable_income) = loop {
        let registered: f64 = state
            .accounts
            .iter()
            .zip(&ledger.withdrawn)
            .filter(|(a, _)| a.account_type.is_tax_deferred())
            .map(|(_, w)| w)
            .sum();
        let taxable_income = base_taxable + registered + ledger.realized_gains * inclusion_rate;
        let tax = ctx
            .tax
            .calculate_tax(taxable_income, year, household.province)?;
        let gap = outflow + tax.total_tax - (snap.total_income + ledger.total_withdrawn());

        passes += 1;
        if gap <= GAP_TOLERANCE || passes >= MAX_GAP_ITERATIONS {
            break (tax, gap, taxable_income);
        }
        let drawn = draw_for_gap(
            &plan.strategy.withdrawal_order,
            state,
            gap,
            &own_contribution,
            &mut ledger,
        );
        if drawn <= 0.0 {
            break (tax, gap, taxable_income);
        }
    };

    record_tax(ctx, &mut snap, &tax, taxable_income, &ledger, inclusion_rate)?;
    record_withdrawals(&mut snap, state, &ledger);

    // An unclosed gap cuts contributions before it counts as shortfall
    let unfunded = if gap > GAP_TOLERANCE { gap } else { 0.0 };
    let skipped = unfunded.min(snap.contributions);
    let funded_share = if snap.contributions > 0.0 {
        1.0 - skipped / snap.contributions
    } else {
        1.0
    };
    snap.contributions -= skipped;
    let remaining = unfunded - skipped;
    snap.shortfall = if remaining > GAP_TOLERANCE { remaining } else { 0.0 };

    snap.net_income = snap.total_income - snap.total_tax;
    snap.cash_flow = snap.net_income - snap.total_expenses - snap.contributions;
    let mut surplus = (-gap).max(0.0);

    // Growth; non-registered holdings pay their yield out as income
    let portfolio_rate = returns.weighted(&allocation);
    for account in &mut state.accounts {
        let rate = if account.account_type == AccountType::NonRegistered {
            portfolio_rate - dividend_yield
        } else {
            portfolio_rate
        };
        account.grow(rate);
    }
    state.cash = (state.cash * (1.0 + returns.cash)).max(0.0);

    // Year-end deposits; surplus goes back into the distributing accounts first
    for (idx, amount) in contributions {
        let funded = amount * funded_share;
        if funded > 0.0 {
            state.accounts[idx].deposit(funded);
            ledger.deposited[idx] += funded;
        }
    }
    if surplus > 0.0 && distributed > 0.0 {
        let reinvested = surplus.min(distributed);
        for (idx, amount) in distributions {
            let share = reinvested * amount / distributed;
            state.accounts[idx].deposit(share);
            ledger.deposited[idx] += share;
        }
        surplus -= reinvested;
    }
    if surplus > 0.0 {
        let target = plan
            .strategy
            .surplus_account
            .as_ref()
            .and_then(|id| state.account_index(id));
        match target {
            Some(idx) => {
                state.accounts[idx].deposit(surplus);
                ledger.deposited[idx] += surplus;
            }
            None => state.cash += surplus,
        }
    }

    state.convert_matured(owner_age, rrif::CONVERSION_AGE);

    record_balances(&mut snap, state, &ledger);
    state.year += 1;
    Ok(snap)
}

fn record_tax(
    ctx: &ProjectionContext<'_>,
    snap: &mut YearlyProjection,
    tax: &TaxResult,
    taxable_income: f64,
    ledger: &YearLedger,
    inclusion_rate: f64,
) -> Result<(), TaxError> {
    snap.realized_capital_gains = ledger.realized_gains;
    snap.taxable_capital_gains = ledger.realized_gains * inclusion_rate;
    snap.taxable_income = taxable_income;
    snap.federal_tax = tax.federal_tax;
    snap.provincial_tax = tax.provincial_tax;
    snap.total_tax = tax.total_tax;
    snap.marginal_tax_rate = tax.marginal_rate;
    snap.average_tax_rate = tax.average_rate;

    let split = ctx.tax.split_capital_gains_tax(
        taxable_income - snap.taxable_capital_gains,
        snap.taxable_capital_gains,
        tax.total_tax,
        snap.year,
        ctx.plan.household.province,
    )?;
    snap.income_tax = split.income_tax;
    snap.capital_gains_tax = split.capital_gains_tax;
    Ok(())
}

fn record_withdrawals(snap: &mut YearlyProjection, state: &HouseholdState, ledger: &YearLedger) {
    for (account, amount) in state.accounts.iter().zip(&ledger.withdrawn) {
        let bucket = match account.account_type {
            AccountType::NonRegistered => &mut snap.withdrawal_non_reg,
            AccountType::Rrsp | AccountType::Rrif => &mut snap.withdrawal_rrsp_rrif,
            AccountType::Lira | AccountType::Lif => &mut snap.withdrawal_lira_lif,
            AccountType::Tfsa => &mut snap.withdrawal_tfsa,
            AccountType::Other => &mut snap.withdrawal_other,
        };
        *bucket += amount;
    }
    snap.withdrawal_cash = ledger.cash_drawn;
    snap.total_withdrawals = ledger.total_withdrawn();
}

fn record_balances(snap: &mut YearlyProjection, state: &HouseholdState, ledger: &YearLedger) {
    for (i, account) in state.accounts.iter().enumerate() {
        snap.account_balances
            .insert(account.id.clone(), account.balance);
        snap.account_net_deposits
            .insert(account.id.clone(), ledger.deposited[i] - ledger.withdrawn[i]);
    }
    snap.total_non_reg = state.balance_where(|t| t == AccountType::NonRegistered);
    snap.total_rrsp_rrif =
        state.balance_where(|t| matches!(t, AccountType::Rrsp | AccountType::Rrif));
    snap.total_lira_lif =
        state.balance_where(|t| matches!(t, AccountType::Lira | AccountType::Lif));
    snap.total_tfsa = state.balance_where(|t| t == AccountType::Tfsa);
    snap.total_other = state.balance_where(|t| t == AccountType::Other);
    snap.cash_balance = state.cash;
    snap.total_net_worth = state.net_worth();
    snap.depleted = snap.total_net_worth <= 0.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpp_adjustment() {
        assert!((cpp_adjustment(60) - 0.64).abs() < 1e-12);
        assert!((cpp_adjustment(65) - 1.0).abs() < 1e-12);
        assert!((cpp_adjustment(70) - 1.42).abs() < 1e-12);
        // out-of-range start ages are clamped
        assert!((cpp_adjustment(55) - 0.64).abs() < 1e-12);
        assert!((cpp_adjustment(75) - 1.42).abs() < 1e-12);
    }

    #[test]
    fn test_oas_adjustment() {
        assert!((oas_adjustment(65) - 1.0).abs() < 1e-12);
        assert!((oas_adjustment(70) - 1.36).abs() < 1e-12);
        assert!((oas_adjustment(60) - 1.0).abs() < 1e-12);
    }
}
