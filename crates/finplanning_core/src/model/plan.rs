//! Household plan definition
//!
//! A plan is read once from YAML, validated, and then treated as immutable.
//! Scenario overrides are applied to a copy via [`HouseholdPlan::resolve_scenario`],
//! so every run sees a consistent snapshot.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::error::{TaxError, ValidationError};

use super::ids::{AccountId, ScenarioId};

/// Scenario id used when a plan declares no scenarios
pub const IMPLICIT_BASE_SCENARIO: &str = "base";

// ============================================================================
// Household
// ============================================================================

/// Canadian provinces and territories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Province {
    #[serde(rename = "AB")]
    Alberta,
    #[serde(rename = "BC")]
    BritishColumbia,
    #[serde(rename = "MB")]
    Manitoba,
    #[serde(rename = "NB")]
    NewBrunswick,
    #[serde(rename = "NL")]
    NewfoundlandAndLabrador,
    #[serde(rename = "NS")]
    NovaScotia,
    #[serde(rename = "NT")]
    NorthwestTerritories,
    #[serde(rename = "NU")]
    Nunavut,
    #[default]
    #[serde(rename = "ON")]
    Ontario,
    #[serde(rename = "PE")]
    PrinceEdwardIsland,
    #[serde(rename = "QC")]
    Quebec,
    #[serde(rename = "SK")]
    Saskatchewan,
    #[serde(rename = "YT")]
    Yukon,
}

impl Province {
    pub const ALL: [Province; 13] = [
        Province::Alberta,
        Province::BritishColumbia,
        Province::Manitoba,
        Province::NewBrunswick,
        Province::NewfoundlandAndLabrador,
        Province::NovaScotia,
        Province::NorthwestTerritories,
        Province::Nunavut,
        Province::Ontario,
        Province::PrinceEdwardIsland,
        Province::Quebec,
        Province::Saskatchewan,
        Province::Yukon,
    ];

    /// Two-letter postal code
    pub const fn code(self) -> &'static str {
        match self {
            Province::Alberta => "AB",
            Province::BritishColumbia => "BC",
            Province::Manitoba => "MB",
            Province::NewBrunswick => "NB",
            Province::NewfoundlandAndLabrador => "NL",
            Province::NovaScotia => "NS",
            Province::NorthwestTerritories => "NT",
            Province::Nunavut => "NU",
            Province::Ontario => "ON",
            Province::PrinceEdwardIsland => "PE",
            Province::Quebec => "QC",
            Province::Saskatchewan => "SK",
            Province::Yukon => "YT",
        }
    }
}

impl fmt::Display for Province {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Province {
    type Err = TaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Province::ALL
            .into_iter()
            .find(|p| p.code() == code)
            .ok_or_else(|| TaxError::InvalidProvince(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Household {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub province: Province,
    pub person1: Person,
    #[serde(default)]
    pub person2: Option<Person>,
}

impl Household {
    pub fn persons(&self) -> impl Iterator<Item = &Person> {
        std::iter::once(&self.person1).chain(self.person2.as_ref())
    }

    pub fn person(&self, owner: Owner) -> Option<&Person> {
        match owner {
            Owner::Person1 => Some(&self.person1),
            Owner::Person2 => self.person2.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub birth_date: Date,
    #[serde(default = "default_life_expectancy")]
    pub life_expectancy_age: u8,
    #[serde(default)]
    pub employment: Option<Employment>,
    #[serde(default)]
    pub pension: Option<Pension>,
    #[serde(default)]
    pub cpp: Option<Benefit>,
    #[serde(default)]
    pub oas: Option<Benefit>,
    /// Other taxable income in today's dollars, indexed to inflation
    #[serde(default)]
    pub other_income: f64,
}

fn default_life_expectancy() -> u8 {
    95
}

impl Person {
    /// Age attained during the given calendar year
    #[must_use]
    pub fn age_in(&self, year: i16) -> u8 {
        let age = i32::from(year) - i32::from(self.birth_date.year());
        age.clamp(0, i32::from(u8::MAX)) as u8
    }

    /// Calendar year in which the person reaches life expectancy
    #[must_use]
    pub fn final_year(&self) -> i16 {
        self.birth_date.year() + i16::from(self.life_expectancy_age)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employment {
    pub annual_income: f64,
    #[serde(default = "default_retirement_age")]
    pub retirement_age: u8,
    /// Nominal raise per year; general inflation when absent
    #[serde(default)]
    pub growth_rate: Option<f64>,
}

fn default_retirement_age() -> u8 {
    65
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pension {
    pub annual_amount: f64,
    #[serde(default = "default_retirement_age")]
    pub start_age: u8,
    #[serde(default = "default_true")]
    pub indexed: bool,
}

fn default_true() -> bool {
    true
}

/// A government benefit (CPP or OAS) quoted as the amount payable at 65
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benefit {
    pub annual_amount_at_65: f64,
    #[serde(default = "default_retirement_age")]
    pub start_age: u8,
}

// ============================================================================
// Accounts and flows
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Rrsp,
    Rrif,
    Lira,
    Lif,
    Tfsa,
    NonRegistered,
    Other,
}

impl AccountType {
    /// Withdrawals are fully taxable income
    pub const fn is_tax_deferred(self) -> bool {
        matches!(
            self,
            AccountType::Rrsp | AccountType::Rrif | AccountType::Lira | AccountType::Lif
        )
    }

    /// Subject to a minimum annual withdrawal
    pub const fn has_minimum_withdrawal(self) -> bool {
        matches!(self, AccountType::Rrif | AccountType::Lif)
    }

    /// Locked-in accounts cannot be drawn on beyond their minimum
    pub const fn is_locked(self) -> bool {
        matches!(self, AccountType::Lira)
    }

    /// Account type this one becomes at the conversion age
    pub const fn converts_to(self) -> Option<AccountType> {
        match self {
            AccountType::Rrsp => Some(AccountType::Rrif),
            AccountType::Lira => Some(AccountType::Lif),
            _ => None,
        }
    }

    /// Whether a withdrawal-order entry of type `rule` draws from this account.
    ///
    /// An RRSP entry also covers RRIFs (and the reverse), and likewise LIRA and LIF.
    pub fn matches_rule(self, rule: AccountType) -> bool {
        self.family() == rule.family()
    }

    fn family(self) -> AccountType {
        match self {
            AccountType::Rrif => AccountType::Rrsp,
            AccountType::Lif => AccountType::Lira,
            other => other,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            AccountType::Rrsp => "RRSP",
            AccountType::Rrif => "RRIF",
            AccountType::Lira => "LIRA",
            AccountType::Lif => "LIF",
            AccountType::Tfsa => "TFSA",
            AccountType::NonRegistered => "Non-registered",
            AccountType::Other => "Other",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    #[default]
    Person1,
    Person2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub account_type: AccountType,
    #[serde(default)]
    pub owner: Owner,
    pub balance: f64,
    /// Adjusted cost base for non-registered accounts; defaults to the balance
    #[serde(default)]
    pub cost_basis: Option<f64>,
}

/// A scheduled deposit into an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub account_id: AccountId,
    pub annual_amount: f64,
    #[serde(default)]
    pub start_year: Option<i16>,
    #[serde(default)]
    pub end_year: Option<i16>,
    #[serde(default)]
    pub indexed: bool,
}

impl Contribution {
    pub fn is_active(&self, year: i16) -> bool {
        self.start_year.is_none_or(|s| year >= s) && self.end_year.is_none_or(|e| year <= e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Income,
    Expense,
}

/// A single cash flow in a given year, in nominal dollars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneTimeEvent {
    pub name: String,
    pub year: i16,
    pub event_type: EventType,
    pub amount: f64,
    #[serde(default)]
    pub taxable: bool,
}

/// An expense repeating every `period_years`, quoted in today's dollars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringExpense {
    pub name: String,
    pub start_year: i16,
    #[serde(default)]
    pub end_year: Option<i16>,
    #[serde(default = "default_period")]
    pub period_years: u16,
    pub amount: f64,
}

fn default_period() -> u16 {
    1
}

impl RecurringExpense {
    /// Whether the expense falls due in `year`
    pub fn is_due(&self, year: i16) -> bool {
        if year < self.start_year || self.end_year.is_some_and(|end| year > end) {
            return false;
        }
        let elapsed = i32::from(year) - i32::from(self.start_year);
        self.period_years > 0 && elapsed % i32::from(self.period_years) == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    /// Desired spending in today's dollars, inflated each year
    #[serde(default)]
    pub annual_spending: f64,
    #[serde(default = "default_withdrawal_order")]
    pub withdrawal_order: Vec<AccountType>,
    /// Account that receives surplus cash; household cash when absent
    #[serde(default)]
    pub surplus_account: Option<AccountId>,
}

fn default_withdrawal_order() -> Vec<AccountType> {
    vec![
        AccountType::NonRegistered,
        AccountType::Rrsp,
        AccountType::Tfsa,
    ]
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            annual_spending: 0.0,
            withdrawal_order: default_withdrawal_order(),
            surplus_account: None,
        }
    }
}

// ============================================================================
// Assumptions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InflationAssumptions {
    pub general: f64,
}

impl Default for InflationAssumptions {
    fn default() -> Self {
        Self { general: 0.02 }
    }
}

/// Parameters used to project tax brackets beyond the schedule year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxProjectionAssumptions {
    pub base_year: i16,
    pub indexation_rate: f64,
    pub capital_gains_inclusion_rate: f64,
}

impl Default for TaxProjectionAssumptions {
    fn default() -> Self {
        Self {
            base_year: 2024,
            indexation_rate: 0.02,
            capital_gains_inclusion_rate: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetAssumption {
    pub mean: f64,
    #[serde(default)]
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReturnAssumptions {
    pub equity: AssetAssumption,
    pub fixed_income: AssetAssumption,
    pub cash: AssetAssumption,
}

impl Default for ReturnAssumptions {
    fn default() -> Self {
        Self {
            equity: AssetAssumption {
                mean: 0.06,
                std_dev: 0.16,
            },
            fixed_income: AssetAssumption {
                mean: 0.035,
                std_dev: 0.06,
            },
            cash: AssetAssumption {
                mean: 0.02,
                std_dev: 0.01,
            },
        }
    }
}

/// Target allocation at a given person1 age
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlidePoint {
    pub age: u8,
    pub equity: f64,
    pub fixed_income: f64,
    pub cash: f64,
}

/// Normalised asset mix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub equity: f64,
    pub fixed_income: f64,
    pub cash: f64,
}

impl Default for Allocation {
    fn default() -> Self {
        Self {
            equity: 0.6,
            fixed_income: 0.35,
            cash: 0.05,
        }
    }
}

impl Allocation {
    fn normalised(equity: f64, fixed_income: f64, cash: f64) -> Self {
        let total = equity + fixed_income + cash;
        if total <= 0.0 {
            return Self::default();
        }
        Self {
            equity: equity / total,
            fixed_income: fixed_income / total,
            cash: cash / total,
        }
    }
}

/// Allocation at `age`, linearly interpolated between glide-path points
/// and held flat beyond either end.
#[must_use]
pub fn allocation_at(glide_path: &[GlidePoint], age: u8) -> Allocation {
    let mut points: Vec<&GlidePoint> = glide_path.iter().collect();
    points.sort_by_key(|p| p.age);

    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Allocation::default();
    };
    if age <= first.age {
        return Allocation::normalised(first.equity, first.fixed_income, first.cash);
    }
    if age >= last.age {
        return Allocation::normalised(last.equity, last.fixed_income, last.cash);
    }

    for pair in points.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if age >= lo.age && age <= hi.age {
            let span = f64::from(hi.age - lo.age);
            let t = if span > 0.0 {
                f64::from(age - lo.age) / span
            } else {
                0.0
            };
            let lerp = |a: f64, b: f64| a + (b - a) * t;
            return Allocation::normalised(
                lerp(lo.equity, hi.equity),
                lerp(lo.fixed_income, hi.fixed_income),
                lerp(lo.cash, hi.cash),
            );
        }
    }
    Allocation::normalised(last.equity, last.fixed_income, last.cash)
}

/// A plan-level market shock applied to equities in one year
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlackSwan {
    pub trigger_year: i16,
    pub equity_return: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Assumptions {
    #[serde(default)]
    pub inflation: InflationAssumptions,
    #[serde(default)]
    pub tax_projection: TaxProjectionAssumptions,
    #[serde(default)]
    pub returns: ReturnAssumptions,
    #[serde(default)]
    pub glide_path: Vec<GlidePoint>,
    /// Annual distribution yield on non-registered balances
    #[serde(default)]
    pub dividend_yield: f64,
    #[serde(default)]
    pub black_swan: Option<BlackSwan>,
}

// ============================================================================
// Scenarios
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioOverrides {
    pub annual_spending: Option<f64>,
    pub withdrawal_order: Option<Vec<AccountType>>,
    pub person1_retirement_age: Option<u8>,
    pub person2_retirement_age: Option<u8>,
    pub person1_cpp_start_age: Option<u8>,
    pub person2_cpp_start_age: Option<u8>,
    pub person1_oas_start_age: Option<u8>,
    pub person2_oas_start_age: Option<u8>,
    pub inflation: Option<f64>,
    pub returns: Option<ReturnAssumptions>,
    pub glide_path: Option<Vec<GlidePoint>>,
    pub disable_black_swan: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: ScenarioId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub overrides: ScenarioOverrides,
}

// ============================================================================
// Plan
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdPlan {
    pub household: Household,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub contributions: Vec<Contribution>,
    #[serde(default)]
    pub one_time_events: Vec<OneTimeEvent>,
    #[serde(default)]
    pub recurring_expenses: Vec<RecurringExpense>,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub assumptions: Assumptions,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
    #[serde(default)]
    pub base_scenario_id: Option<ScenarioId>,
}

impl HouseholdPlan {
    /// Parse and validate a plan from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ValidationError> {
        let plan: HouseholdPlan = serde_saphyr::from_str(yaml)
            .map_err(|e| ValidationError::MalformedPlan(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Check cross-references and amounts.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut ids = HashSet::new();
        for account in &self.accounts {
            if !ids.insert(&account.id) {
                return Err(ValidationError::DuplicateAccount(account.id.clone()));
            }
            check_amount(&format!("balance of {}", account.id), account.balance)?;
            if let Some(acb) = account.cost_basis {
                check_amount(&format!("cost basis of {}", account.id), acb)?;
            }
            if account.owner == Owner::Person2 && self.household.person2.is_none() {
                return Err(ValidationError::MalformedPlan(format!(
                    "account {} is owned by person2 but the household has no person2",
                    account.id
                )));
            }
        }

        for contribution in &self.contributions {
            if !ids.contains(&contribution.account_id) {
                return Err(ValidationError::UnknownAccount {
                    context: "contribution".to_string(),
                    id: contribution.account_id.clone(),
                });
            }
            check_amount("contribution amount", contribution.annual_amount)?;
        }

        if let Some(surplus) = &self.strategy.surplus_account
            && !ids.contains(surplus)
        {
            return Err(ValidationError::UnknownAccount {
                context: "surplus_account".to_string(),
                id: surplus.clone(),
            });
        }
        check_amount("annual_spending", self.strategy.annual_spending)?;

        for event in &self.one_time_events {
            check_amount(&format!("amount of event {:?}", event.name), event.amount)?;
        }
        for expense in &self.recurring_expenses {
            if expense.period_years == 0 {
                return Err(ValidationError::ZeroPeriod(expense.name.clone()));
            }
            check_amount(&format!("amount of expense {:?}", expense.name), expense.amount)?;
        }

        let mut scenario_ids = HashSet::new();
        for scenario in &self.scenarios {
            if !scenario_ids.insert(&scenario.id) {
                return Err(ValidationError::MalformedPlan(format!(
                    "duplicate scenario id {}",
                    scenario.id
                )));
            }
            if let Some(spending) = scenario.overrides.annual_spending {
                check_amount(&format!("annual_spending of scenario {}", scenario.id), spending)?;
            }
        }
        if let Some(base) = &self.base_scenario_id
            && !self.scenarios.is_empty()
            && !scenario_ids.contains(base)
        {
            return Err(ValidationError::UnknownScenario(base.clone()));
        }
        Ok(())
    }

    /// Id of the scenario used when none is named
    pub fn base_scenario(&self) -> ScenarioId {
        if let Some(id) = &self.base_scenario_id {
            return id.clone();
        }
        self.scenarios
            .first()
            .map(|s| s.id.clone())
            .unwrap_or_else(|| ScenarioId::new(IMPLICIT_BASE_SCENARIO))
    }

    /// All scenario ids runnable against this plan
    pub fn scenario_ids(&self) -> Vec<ScenarioId> {
        if self.scenarios.is_empty() {
            vec![self.base_scenario()]
        } else {
            self.scenarios.iter().map(|s| s.id.clone()).collect()
        }
    }

    /// Copy of the plan with the named scenario's overrides applied.
    pub fn resolve_scenario(&self, id: &ScenarioId) -> Result<HouseholdPlan, ValidationError> {
        let overrides = if self.scenarios.is_empty() {
            if *id != self.base_scenario() {
                return Err(ValidationError::UnknownScenario(id.clone()));
            }
            ScenarioOverrides::default()
        } else {
            self.scenarios
                .iter()
                .find(|s| s.id == *id)
                .map(|s| s.overrides.clone())
                .ok_or_else(|| ValidationError::UnknownScenario(id.clone()))?
        };

        let mut plan = self.clone();
        plan.apply_overrides(&overrides);
        Ok(plan)
    }

    fn apply_overrides(&mut self, o: &ScenarioOverrides) {
        if let Some(spending) = o.annual_spending {
            self.strategy.annual_spending = spending;
        }
        if let Some(order) = &o.withdrawal_order {
            self.strategy.withdrawal_order = order.clone();
        }
        if let Some(rate) = o.inflation {
            self.assumptions.inflation.general = rate;
        }
        if let Some(returns) = &o.returns {
            self.assumptions.returns = returns.clone();
        }
        if let Some(path) = &o.glide_path {
            self.assumptions.glide_path = path.clone();
        }
        if o.disable_black_swan {
            self.assumptions.black_swan = None;
        }

        let household = &mut self.household;
        override_person(
            &mut household.person1,
            o.person1_retirement_age,
            o.person1_cpp_start_age,
            o.person1_oas_start_age,
        );
        if let Some(person2) = household.person2.as_mut() {
            override_person(
                person2,
                o.person2_retirement_age,
                o.person2_cpp_start_age,
                o.person2_oas_start_age,
            );
        }
    }

    pub fn account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == *id)
    }
}

fn override_person(
    person: &mut Person,
    retirement_age: Option<u8>,
    cpp_start_age: Option<u8>,
    oas_start_age: Option<u8>,
) {
    if let (Some(age), Some(employment)) = (retirement_age, person.employment.as_mut()) {
        employment.retirement_age = age;
    }
    if let (Some(age), Some(cpp)) = (cpp_start_age, person.cpp.as_mut()) {
        cpp.start_age = age;
    }
    if let (Some(age), Some(oas)) = (oas_start_age, person.oas.as_mut()) {
        oas.start_age = age;
    }
}

fn check_amount(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::NegativeAmount {
            field: field.to_string(),
            value,
        })
    }
}
