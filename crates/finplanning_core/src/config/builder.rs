//! Plan builder
//!
//! A fluent alternative to YAML for assembling a [`HouseholdPlan`] in code,
//! used by tests and benchmarks.
//!
//! ```ignore
//! use finplanning_core::config::PlanBuilder;
//! use finplanning_core::model::{AccountType, Owner};
//!
//! let plan = PlanBuilder::new()
//!     .person1("Alex", 1960, 1, 15)
//!     .employment(Owner::Person1, 90_000.0, 65)
//!     .cpp(Owner::Person1, 15_000.0, 65)
//!     .account("rrsp", AccountType::Rrsp, 400_000.0)
//!     .account("tfsa", AccountType::Tfsa, 95_000.0)
//!     .spending(60_000.0)
//!     .build()?;
//! ```

use crate::error::ValidationError;
use crate::model::{
    Account, AccountId, AccountType, AssetAssumption, Benefit, BlackSwan, Contribution,
    Employment, EventType, GlidePoint, Household, HouseholdPlan, OneTimeEvent, Owner, Pension,
    Person, Province, RecurringExpense, ReturnAssumptions, Scenario, ScenarioId,
    ScenarioOverrides, Strategy,
};

/// Builder for [`HouseholdPlan`]
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    plan: HouseholdPlan,
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn person(name: &str, year: i16, month: i8, day: i8) -> Person {
    Person {
        name: name.to_string(),
        birth_date: jiff::civil::date(year, month, day),
        life_expectancy_age: 95,
        employment: None,
        pension: None,
        cpp: None,
        oas: None,
        other_income: 0.0,
    }
}

impl PlanBuilder {
    /// A single-person Ontario household with no accounts or flows
    #[must_use]
    pub fn new() -> Self {
        Self {
            plan: HouseholdPlan {
                household: Household {
                    name: String::new(),
                    province: Province::Ontario,
                    person1: person("Person 1", 1960, 1, 1),
                    person2: None,
                },
                accounts: Vec::new(),
                contributions: Vec::new(),
                one_time_events: Vec::new(),
                recurring_expenses: Vec::new(),
                strategy: Strategy::default(),
                assumptions: Default::default(),
                scenarios: Vec::new(),
                base_scenario_id: None,
            },
        }
    }

    // =========================================================================
    // Household
    // =========================================================================

    #[must_use]
    pub fn household_name(mut self, name: &str) -> Self {
        self.plan.household.name = name.to_string();
        self
    }

    #[must_use]
    pub fn province(mut self, province: Province) -> Self {
        self.plan.household.province = province;
        self
    }

    #[must_use]
    pub fn person1(mut self, name: &str, year: i16, month: i8, day: i8) -> Self {
        self.plan.household.person1 = person(name, year, month, day);
        self
    }

    #[must_use]
    pub fn person2(mut self, name: &str, year: i16, month: i8, day: i8) -> Self {
        self.plan.household.person2 = Some(person(name, year, month, day));
        self
    }

    #[must_use]
    pub fn life_expectancy(mut self, owner: Owner, age: u8) -> Self {
        if let Some(p) = self.person_mut(owner) {
            p.life_expectancy_age = age;
        }
        self
    }

    /// Salary in today's dollars, growing with inflation until retirement
    #[must_use]
    pub fn employment(mut self, owner: Owner, annual_income: f64, retirement_age: u8) -> Self {
        if let Some(p) = self.person_mut(owner) {
            p.employment = Some(Employment {
                annual_income,
                retirement_age,
                growth_rate: None,
            });
        }
        self
    }

    #[must_use]
    pub fn pension(
        mut self,
        owner: Owner,
        annual_amount: f64,
        start_age: u8,
        indexed: bool,
    ) -> Self {
        if let Some(p) = self.person_mut(owner) {
            p.pension = Some(Pension {
                annual_amount,
                start_age,
                indexed,
            });
        }
        self
    }

    #[must_use]
    pub fn cpp(mut self, owner: Owner, annual_amount_at_65: f64, start_age: u8) -> Self {
        if let Some(p) = self.person_mut(owner) {
            p.cpp = Some(Benefit {
                annual_amount_at_65,
                start_age,
            });
        }
        self
    }

    #[must_use]
    pub fn oas(mut self, owner: Owner, annual_amount_at_65: f64, start_age: u8) -> Self {
        if let Some(p) = self.person_mut(owner) {
            p.oas = Some(Benefit {
                annual_amount_at_65,
                start_age,
            });
        }
        self
    }

    fn person_mut(&mut self, owner: Owner) -> Option<&mut Person> {
        match owner {
            Owner::Person1 => Some(&mut self.plan.household.person1),
            Owner::Person2 => self.plan.household.person2.as_mut(),
        }
    }

    // =========================================================================
    // Accounts and flows
    // =========================================================================

    /// Account owned by person1 with cost base equal to its balance
    #[must_use]
    pub fn account(self, id: &str, account_type: AccountType, balance: f64) -> Self {
        self.account_for(Owner::Person1, id, account_type, balance)
    }

    #[must_use]
    pub fn account_for(
        mut self,
        owner: Owner,
        id: &str,
        account_type: AccountType,
        balance: f64,
    ) -> Self {
        self.plan.accounts.push(Account {
            id: AccountId::new(id),
            account_type,
            owner,
            balance,
            cost_basis: None,
        });
        self
    }

    /// Non-registered account with an explicit cost base
    #[must_use]
    pub fn non_registered(mut self, id: &str, balance: f64, cost_basis: f64) -> Self {
        self.plan.accounts.push(Account {
            id: AccountId::new(id),
            account_type: AccountType::NonRegistered,
            owner: Owner::Person1,
            balance,
            cost_basis: Some(cost_basis),
        });
        self
    }

    #[must_use]
    pub fn contribution(
        mut self,
        account_id: &str,
        annual_amount: f64,
        start_year: Option<i16>,
        end_year: Option<i16>,
    ) -> Self {
        self.plan.contributions.push(Contribution {
            account_id: AccountId::new(account_id),
            annual_amount,
            start_year,
            end_year,
            indexed: false,
        });
        self
    }

    #[must_use]
    pub fn one_time_income(mut self, name: &str, year: i16, amount: f64, taxable: bool) -> Self {
        self.plan.one_time_events.push(OneTimeEvent {
            name: name.to_string(),
            year,
            event_type: EventType::Income,
            amount,
            taxable,
        });
        self
    }

    #[must_use]
    pub fn one_time_expense(mut self, name: &str, year: i16, amount: f64) -> Self {
        self.plan.one_time_events.push(OneTimeEvent {
            name: name.to_string(),
            year,
            event_type: EventType::Expense,
            amount,
            taxable: false,
        });
        self
    }

    #[must_use]
    pub fn recurring_expense(
        mut self,
        name: &str,
        start_year: i16,
        end_year: Option<i16>,
        period_years: u16,
        amount: f64,
    ) -> Self {
        self.plan.recurring_expenses.push(RecurringExpense {
            name: name.to_string(),
            start_year,
            end_year,
            period_years,
            amount,
        });
        self
    }

    // =========================================================================
    // Strategy and assumptions
    // =========================================================================

    #[must_use]
    pub fn spending(mut self, annual_spending: f64) -> Self {
        self.plan.strategy.annual_spending = annual_spending;
        self
    }

    #[must_use]
    pub fn withdrawal_order(mut self, order: Vec<AccountType>) -> Self {
        self.plan.strategy.withdrawal_order = order;
        self
    }

    #[must_use]
    pub fn surplus_account(mut self, id: &str) -> Self {
        self.plan.strategy.surplus_account = Some(AccountId::new(id));
        self
    }

    #[must_use]
    pub fn inflation(mut self, rate: f64) -> Self {
        self.plan.assumptions.inflation.general = rate;
        self
    }

    #[must_use]
    pub fn bracket_indexation(mut self, rate: f64) -> Self {
        self.plan.assumptions.tax_projection.indexation_rate = rate;
        self
    }

    /// Mean returns, keeping the default volatilities
    #[must_use]
    pub fn returns(mut self, equity: f64, fixed_income: f64, cash: f64) -> Self {
        let r = &mut self.plan.assumptions.returns;
        r.equity.mean = equity;
        r.fixed_income.mean = fixed_income;
        r.cash.mean = cash;
        self
    }

    #[must_use]
    pub fn return_assumptions(mut self, returns: ReturnAssumptions) -> Self {
        self.plan.assumptions.returns = returns;
        self
    }

    /// No growth, no volatility and no distributions
    #[must_use]
    pub fn zero_returns(mut self) -> Self {
        let flat = AssetAssumption {
            mean: 0.0,
            std_dev: 0.0,
        };
        self.plan.assumptions.returns = ReturnAssumptions {
            equity: flat,
            fixed_income: flat,
            cash: flat,
        };
        self.plan.assumptions.dividend_yield = 0.0;
        self
    }

    #[must_use]
    pub fn dividend_yield(mut self, rate: f64) -> Self {
        self.plan.assumptions.dividend_yield = rate;
        self
    }

    #[must_use]
    pub fn glide_path(mut self, points: Vec<GlidePoint>) -> Self {
        self.plan.assumptions.glide_path = points;
        self
    }

    #[must_use]
    pub fn black_swan(mut self, trigger_year: i16, equity_return: f64) -> Self {
        self.plan.assumptions.black_swan = Some(BlackSwan {
            trigger_year,
            equity_return,
        });
        self
    }

    // =========================================================================
    // Scenarios
    // =========================================================================

    #[must_use]
    pub fn scenario(mut self, id: &str, overrides: ScenarioOverrides) -> Self {
        self.plan.scenarios.push(Scenario {
            id: ScenarioId::new(id),
            name: id.to_string(),
            overrides,
        });
        self
    }

    #[must_use]
    pub fn base_scenario(mut self, id: &str) -> Self {
        self.plan.base_scenario_id = Some(ScenarioId::new(id));
        self
    }

    /// Validate and return the plan
    pub fn build(self) -> Result<HouseholdPlan, ValidationError> {
        self.plan.validate()?;
        Ok(self.plan)
    }
}
