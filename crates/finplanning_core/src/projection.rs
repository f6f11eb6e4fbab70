//! Multi-year projection engine
//!
//! The engine runs [`advance_year`] across an inclusive year range on a
//! scenario-resolved plan, then summarises the run: final net worth,
//! depletion age, warnings, and optionally the sustainable spending level.

use std::collections::HashSet;

use crate::cancel::CancellationToken;
use crate::error::{PlanningError, Result, ValidationError};
use crate::model::{
    HouseholdPlan, ProjectionResult, ProjectionWarning, ReturnPath, WarningKind, YearlyProjection,
};
use crate::optimization::sustainable_spending;
use crate::projection_state::HouseholdState;
use crate::step::{ProjectionContext, advance_year};

/// Earliest year a projection may cover
pub const MIN_YEAR: i16 = 1900;
/// Latest year a projection may cover
pub const MAX_YEAR: i16 = 2200;
/// Longest horizon accepted in one run
pub const MAX_HORIZON_YEARS: usize = 150;

/// Shortfall below this is rounding, not a funding problem
const SHORTFALL_TOLERANCE: f64 = 0.01;

/// Check `start..=end` and return the number of years it spans.
pub fn validate_year_range(
    start_year: i16,
    end_year: i16,
) -> std::result::Result<usize, ValidationError> {
    for year in [start_year, end_year] {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(ValidationError::YearOutOfRange {
                year,
                min: MIN_YEAR,
                max: MAX_YEAR,
            });
        }
    }
    if start_year > end_year {
        return Err(ValidationError::InvalidYearRange {
            start: start_year,
            end: end_year,
        });
    }
    let years = usize::try_from(end_year - start_year).unwrap_or(0) + 1;
    if years > MAX_HORIZON_YEARS {
        return Err(ValidationError::HorizonTooLong {
            years,
            limit: MAX_HORIZON_YEARS,
        });
    }
    Ok(years)
}

#[derive(Debug, Clone, Default)]
pub struct ProjectionOptions {
    /// Also search for the highest sustainable constant spending
    pub solve_sustainable_spending: bool,
    pub cancel: Option<CancellationToken>,
}

impl ProjectionOptions {
    /// Options for a full, interactive projection
    pub fn full() -> Self {
        Self {
            solve_sustainable_spending: true,
            cancel: None,
        }
    }
}

/// How a single spending level fares over the horizon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpendingOutcome {
    pub depletion_age: Option<u8>,
    pub total_shortfall: f64,
}

impl SpendingOutcome {
    pub fn is_sustainable(&self) -> bool {
        self.depletion_age.is_none() && self.total_shortfall <= SHORTFALL_TOLERANCE
    }
}

/// Runs projections against one scenario-resolved plan
#[derive(Debug, Clone, Copy)]
pub struct ProjectionEngine<'a> {
    plan: &'a HouseholdPlan,
}

impl<'a> ProjectionEngine<'a> {
    /// `plan` should already have its scenario overrides applied.
    pub fn new(plan: &'a HouseholdPlan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &'a HouseholdPlan {
        self.plan
    }

    /// Project with the plan's mean returns (and black swan, if any).
    pub fn run(
        &self,
        start_year: i16,
        end_year: i16,
        options: &ProjectionOptions,
    ) -> Result<ProjectionResult> {
        validate_year_range(start_year, end_year)?;
        let returns = ReturnPath::deterministic(&self.plan.assumptions, start_year, end_year);
        self.run_with_returns(start_year, end_year, &returns, options)
    }

    /// Project with explicit per-year returns.
    pub fn run_with_returns(
        &self,
        start_year: i16,
        end_year: i16,
        returns: &ReturnPath,
        options: &ProjectionOptions,
    ) -> Result<ProjectionResult> {
        validate_year_range(start_year, end_year)?;
        let ctx = ProjectionContext::new(self.plan, start_year);
        let years = self.project(&ctx, end_year, returns, options.cancel.as_ref())?;

        let mut warnings = self.horizon_warnings(start_year, end_year);
        if let Some(first) = years.iter().find(|y| y.shortfall > SHORTFALL_TOLERANCE) {
            warnings.push(ProjectionWarning {
                kind: WarningKind::FundingShortfall,
                message: format!(
                    "expenses could not be fully funded starting in {} (short {:.2})",
                    first.year, first.shortfall
                ),
                year: Some(first.year),
            });
        }
        if !warnings.is_empty() {
            tracing::warn!(count = warnings.len(), "Projection produced warnings");
        }

        let sustainable_spending = if options.solve_sustainable_spending {
            Some(sustainable_spending(
                self,
                start_year,
                end_year,
                returns,
                options.cancel.as_ref(),
            )?)
        } else {
            None
        };

        let final_net_worth = years.last().map_or(0.0, |y| y.total_net_worth);
        let depletion_age = first_depletion_age(&years);
        tracing::debug!(
            start_year,
            end_year,
            final_net_worth,
            depletion_age = ?depletion_age,
            "Projection complete"
        );

        Ok(ProjectionResult {
            years,
            final_net_worth,
            depletion_age,
            desired_spending: self.plan.strategy.annual_spending,
            sustainable_spending,
            warnings,
        })
    }

    /// Run the horizon at a given constant spending level.
    pub fn evaluate_spending(
        &self,
        start_year: i16,
        end_year: i16,
        returns: &ReturnPath,
        annual_spending: f64,
        cancel: Option<&CancellationToken>,
    ) -> Result<SpendingOutcome> {
        let ctx = ProjectionContext::new(self.plan, start_year).with_spending(annual_spending);
        let years = self.project(&ctx, end_year, returns, cancel)?;
        Ok(SpendingOutcome {
            depletion_age: first_depletion_age(&years),
            total_shortfall: years.iter().map(|y| y.shortfall).sum(),
        })
    }

    /// Year-by-year snapshots from the context's start year through `end_year`
    pub(crate) fn project(
        &self,
        ctx: &ProjectionContext<'_>,
        end_year: i16,
        returns: &ReturnPath,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<YearlyProjection>> {
        if !returns.covers(ctx.start_year, end_year) {
            return Err(ValidationError::ReturnPathMismatch {
                start: ctx.start_year,
                end: end_year,
            }
            .into());
        }

        let mut state = HouseholdState::from_plan(self.plan, ctx.start_year);
        let mut years = Vec::with_capacity(returns.len());
        for year in ctx.start_year..=end_year {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(PlanningError::Cancelled);
            }
            let year_returns = returns
                .get(year)
                .ok_or(ValidationError::ReturnPathMismatch {
                    start: ctx.start_year,
                    end: end_year,
                })?;
            years.push(advance_year(ctx, &mut state, year_returns)?);
        }
        Ok(years)
    }

    fn horizon_warnings(&self, start_year: i16, end_year: i16) -> Vec<ProjectionWarning> {
        let plan = self.plan;
        let horizon = start_year..=end_year;
        let mut warnings = Vec::new();

        for event in &plan.one_time_events {
            if !horizon.contains(&event.year) {
                warnings.push(ProjectionWarning {
                    kind: WarningKind::EventOutsideHorizon,
                    message: format!(
                        "one-time event {:?} in {} is outside {start_year}-{end_year}",
                        event.name, event.year
                    ),
                    year: Some(event.year),
                });
            }
        }

        for expense in &plan.recurring_expenses {
            if !horizon.clone().any(|y| expense.is_due(y)) {
                warnings.push(ProjectionWarning {
                    kind: WarningKind::RecurringExpenseOutsideHorizon,
                    message: format!(
                        "recurring expense {:?} never falls due in {start_year}-{end_year}",
                        expense.name
                    ),
                    year: None,
                });
            }
        }

        let order = &plan.strategy.withdrawal_order;
        let mut reported = HashSet::new();
        for account in &plan.accounts {
            let account_type = account.account_type;
            let drawable = account_type.is_locked()
                || order.iter().any(|rule| account_type.matches_rule(*rule));
            if !drawable && reported.insert(account_type) {
                warnings.push(ProjectionWarning {
                    kind: WarningKind::NoWithdrawalRule,
                    message: format!(
                        "no withdrawal rule covers {account_type} accounts; they are never drawn on"
                    ),
                    year: None,
                });
            }
        }

        warnings
    }
}

/// person1's age in the first year net worth is zero or below
pub fn first_depletion_age(years: &[YearlyProjection]) -> Option<u8> {
    years.iter().find(|y| y.depleted).map(|y| y.person1_age)
}
