mod ids;
mod market;
mod plan;
mod results;
pub mod rrif;

pub use ids::{AccountId, ScenarioId};
pub use market::{
    AssetReturns, BOOTSTRAP_BLOCK_YEARS, HistoricalDataset, ReturnGenerator, ReturnMethod,
    ReturnPath, STUDENT_T_DF,
};
pub use plan::{
    Account, AccountType, AssetAssumption, Assumptions, Allocation, Benefit, BlackSwan,
    Contribution, Employment, EventType, GlidePoint, Household, HouseholdPlan,
    IMPLICIT_BASE_SCENARIO, InflationAssumptions, OneTimeEvent, Owner, Pension, Person, Province,
    RecurringExpense, ReturnAssumptions, Scenario, ScenarioOverrides, Strategy,
    TaxProjectionAssumptions, allocation_at,
};
pub use results::{
    MonteCarloResult, PERCENTILE_KEYS, ProjectionResult, ProjectionWarning, SamplePath,
    WarningKind, YearlyProjection,
};
