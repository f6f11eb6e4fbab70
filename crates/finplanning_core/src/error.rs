use crate::model::{AccountId, ScenarioId};

/// Errors raised while loading or checking a plan and its run parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("malformed plan: {0}")]
    MalformedPlan(String),
    #[error("could not read plan: {0}")]
    Io(String),
    #[error("plan is {size} bytes, limit is {limit}")]
    PlanTooLarge { size: u64, limit: u64 },
    #[error("duplicate account id {0}")]
    DuplicateAccount(AccountId),
    #[error("{context} references unknown account {id}")]
    UnknownAccount { context: String, id: AccountId },
    #[error("{field} must be a non-negative finite amount, got {value}")]
    NegativeAmount { field: String, value: f64 },
    #[error("recurring expense {0:?} has a period of zero years")]
    ZeroPeriod(String),
    #[error("unknown scenario {0}")]
    UnknownScenario(ScenarioId),
    #[error("start year {start} is after end year {end}")]
    InvalidYearRange { start: i16, end: i16 },
    #[error("year {year} is outside the supported range {min}..={max}")]
    YearOutOfRange { year: i16, min: i16, max: i16 },
    #[error("horizon of {years} years exceeds the limit of {limit}")]
    HorizonTooLong { years: usize, limit: usize },
    #[error("return path does not cover {start}..={end}")]
    ReturnPathMismatch { start: i16, end: i16 },
    #[error("iteration count must be at least 1")]
    ZeroIterations,
    #[error("{requested} iterations requested, limit is {limit}")]
    TooManyIterations { requested: usize, limit: usize },
}

/// Invalid inputs to the tax calculator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaxError {
    #[error("taxable income {0} is negative")]
    NegativeIncome(f64),
    #[error("taxable income is not a finite number")]
    NonFiniteIncome,
    #[error("no tax schedule for province {0}")]
    UnsupportedProvince(String),
    #[error("unrecognised province code {0:?}")]
    InvalidProvince(String),
}

/// Failures while computing a projection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComputationError {
    #[error(transparent)]
    Tax(#[from] TaxError),
    #[error("invalid return distribution: {0}")]
    InvalidDistribution(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConcurrencyError {
    #[error("a Monte Carlo simulation is already running for this plan")]
    Busy,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanningError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("computation error: {0}")]
    Computation(#[from] ComputationError),
    #[error("concurrency error: {0}")]
    Concurrency(#[from] ConcurrencyError),
    #[error("run cancelled")]
    Cancelled,
}

impl From<TaxError> for PlanningError {
    fn from(err: TaxError) -> Self {
        PlanningError::Computation(ComputationError::Tax(err))
    }
}

impl PlanningError {
    pub fn is_validation(&self) -> bool {
        matches!(self, PlanningError::Validation(_))
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, PlanningError::Concurrency(ConcurrencyError::Busy))
    }
}

pub type Result<T> = std::result::Result<T, PlanningError>;

/// Failures while writing exported results
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        found: usize,
        expected: usize,
    },
}
