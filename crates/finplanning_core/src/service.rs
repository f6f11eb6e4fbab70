//! Planning service facade
//!
//! [`PlanningService`] owns one validated plan and exposes projection and
//! Monte Carlo runs by scenario id. It holds no locks on the plan; each run
//! works on its own scenario-resolved copy. At most one Monte Carlo run may
//! be in flight per service, and overlapping callers get a busy error
//! instead of waiting.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{ConcurrencyError, Result, ValidationError};
use crate::model::{HouseholdPlan, MonteCarloResult, ProjectionResult, ScenarioId};
use crate::monte_carlo::{self, MonteCarloConfig, ProgressCallback};
use crate::projection::{MAX_HORIZON_YEARS, ProjectionEngine, ProjectionOptions};

/// Hard limits applied to requests against a service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceLimits {
    pub max_iterations: usize,
    pub max_plan_bytes: u64,
}

pub const MAX_MC_ITERATIONS: usize = 2000;
pub const MAX_PLAN_BYTES: u64 = 100 * 1024;

impl Default for ServiceLimits {
    fn default() -> Self {
        Self {
            max_iterations: MAX_MC_ITERATIONS,
            max_plan_bytes: MAX_PLAN_BYTES,
        }
    }
}

/// Clears the in-flight flag when a run ends, including on error
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct PlanningService {
    plan: HouseholdPlan,
    limits: ServiceLimits,
    monte_carlo_running: AtomicBool,
}

impl PlanningService {
    pub fn new(plan: HouseholdPlan) -> Result<Self> {
        plan.validate()?;
        Ok(Self {
            plan,
            limits: ServiceLimits::default(),
            monte_carlo_running: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ServiceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Load a plan file with the default limits.
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_yaml_with_limits(path, ServiceLimits::default())
    }

    pub fn from_yaml_with_limits(path: impl AsRef<Path>, limits: ServiceLimits) -> Result<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)
            .map_err(|e| ValidationError::Io(format!("{}: {e}", path.display())))?
            .len();
        check_size(size, limits.max_plan_bytes)?;
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ValidationError::Io(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), bytes = size, "Loading plan");
        Self::from_yaml_str_with_limits(&yaml, limits)
    }

    /// Parse a plan from YAML text with the default limits.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::from_yaml_str_with_limits(yaml, ServiceLimits::default())
    }

    pub fn from_yaml_str_with_limits(yaml: &str, limits: ServiceLimits) -> Result<Self> {
        check_size(yaml.len() as u64, limits.max_plan_bytes)?;
        let plan = HouseholdPlan::from_yaml_str(yaml)?;
        Ok(Self::new(plan)?.with_limits(limits))
    }

    pub fn plan(&self) -> &HouseholdPlan {
        &self.plan
    }

    pub fn limits(&self) -> ServiceLimits {
        self.limits
    }

    pub fn base_scenario(&self) -> ScenarioId {
        self.plan.base_scenario()
    }

    pub fn scenario_ids(&self) -> Vec<ScenarioId> {
        self.plan.scenario_ids()
    }

    /// From the current calendar year to the year the youngest person
    /// reaches the household's longest life expectancy.
    pub fn default_year_range(&self) -> (i16, i16) {
        self.default_year_range_from(jiff::Zoned::now().year())
    }

    pub fn default_year_range_from(&self, current_year: i16) -> (i16, i16) {
        let household = &self.plan.household;
        let youngest_birth_year = household
            .persons()
            .map(|p| p.birth_date.year())
            .max()
            .unwrap_or(current_year);
        let longest_life = household
            .persons()
            .map(|p| p.life_expectancy_age)
            .max()
            .unwrap_or(0);
        let horizon_cap = current_year + (MAX_HORIZON_YEARS as i16 - 1);
        let end = (youngest_birth_year + i16::from(longest_life)).clamp(current_year, horizon_cap);
        (current_year, end)
    }

    /// Deterministic projection of a scenario, including the sustainable
    /// spending search.
    pub fn run_projection(
        &self,
        scenario_id: &ScenarioId,
        start_year: i16,
        end_year: i16,
    ) -> Result<ProjectionResult> {
        self.run_projection_with(scenario_id, start_year, end_year, &ProjectionOptions::full())
    }

    pub fn run_projection_with(
        &self,
        scenario_id: &ScenarioId,
        start_year: i16,
        end_year: i16,
        options: &ProjectionOptions,
    ) -> Result<ProjectionResult> {
        let plan = self.plan.resolve_scenario(scenario_id)?;
        tracing::debug!(scenario = %scenario_id, start_year, end_year, "Running projection");
        ProjectionEngine::new(&plan).run(start_year, end_year, options)
    }

    /// Monte Carlo simulation of a scenario.
    ///
    /// Rejects iteration counts above the service limit, and rejects the
    /// call outright while another simulation on this service is running.
    pub fn run_monte_carlo(
        &self,
        scenario_id: &ScenarioId,
        start_year: i16,
        end_year: i16,
        config: &MonteCarloConfig,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<MonteCarloResult> {
        if config.n_iterations == 0 {
            return Err(ValidationError::ZeroIterations.into());
        }
        if config.n_iterations > self.limits.max_iterations {
            return Err(ValidationError::TooManyIterations {
                requested: config.n_iterations,
                limit: self.limits.max_iterations,
            }
            .into());
        }
        let plan = self.plan.resolve_scenario(scenario_id)?;

        let _guard = self.acquire_monte_carlo()?;
        monte_carlo::run_monte_carlo(&plan, start_year, end_year, config, progress)
    }

    /// Whether a Monte Carlo run is currently in flight
    pub fn is_busy(&self) -> bool {
        self.monte_carlo_running.load(Ordering::Acquire)
    }

    fn acquire_monte_carlo(&self) -> Result<RunGuard<'_>> {
        if self
            .monte_carlo_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Rejected Monte Carlo request: a simulation is already running");
            return Err(ConcurrencyError::Busy.into());
        }
        Ok(RunGuard(&self.monte_carlo_running))
    }
}

fn check_size(size: u64, limit: u64) -> std::result::Result<(), ValidationError> {
    if size > limit {
        return Err(ValidationError::PlanTooLarge { size, limit });
    }
    Ok(())
}
