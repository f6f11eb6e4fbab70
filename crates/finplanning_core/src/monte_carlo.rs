//! Monte Carlo simulation over randomized return paths
//!
//! Each trial draws a full return path, runs the projection on it and keeps
//! the net-worth path and depletion age. Trial seeds all come from one master
//! RNG up front, so results do not depend on how trials are scheduled across
//! threads. Trials run in batches; between batches the caller's progress
//! callback is invoked and the cancellation token is checked.

use std::collections::BTreeMap;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::error::{PlanningError, Result, ValidationError};
use crate::model::{
    HouseholdPlan, MonteCarloResult, PERCENTILE_KEYS, ReturnGenerator, ReturnMethod, SamplePath,
};
use crate::projection::{ProjectionEngine, first_depletion_age, validate_year_range};
use crate::step::ProjectionContext;
use crate::util::percentiles::{lower_median, percentile_of_sorted, sort_values};

pub const DEFAULT_ITERATIONS: usize = 1000;
pub const DEFAULT_SEED: u64 = 42;

/// Most trials whose raw paths are kept when sample paths are requested
pub const MAX_SAMPLE_PATHS: usize = 100;

/// Trials per batch between progress reports
const BATCH_SIZE: usize = 50;

/// Progress sink receiving the completed fraction in `[0, 1]`
pub type ProgressCallback<'a> = &'a mut dyn FnMut(f64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    pub n_iterations: usize,
    /// `None` or `Some(0)` draws a fresh seed for every run
    pub seed: Option<u64>,
    pub return_method: ReturnMethod,
    pub keep_sample_paths: bool,
    #[serde(skip)]
    pub cancel: Option<CancellationToken>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            n_iterations: DEFAULT_ITERATIONS,
            seed: Some(DEFAULT_SEED),
            return_method: ReturnMethod::Historical,
            keep_sample_paths: false,
            cancel: None,
        }
    }
}

impl MonteCarloConfig {
    /// Seed to use for this run
    pub fn resolved_seed(&self) -> u64 {
        match self.seed {
            Some(seed) if seed != 0 => seed,
            _ => rand::rng().random_range(1..=u64::MAX),
        }
    }
}

/// Net-worth path and outcome of one trial
#[derive(Debug, Clone)]
struct TrialOutcome {
    net_worth: Vec<f64>,
    depletion_age: Option<u8>,
}

fn run_trial(
    engine: &ProjectionEngine<'_>,
    generator: &ReturnGenerator,
    start_year: i16,
    end_year: i16,
    n_years: usize,
    seed: u64,
) -> Result<TrialOutcome> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let returns = generator.sample_path(&mut rng, start_year, n_years);
    let ctx = ProjectionContext::new(engine.plan(), start_year);
    let years = engine.project(&ctx, end_year, &returns, None)?;
    Ok(TrialOutcome {
        depletion_age: first_depletion_age(&years),
        net_worth: years.iter().map(|y| y.total_net_worth).collect(),
    })
}

#[cfg(feature = "parallel")]
fn run_batch(
    engine: &ProjectionEngine<'_>,
    generator: &ReturnGenerator,
    start_year: i16,
    end_year: i16,
    n_years: usize,
    seeds: &[u64],
) -> Result<Vec<TrialOutcome>> {
    seeds
        .par_iter()
        .map(|&seed| run_trial(engine, generator, start_year, end_year, n_years, seed))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn run_batch(
    engine: &ProjectionEngine<'_>,
    generator: &ReturnGenerator,
    start_year: i16,
    end_year: i16,
    n_years: usize,
    seeds: &[u64],
) -> Result<Vec<TrialOutcome>> {
    seeds
        .iter()
        .map(|&seed| run_trial(engine, generator, start_year, end_year, n_years, seed))
        .collect()
}

/// Run `config.n_iterations` trials of a scenario-resolved plan.
///
/// The plan's black-swan shock is ignored: random paths already carry tail
/// risk. Iteration limits are the caller's concern; only a zero count is
/// rejected here.
pub fn run_monte_carlo(
    plan: &HouseholdPlan,
    start_year: i16,
    end_year: i16,
    config: &MonteCarloConfig,
    mut progress: Option<ProgressCallback<'_>>,
) -> Result<MonteCarloResult> {
    let n_years = validate_year_range(start_year, end_year)?;
    let n = config.n_iterations;
    if n == 0 {
        return Err(ValidationError::ZeroIterations.into());
    }

    let mut plan = plan.clone();
    plan.assumptions.black_swan = None;
    let engine = ProjectionEngine::new(&plan);
    let generator = ReturnGenerator::new(config.return_method, &plan.assumptions.returns)?;

    let seed = config.resolved_seed();
    let mut master = SmallRng::seed_from_u64(seed);
    let trial_seeds: Vec<u64> = (0..n).map(|_| master.random()).collect();

    tracing::info!(
        iterations = n,
        seed,
        method = %config.return_method,
        start_year,
        end_year,
        "Starting Monte Carlo simulation"
    );

    let mut outcomes = Vec::with_capacity(n);
    for batch in trial_seeds.chunks(BATCH_SIZE) {
        if config
            .cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            tracing::info!(completed = outcomes.len(), "Monte Carlo simulation cancelled");
            return Err(PlanningError::Cancelled);
        }
        outcomes.extend(run_batch(
            &engine, &generator, start_year, end_year, n_years, batch,
        )?);
        if let Some(report) = progress.as_deref_mut() {
            report(outcomes.len() as f64 / n as f64);
        }
    }

    let result = aggregate(&plan, start_year, end_year, config, seed, &outcomes);
    tracing::info!(
        depletion_probability = result.depletion_probability,
        "Monte Carlo simulation complete"
    );
    Ok(result)
}

fn aggregate(
    plan: &HouseholdPlan,
    start_year: i16,
    end_year: i16,
    config: &MonteCarloConfig,
    seed: u64,
    outcomes: &[TrialOutcome],
) -> MonteCarloResult {
    let projection_years: Vec<i16> = (start_year..=end_year).collect();
    let person1_ages = projection_years
        .iter()
        .map(|&y| plan.household.person1.age_in(y))
        .collect();

    let mut bands: BTreeMap<u8, Vec<f64>> = PERCENTILE_KEYS
        .iter()
        .map(|&p| (p, Vec::with_capacity(projection_years.len())))
        .collect();
    let mut column = Vec::with_capacity(outcomes.len());
    for year_index in 0..projection_years.len() {
        column.clear();
        column.extend(outcomes.iter().map(|o| o.net_worth[year_index]));
        sort_values(&mut column);
        for (&p, band) in bands.iter_mut() {
            band.push(percentile_of_sorted(&column, f64::from(p)));
        }
    }

    let percentiles = bands
        .iter()
        .map(|(&p, band)| (p, band.last().copied().unwrap_or(0.0)))
        .collect();

    let depletion_ages: Vec<u8> = outcomes.iter().filter_map(|o| o.depletion_age).collect();
    let depletion_count = depletion_ages.len();

    let sample_paths = if config.keep_sample_paths {
        outcomes
            .iter()
            .take(MAX_SAMPLE_PATHS)
            .enumerate()
            .map(|(trial, o)| SamplePath {
                trial,
                net_worth: o.net_worth.clone(),
                depletion_age: o.depletion_age,
            })
            .collect()
    } else {
        Vec::new()
    };

    MonteCarloResult {
        n_iterations: outcomes.len(),
        seed,
        return_method: config.return_method,
        depletion_probability: depletion_count as f64 / outcomes.len().max(1) as f64,
        depletion_count,
        median_depletion_age: lower_median(&depletion_ages),
        projection_years,
        person1_ages,
        net_worth_percentiles_by_year: bands,
        percentiles,
        sample_paths,
    }
}
