//! Household retirement planning engine
//!
//! Projects a household's finances year by year under Canadian tax rules:
//! - Registered (RRSP/RRIF, LIRA/LIF, TFSA) and non-registered accounts
//! - Employment, pension, CPP and OAS income with start-age adjustments
//! - Federal and Ontario income tax with bracket indexation and capital gains
//! - RRIF/LIF minimum withdrawals and automatic conversion at 71
//! - A sustainable-spending search by bisection
//! - Monte Carlo simulation over historical or Student-t return paths
//!
//! # Usage
//!
//! ```ignore
//! use finplanning_core::PlanningService;
//!
//! let service = PlanningService::from_yaml("plan.yaml")?;
//! let scenario = service.base_scenario();
//! let (start, end) = service.default_year_range();
//! let projection = service.run_projection(&scenario, start, end)?;
//! println!("final net worth: {:.0}", projection.final_net_worth);
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod cancel;
pub mod error;
pub mod export;
pub mod monte_carlo;
pub mod optimization;
pub mod projection;
pub mod projection_state;
pub mod service;
pub mod step;
pub mod taxes;
pub mod util;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod config;
pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use cancel::CancellationToken;
pub use config::PlanBuilder;
pub use error::{PlanningError, Result};
pub use model::{HouseholdPlan, MonteCarloResult, ProjectionResult, ScenarioId};
pub use monte_carlo::MonteCarloConfig;
pub use service::{PlanningService, ServiceLimits};
pub use taxes::{TaxCalculator, TaxResult};
