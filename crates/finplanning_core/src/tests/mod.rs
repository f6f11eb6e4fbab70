//! Integration tests for the planning engine
//!
//! Tests are organized by topic:
//! - `tax` - Tax calculator properties across years and incomes
//! - `projection` - Year stepping, warnings and registered-account rules
//! - `scenarios` - End-to-end household scenarios
//! - `monte_carlo` - Simulation reproducibility, bands and control flow
//! - `service` - Loading, limits and the in-flight guard
//! - `export` - Tabular and CSV output

mod export;
mod projection;
mod scenarios;
mod tax;
