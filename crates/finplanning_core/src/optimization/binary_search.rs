//! Binary search for the sustainable spending level
//!
//! The upper bound starts at the plan's desired spending and doubles until
//! the plan depletes. The bracket is then halved until it is narrower than
//! [`SPENDING_TOLERANCE`].

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::model::ReturnPath;
use crate::projection::ProjectionEngine;

/// Width of the final bracket, in today's dollars
pub const SPENDING_TOLERANCE: f64 = 1.0;

/// Cap on bisection steps
pub const MAX_BISECTION_STEPS: usize = 60;

/// Cap on doublings while looking for a depleting upper bound
pub const MAX_BRACKET_DOUBLINGS: usize = 40;

/// Highest constant annual spending (today's dollars) that neither depletes
/// the plan nor leaves a funding shortfall over `start_year..=end_year`.
///
/// Returns 0 when even zero spending is not sustainable.
pub fn sustainable_spending(
    engine: &ProjectionEngine<'_>,
    start_year: i16,
    end_year: i16,
    returns: &ReturnPath,
    cancel: Option<&CancellationToken>,
) -> Result<f64> {
    let sustainable = |spending: f64| -> Result<bool> {
        Ok(engine
            .evaluate_spending(start_year, end_year, returns, spending, cancel)?
            .is_sustainable())
    };

    if !sustainable(0.0)? {
        tracing::debug!("Plan is not sustainable even with zero spending");
        return Ok(0.0);
    }

    let mut low = 0.0;
    let mut high = engine.plan().strategy.annual_spending.max(1.0);
    let mut doublings = 0;
    while sustainable(high)? {
        low = high;
        doublings += 1;
        if doublings >= MAX_BRACKET_DOUBLINGS {
            // Nothing depletes this plan within any realistic spending level
            tracing::debug!(spending = high, "No depleting upper bound found");
            return Ok(high);
        }
        high *= 2.0;
    }

    let mut steps = 0;
    while high - low > SPENDING_TOLERANCE && steps < MAX_BISECTION_STEPS {
        steps += 1;
        let mid = f64::midpoint(low, high);
        if sustainable(mid)? {
            low = mid;
        } else {
            high = mid;
        }
    }

    tracing::debug!(
        spending = low,
        doublings,
        steps,
        "Sustainable spending search finished"
    );
    Ok(low)
}
