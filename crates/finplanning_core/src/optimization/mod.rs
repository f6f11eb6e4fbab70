//! Spending optimization
//!
//! Projection results report the highest constant spending level the plan can
//! sustain. Depletion is monotonic in spending, so a bracketing binary search
//! is enough.

mod binary_search;

pub use binary_search::{
    MAX_BISECTION_STEPS, MAX_BRACKET_DOUBLINGS, SPENDING_TOLERANCE, sustainable_spending,
};
