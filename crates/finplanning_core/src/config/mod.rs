//! Programmatic plan construction

mod builder;

pub use builder::PlanBuilder;
