pub mod percentiles;
