pub mod configuration;
pub mod results;
pub mod units;
