//! Roofline runner library

mod benchmark;
mod builder;
mod config;
mod engine;
mod executor;
mod local_logger;
mod prelude;

pub mod cli;
pub mod logger;

pub use local_logger::clean_logger;
