pub mod command;
pub mod privilege;
pub mod run_captured;
