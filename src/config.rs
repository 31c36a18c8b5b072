//! Configuration: structs, persistence, and the interactive setup wizard.

pub mod persistence;
pub mod setup;
pub mod types;
