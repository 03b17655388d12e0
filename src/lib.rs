//! Bootstrap sequence of the `minimal` blockchain agent.
//!
//! The binary entry point is `src/main.rs`; everything it wires together is
//! exposed here so integration tests can drive the same pieces.

mod core;

pub mod agent;
pub mod bootstrap;
pub mod chain;
pub mod node;
pub mod state;
pub mod telemetry;

pub use self::core::{config, error};

pub use agent::Agent;
