//! Bootstrap layer: steps that run before the node runtime starts.
//!
//! - **chain**: chain reference resolution (file path or well-known name).
//! - **datadir**: idempotent data directory layout.
//! - **identity**: ed25519 node key generation and persistence.
//! - **logger**: tracing-subscriber initialisation.

pub mod chain;
pub mod datadir;
pub mod identity;
pub mod logger;
