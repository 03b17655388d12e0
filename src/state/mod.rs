//! State-transition subsystem hooks. Only the instrumentation lives here.

pub mod metrics;

pub use self::metrics::{MAX_TX_EXEC_PERIOD, StateMetrics};
