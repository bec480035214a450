//! perfmeter core: snapshot data model and the shared error surface.
//!
//! This crate defines the read-only types handed to reporting code and hooks,
//! plus the error enum shared by the engine. It carries no locking or runtime
//! machinery so reporting surfaces can depend on it alone.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Instrumentation must never bring down the watched code path.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod model;

/// Shared result type.
pub use error::{BoxError, ErrorCode, PerfMeterError, Result};
pub use model::{
    CustomValue, MethodCallInfo, MethodCallsCount, MethodDescriptor, PerformanceInfo,
    TIMER_FREQUENCY, UNKNOWN_CALLER, UNKNOWN_METHOD,
};
