//! Top-level facade crate for perfmeter.
//!
//! Re-exports the data model and the engine so users can depend on a single crate.

pub mod core {
    pub use perfmeter_core::*;
}

pub mod engine {
    pub use perfmeter_engine::*;
}

pub use perfmeter_core::{MethodCallInfo, MethodCallsCount, PerfMeterError, PerformanceInfo};
pub use perfmeter_engine::{
    add_custom_data, begin_watch, begin_watch_method, get_performance_info, set_cache_time,
    set_default_exception_handler, watching, ExceptionHandler, Hook, MonitoredComponent,
    PerformanceCommand, Registry, Session, SessionBuilder,
};
