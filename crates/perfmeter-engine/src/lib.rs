//! perfmeter engine: registry, watching sessions and the hook pipeline.
//!
//! Typical use wraps a method body in a session and lets scope exit stop it:
//!
//! ```
//! use perfmeter_engine::Registry;
//!
//! let registry = Registry::new();
//! {
//!     let _watch = registry
//!         .begin_watch("ValuesController", "get")
//!         .with_caller("docs")
//!         .start();
//!     // watched work
//! }
//! let info = registry.performance_info("ValuesController");
//! assert_eq!(info.total_calls("get"), 1);
//! assert_eq!(info.current_calls("get"), 0);
//! ```
//!
//! The free functions below operate on [`Registry::global`].

pub mod config;
pub mod pipeline;
pub mod registry;
pub mod session;

use perfmeter_core::model::{CustomValue, MethodDescriptor, PerformanceInfo};

pub use pipeline::{ExceptionHandler, Hook, HookResult, PerformanceCommand, LAST_EXCEPTION_KEY};
pub use registry::{Component, MonitoredComponent, Registry};
pub use session::{Session, SessionBuilder, SessionState, CALLER_DATA_KEY};

pub fn begin_watch(component: &str, method: &str) -> SessionBuilder {
    Registry::global().begin_watch(component, method)
}

pub fn begin_watch_method(component: &str, method: MethodDescriptor) -> SessionBuilder {
    Registry::global().begin_watch_method(component, method)
}

pub fn watching<C: MonitoredComponent>(method: &str) -> SessionBuilder {
    Registry::global().watching::<C>(method)
}

pub fn get_performance_info(component: &str) -> PerformanceInfo {
    Registry::global().performance_info(component)
}

pub fn set_cache_time(component: &str, minutes: u32) {
    Registry::global().set_cache_time(component, minutes);
}

pub fn add_custom_data(component: &str, key: impl Into<String>, value: impl Into<CustomValue>) {
    Registry::global().add_custom_data(component, key, value);
}

pub fn set_default_exception_handler(component: &str, handler: ExceptionHandler) {
    Registry::global().set_default_exception_handler(component, handler);
}
