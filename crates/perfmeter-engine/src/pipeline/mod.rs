//! Post-completion pipeline: hooks run after a session commits, and the
//! exception handler that receives whatever fails along the way.

pub mod handler;
pub mod hooks;

pub use handler::{ExceptionHandler, LAST_EXCEPTION_KEY};
pub use hooks::{Hook, HookResult, PerformanceCommand};
