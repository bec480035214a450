use perfmeter_core::model::{CustomValue, MethodDescriptor, PerformanceInfo};

use crate::pipeline::{ExceptionHandler, Hook, HookResult, PerformanceCommand};

use super::Session;

/// Custom-data key written by [`SessionBuilder::with_caller_data`].
pub const CALLER_DATA_KEY: &str = "caller_data";

/// Fluent configuration of a session that has not started yet.
///
/// Dropping a builder without calling [`SessionBuilder::start`] leaves no
/// trace in the registry.
#[must_use = "a watching session only begins on start()"]
#[derive(Debug)]
pub struct SessionBuilder {
    session: Session,
}

impl SessionBuilder {
    pub(crate) fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn method(&self) -> &MethodDescriptor {
        self.session.method()
    }

    /// Explicit caller identity; replaces any previous value.
    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.session.caller = Some(caller.into());
        self
    }

    /// Caller identity source consulted at stop time. Returning `None` falls
    /// back to the explicit caller.
    pub fn with_caller_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        self.session.caller_resolver = Some(Box::new(resolver));
        self
    }

    /// Per-call custom data; last write wins.
    pub fn with_custom_data(mut self, key: impl Into<String>, value: impl Into<CustomValue>) -> Self {
        self.session.custom_data.insert(key.into(), value.into());
        self
    }

    /// Attach the source location of this call as `caller_data`
    /// (`{"file", "line", "column"}`).
    #[track_caller]
    pub fn with_caller_data(self) -> Self {
        let at = std::panic::Location::caller();
        self.with_custom_data(
            CALLER_DATA_KEY,
            serde_json::json!({
                "file": at.file(),
                "line": at.line(),
                "column": at.column(),
            }),
        )
    }

    pub fn with_hook(mut self, hook: Hook) -> Self {
        self.session.hooks.push(hook);
        self
    }

    pub fn with_command(self, cmd: impl PerformanceCommand + 'static) -> Self {
        self.with_hook(Hook::command(cmd))
    }

    pub fn with_action<F>(self, action: F) -> Self
    where
        F: Fn(&PerformanceInfo) -> HookResult + Send + Sync + 'static,
    {
        self.with_hook(Hook::action(action))
    }

    /// Override the handler captured from the component default.
    pub fn with_exception_handler(mut self, handler: ExceptionHandler) -> Self {
        self.session.handler = handler;
        self
    }

    pub fn start(mut self) -> Session {
        self.session.start();
        self.session
    }
}
