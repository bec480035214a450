//! Watching sessions.
//!
//! A [`Session`] brackets one call of one method:
//! - `start()` bumps the in-flight counter and starts the clock
//! - `stop()` (or drop) commits a call record, releases the in-flight counter
//!   and runs the hooks in registration order
//!
//! Failures in that tail never reach the watched code unless the session's
//! exception handler is [`ExceptionHandler::Propagate`].

pub mod builder;
mod stopwatch;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use perfmeter_core::error::{BoxError, PerfMeterError, Result};
use perfmeter_core::model::{
    CustomValue, MethodCallInfo, MethodDescriptor, PerformanceInfo, UNKNOWN_CALLER,
};

use crate::pipeline::{ExceptionHandler, Hook};
use crate::registry::Component;

pub use builder::{SessionBuilder, CALLER_DATA_KEY};
use stopwatch::Stopwatch;

pub(crate) type CallerResolver = Box<dyn Fn() -> Option<String> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Running,
    Stopped,
}

pub struct Session {
    component: Arc<Component>,
    method: MethodDescriptor,
    caller: Option<String>,
    caller_resolver: Option<CallerResolver>,
    custom_data: BTreeMap<String, CustomValue>,
    hooks: Vec<Hook>,
    handler: ExceptionHandler,
    state: SessionState,
    stopwatch: Stopwatch,
    started_at: DateTime<Utc>,
    // resolution failure waiting to be routed at start, or returned by stop
    // when the handler propagates
    deferred: Option<PerfMeterError>,
}

impl Session {
    pub(crate) fn new(
        component: Arc<Component>,
        method: MethodDescriptor,
        resolution_error: Option<PerfMeterError>,
    ) -> Self {
        let handler = component.default_exception_handler();
        Self {
            component,
            method,
            caller: None,
            caller_resolver: None,
            custom_data: BTreeMap::new(),
            hooks: Vec::new(),
            handler,
            state: SessionState::Created,
            stopwatch: Stopwatch::default(),
            started_at: Utc::now(),
            deferred: resolution_error,
        }
    }

    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    pub fn component(&self) -> &str {
        self.component.key()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Measured time so far (excludes paused sections).
    pub fn elapsed(&self) -> Duration {
        self.stopwatch.elapsed()
    }

    /// Current snapshot of the component this session reports to.
    pub fn performance_info(&self) -> PerformanceInfo {
        self.component.info()
    }

    pub(crate) fn start(&mut self) {
        if self.state != SessionState::Created {
            return;
        }
        self.state = SessionState::Running;

        if let Some(err) = self.deferred.take() {
            tracing::warn!(
                component = self.component.key(),
                error = %err,
                "method not resolved; measuring under the unknown bucket"
            );
            if let Err(err) = self.handler.route(&self.component, err) {
                self.deferred = Some(err);
            }
        }

        if !self.method.is_ignored() {
            self.component.increment_current(self.method.name());
        }
        self.started_at = Utc::now();
        self.stopwatch.start();
        tracing::debug!(
            component = self.component.key(),
            method = self.method.name(),
            "session started"
        );
    }

    /// Stop watching. Calls after the first are no-ops.
    ///
    /// Returns an error only when the exception handler propagates. A failure
    /// of the commit or a hook takes precedence over a resolution error held
    /// since creation; the latter is then logged.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != SessionState::Running {
            return Ok(());
        }
        self.state = SessionState::Stopped;
        self.stopwatch.stop();

        if !self.method.is_ignored() {
            if let Err(err) = self.commit() {
                if let Err(err) = self.handler.route(&self.component, err) {
                    if let Some(held) = self.deferred.take() {
                        tracing::warn!(
                            component = self.component.key(),
                            code = held.code().as_str(),
                            error = %held,
                            "resolution error superseded"
                        );
                    }
                    return Err(err);
                }
            }
        }

        match self.deferred.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Same as [`Session::stop`].
    pub fn dispose(&mut self) -> Result<()> {
        self.stop()
    }

    fn commit(&mut self) -> Result<()> {
        let caller = self.resolve_caller();
        let elapsed = self.stopwatch.elapsed();
        let method = self.method.name().to_string();

        self.component.commit(MethodCallInfo {
            method_name: method.clone(),
            caller: caller.clone(),
            start_time: self.started_at,
            elapsed,
            custom_data: std::mem::take(&mut self.custom_data),
        })?;

        tracing::debug!(
            component = self.component.key(),
            method = %method,
            caller = %caller,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "session stopped"
        );

        let hooks = std::mem::take(&mut self.hooks);
        if hooks.is_empty() {
            return Ok(());
        }
        let info = self.component.info();
        for (index, hook) in hooks.iter().enumerate() {
            hook.run(&info)
                .map_err(|source| PerfMeterError::Hook { index, source })?;
        }
        Ok(())
    }

    /// Resolver result first, then the explicit caller, then the placeholder.
    fn resolve_caller(&self) -> String {
        self.caller_resolver
            .as_ref()
            .and_then(|resolve| resolve())
            .or_else(|| self.caller.clone())
            .unwrap_or_else(|| UNKNOWN_CALLER.to_string())
    }

    /// Run `work` with the clock paused.
    ///
    /// `Ok(None)` means `work` failed and the handler took the error.
    pub fn execute_without_watching<T, E>(
        &mut self,
        work: impl FnOnce() -> std::result::Result<T, E>,
    ) -> Result<Option<T>>
    where
        E: Into<BoxError>,
    {
        let was_running = self.stopwatch.stop();
        let out = work();
        if was_running {
            self.stopwatch.start();
        }

        match out {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                self.handler.route(&self.component, PerfMeterError::Work(e.into()))?;
                Ok(None)
            }
        }
    }

    /// Run `work`; errors of type `D` go to `typed_handler`, anything else to
    /// the session's handler. A missing handler means the error is returned.
    ///
    /// `Ok(None)` means `work` failed and a handler took the error.
    pub fn execute_with_exception_handling<D, T, E>(
        &self,
        work: impl FnOnce() -> std::result::Result<T, E>,
        typed_handler: Option<&mut dyn FnMut(D)>,
    ) -> Result<Option<T>>
    where
        D: std::error::Error + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let err: BoxError = match work() {
            Ok(v) => return Ok(Some(v)),
            Err(e) => e.into(),
        };

        match err.downcast::<D>() {
            Ok(typed) => match typed_handler {
                Some(handle) => {
                    handle(*typed);
                    Ok(None)
                }
                None => Err(PerfMeterError::Work(typed)),
            },
            Err(other) => {
                self.handler.route(&self.component, PerfMeterError::Work(other))?;
                Ok(None)
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::error!(
                component = self.component.key(),
                method = self.method.name(),
                error = %err,
                "session failed while stopping on drop"
            );
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("component", &self.component.key())
            .field("method", &self.method)
            .field("state", &self.state)
            .field("hooks", &self.hooks)
            .field("handler", &self.handler)
            .finish()
    }
}
