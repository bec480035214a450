use std::sync::Arc;

use perfmeter_core::error::{PerfMeterError, Result};

use crate::config::HandlerMode;
use crate::registry::Component;

/// Custom data key written by [`ExceptionHandler::StoreLastException`].
pub const LAST_EXCEPTION_KEY: &str = "Last exception";

type HandlerFn = Arc<dyn Fn(&PerfMeterError) + Send + Sync>;

/// Where instrumentation failures go.
///
/// Each component holds a default; a session copies it when it is created,
/// so changing the default later does not affect existing sessions.
#[derive(Clone, Default)]
pub enum ExceptionHandler {
    /// Store the error as JSON under [`LAST_EXCEPTION_KEY`] on the component.
    #[default]
    StoreLastException,
    /// Hand the error to a function.
    Custom(HandlerFn),
    /// No handler: the error is returned to the caller.
    Propagate,
}

impl ExceptionHandler {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&PerfMeterError) + Send + Sync + 'static,
    {
        ExceptionHandler::Custom(Arc::new(f))
    }

    /// Deliver `err`. Returns it back only for [`ExceptionHandler::Propagate`].
    pub(crate) fn route(&self, component: &Component, err: PerfMeterError) -> Result<()> {
        match self {
            ExceptionHandler::StoreLastException => {
                tracing::debug!(component = component.key(), error = %err, "exception stored");
                component.add_custom_data(LAST_EXCEPTION_KEY, err.to_json());
                Ok(())
            }
            ExceptionHandler::Custom(f) => {
                f(&err);
                Ok(())
            }
            ExceptionHandler::Propagate => Err(err),
        }
    }
}

impl From<HandlerMode> for ExceptionHandler {
    fn from(mode: HandlerMode) -> Self {
        match mode {
            HandlerMode::Store => ExceptionHandler::StoreLastException,
            HandlerMode::Propagate => ExceptionHandler::Propagate,
        }
    }
}

impl std::fmt::Debug for ExceptionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExceptionHandler::StoreLastException => f.write_str("StoreLastException"),
            ExceptionHandler::Custom(_) => f.write_str("Custom"),
            ExceptionHandler::Propagate => f.write_str("Propagate"),
        }
    }
}
