use perfmeter_core::error::BoxError;
use perfmeter_core::model::PerformanceInfo;

/// Outcome of a hook. An `Err` stops the remaining hooks of that stop().
pub type HookResult = std::result::Result<(), BoxError>;

/// Command object executed once a watched call completes.
pub trait PerformanceCommand: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn execute(&self, info: &PerformanceInfo) -> HookResult;
}

type Action = Box<dyn Fn(&PerformanceInfo) -> HookResult + Send + Sync>;

/// One registered hook. Commands and actions share a single ordered list.
pub enum Hook {
    Command(Box<dyn PerformanceCommand>),
    Action(Action),
}

impl Hook {
    pub fn command(cmd: impl PerformanceCommand + 'static) -> Self {
        Hook::Command(Box::new(cmd))
    }

    pub fn action<F>(f: F) -> Self
    where
        F: Fn(&PerformanceInfo) -> HookResult + Send + Sync + 'static,
    {
        Hook::Action(Box::new(f))
    }

    pub fn run(&self, info: &PerformanceInfo) -> HookResult {
        match self {
            Hook::Command(cmd) => {
                tracing::trace!(command = cmd.name(), "executing command");
                cmd.execute(info)
            }
            Hook::Action(f) => f(info),
        }
    }
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Hook::Command(cmd) => f.debug_tuple("Command").field(&cmd.name()).finish(),
            Hook::Action(_) => f.write_str("Action"),
        }
    }
}
