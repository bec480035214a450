//! Snapshot types handed out by the registry.
//!
//! Everything here is plain data: values are cloned out of the registry under
//! its lock, so a returned [`PerformanceInfo`] never changes afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Method name used when a session cannot resolve its method.
pub const UNKNOWN_METHOD: &str = "unknown";

/// Caller identity used when neither a resolver nor an explicit caller is set.
pub const UNKNOWN_CALLER: &str = "unknown";

/// Ticks per second of the elapsed-time clock (durations are nanosecond based).
pub const TIMER_FREQUENCY: u64 = 1_000_000_000;

/// Opaque custom data value.
pub type CustomValue = serde_json::Value;

/// Resolved method of a monitored component.
///
/// `token` is unique per registry and stable for the registry's lifetime, so
/// two descriptors with the same name on different components never compare
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    name: Arc<str>,
    token: u64,
    ignored: bool,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<Arc<str>>, token: u64, ignored: bool) -> Self {
        Self {
            name: name.into(),
            token,
            ignored,
        }
    }

    /// Fallback descriptor for names that failed resolution.
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_METHOD, 0, false)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Ignored methods are not measured.
    pub fn is_ignored(&self) -> bool {
        self.ignored
    }
}

/// One completed call.
#[derive(Debug, Clone, Serialize)]
pub struct MethodCallInfo {
    pub method_name: String,
    pub caller: String,
    pub start_time: DateTime<Utc>,
    #[serde(rename = "duration_ms", serialize_with = "duration_as_millis")]
    pub elapsed: Duration,
    pub custom_data: BTreeMap<String, CustomValue>,
}

/// Method name + count (total or in-flight).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodCallsCount {
    pub method_name: String,
    pub calls_count: u64,
}

/// Point-in-time view of one component's aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceInfo {
    pub class_name: String,
    pub method_names: Vec<String>,
    pub method_calls: Vec<MethodCallInfo>,
    pub total_activity: Vec<MethodCallsCount>,
    pub current_activity: Vec<MethodCallsCount>,
    pub uptime_since: DateTime<Utc>,
    pub custom_data: BTreeMap<String, CustomValue>,
    pub cache_time_minutes: u32,
    pub timer_frequency: u64,
}

impl PerformanceInfo {
    /// Completed calls of `method` (0 if never seen).
    pub fn total_calls(&self, method: &str) -> u64 {
        count_of(&self.total_activity, method)
    }

    /// In-flight calls of `method` (0 if never seen).
    pub fn current_calls(&self, method: &str) -> u64 {
        count_of(&self.current_activity, method)
    }

    /// Retained calls of `method`, in insertion order.
    pub fn calls_of<'a>(&'a self, method: &'a str) -> impl Iterator<Item = &'a MethodCallInfo> + 'a {
        self.method_calls.iter().filter(move |c| c.method_name == method)
    }
}

fn count_of(counts: &[MethodCallsCount], method: &str) -> u64 {
    counts
        .iter()
        .find(|c| c.method_name == method)
        .map(|c| c.calls_count)
        .unwrap_or(0)
}

fn duration_as_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}
