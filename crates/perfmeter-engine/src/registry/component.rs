use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use perfmeter_core::error::{PerfMeterError, Result};
use perfmeter_core::model::{
    CustomValue, MethodCallInfo, MethodCallsCount, MethodDescriptor, PerformanceInfo,
    TIMER_FREQUENCY,
};

use crate::pipeline::ExceptionHandler;
use crate::session::{Session, SessionBuilder};

/// Aggregation state of one monitored component.
///
/// All mutations go through a single mutex, so record/increment/decrement/
/// prune are atomic with respect to each other and to snapshots. The method
/// lookup table is kept outside the lock; resolving an already-cached name
/// never contends with sessions committing results.
pub struct Component {
    key: String,
    uptime_since: DateTime<Utc>,
    tokens: Arc<AtomicU64>,
    methods: DashMap<String, MethodDescriptor>,
    state: Mutex<ComponentState>,
}

#[derive(Default)]
struct ComponentState {
    declared: BTreeSet<String>,
    ignored: BTreeSet<String>,
    method_calls: Vec<MethodCallInfo>,
    total: BTreeMap<String, u64>,
    current: BTreeMap<String, u64>,
    custom_data: BTreeMap<String, CustomValue>,
    cache_time_minutes: u32,
    exception_handler: ExceptionHandler,
}

impl ComponentState {
    /// Drop calls that started before `now - cache_time`. Returns how many.
    fn prune(&mut self, now: DateTime<Utc>) -> usize {
        if self.cache_time_minutes == 0 {
            return 0;
        }
        let cutoff = now - chrono::Duration::minutes(i64::from(self.cache_time_minutes));
        let before = self.method_calls.len();
        self.method_calls.retain(|c| c.start_time >= cutoff);
        before - self.method_calls.len()
    }

    fn knows_methods(&self) -> bool {
        !self.declared.is_empty() || !self.ignored.is_empty()
    }
}

impl Component {
    pub(crate) fn new(key: impl Into<String>, tokens: Arc<AtomicU64>) -> Self {
        Self {
            key: key.into(),
            uptime_since: Utc::now(),
            tokens,
            methods: DashMap::new(),
            state: Mutex::new(ComponentState::default()),
        }
    }

    /// Component identifier.
    pub fn key(&self) -> &str {
        &self.key
    }

    // A poisoned lock only means a panic elsewhere while holding it; every
    // mutation below leaves the state consistent, so keep going.
    fn lock(&self) -> MutexGuard<'_, ComponentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Declare the component's method set. Once any method is declared,
    /// names outside the set fail resolution.
    pub fn declare_methods<S: AsRef<str>>(&self, methods: &[S], ignored: &[S]) {
        let mut st = self.lock();
        for m in methods {
            st.declared.insert(m.as_ref().to_string());
        }
        for m in ignored {
            let name = m.as_ref();
            st.declared.remove(name);
            st.ignored.insert(name.to_string());
            // a cached descriptor would still carry ignored = false
            self.methods.remove(name);
        }
        // names resolved while the component was open are no longer known
        if st.knows_methods() {
            self.methods.retain(|name, d| {
                st.declared.contains(name) || (d.is_ignored() && st.ignored.contains(name))
            });
        }
    }

    /// Resolve `name` against the method set, caching the descriptor.
    pub fn resolve(&self, name: &str) -> Result<MethodDescriptor> {
        if let Some(d) = self.methods.get(name) {
            return Ok(d.value().clone());
        }

        let ignored = {
            let st = self.lock();
            let ignored = st.ignored.contains(name);
            if st.knows_methods() && !ignored && !st.declared.contains(name) {
                return Err(PerfMeterError::Resolution {
                    component: self.key.clone(),
                    method: name.to_string(),
                });
            }
            ignored
        };

        let descriptor = self
            .methods
            .entry(name.to_string())
            .or_insert_with(|| {
                let token = self.tokens.fetch_add(1, Ordering::Relaxed);
                MethodDescriptor::new(name, token, ignored)
            })
            .value()
            .clone();
        Ok(descriptor)
    }

    /// Cache an explicitly supplied descriptor; the first one for a name wins.
    pub fn adopt(&self, descriptor: MethodDescriptor) -> MethodDescriptor {
        self.methods
            .entry(descriptor.name().to_string())
            .or_insert(descriptor)
            .value()
            .clone()
    }

    /// Begin watching `method`, resolved by name.
    ///
    /// An unresolvable name does not fail here: the session measures under the
    /// `unknown` bucket and reports the resolution error once started.
    pub fn begin_watch(self: &Arc<Self>, method: &str) -> SessionBuilder {
        let session = match self.resolve(method) {
            Ok(descriptor) => Session::new(Arc::clone(self), descriptor, None),
            Err(err) => Session::new(Arc::clone(self), MethodDescriptor::unknown(), Some(err)),
        };
        SessionBuilder::new(session)
    }

    /// Begin watching with a descriptor supplied by the caller.
    pub fn begin_watch_method(self: &Arc<Self>, method: MethodDescriptor) -> SessionBuilder {
        let descriptor = self.adopt(method);
        SessionBuilder::new(Session::new(Arc::clone(self), descriptor, None))
    }

    /// Append a completed call, count it, then prune by TTL.
    pub fn record(&self, call: MethodCallInfo) {
        self.record_at(call, Utc::now());
    }

    pub(crate) fn record_at(&self, call: MethodCallInfo, now: DateTime<Utc>) {
        let mut st = self.lock();
        Self::append(&self.key, &mut st, call, now);
    }

    /// Record `call` and release its in-flight count under one lock, so no
    /// snapshot sees the call both completed and still running.
    pub fn commit(&self, call: MethodCallInfo) -> Result<()> {
        self.commit_at(call, Utc::now())
    }

    pub(crate) fn commit_at(&self, call: MethodCallInfo, now: DateTime<Utc>) -> Result<()> {
        let method = call.method_name.clone();
        {
            let mut st = self.lock();
            if let Some(n) = st.current.get_mut(&method).filter(|n| **n > 0) {
                *n -= 1;
                Self::append(&self.key, &mut st, call, now);
                return Ok(());
            }
            Self::append(&self.key, &mut st, call, now);
        }
        tracing::warn!(component = %self.key, method = %method, "current activity underflow");
        Err(underflow(&method))
    }

    fn append(key: &str, st: &mut ComponentState, call: MethodCallInfo, now: DateTime<Utc>) {
        *st.total.entry(call.method_name.clone()).or_insert(0) += 1;
        st.method_calls.push(call);
        let pruned = st.prune(now);
        if pruned > 0 {
            tracing::trace!(component = %key, pruned, "expired method calls pruned");
        }
    }

    pub fn increment_current(&self, method: &str) {
        let mut st = self.lock();
        *st.current.entry(method.to_string()).or_insert(0) += 1;
    }

    /// Decrement the in-flight counter. Decrementing 0 leaves it at 0 and
    /// reports the violation.
    pub fn decrement_current(&self, method: &str) -> Result<()> {
        {
            let mut st = self.lock();
            if let Some(n) = st.current.get_mut(method).filter(|n| **n > 0) {
                *n -= 1;
                return Ok(());
            }
        }
        tracing::warn!(component = %self.key, method, "current activity underflow");
        Err(underflow(method))
    }

    /// Set the call-history TTL in minutes (0 = unlimited).
    pub fn set_cache_time(&self, minutes: u32) {
        self.lock().cache_time_minutes = minutes;
    }

    pub fn cache_time(&self) -> u32 {
        self.lock().cache_time_minutes
    }

    /// Last write wins.
    pub fn add_custom_data(&self, key: impl Into<String>, value: impl Into<CustomValue>) {
        self.lock().custom_data.insert(key.into(), value.into());
    }

    pub fn set_default_exception_handler(&self, handler: ExceptionHandler) {
        self.lock().exception_handler = handler;
    }

    pub fn default_exception_handler(&self) -> ExceptionHandler {
        self.lock().exception_handler.clone()
    }

    /// Consistent snapshot of the aggregates.
    pub fn info(&self) -> PerformanceInfo {
        self.info_at(Utc::now())
    }

    pub(crate) fn info_at(&self, now: DateTime<Utc>) -> PerformanceInfo {
        let mut st = self.lock();
        st.prune(now);

        let mut method_names: BTreeSet<String> = st.declared.clone();
        for entry in self.methods.iter() {
            if !entry.value().is_ignored() {
                method_names.insert(entry.key().clone());
            }
        }

        PerformanceInfo {
            class_name: self.key.clone(),
            method_names: method_names.into_iter().collect(),
            method_calls: st.method_calls.clone(),
            total_activity: counts(&st.total),
            current_activity: counts(&st.current),
            uptime_since: self.uptime_since,
            custom_data: st.custom_data.clone(),
            cache_time_minutes: st.cache_time_minutes,
            timer_frequency: TIMER_FREQUENCY,
        }
    }
}

fn underflow(method: &str) -> PerfMeterError {
    PerfMeterError::Record(format!("current activity of `{method}` would drop below zero"))
}

fn counts(map: &BTreeMap<String, u64>) -> Vec<MethodCallsCount> {
    map.iter()
        .map(|(name, n)| MethodCallsCount {
            method_name: name.clone(),
            calls_count: *n,
        })
        .collect()
}
