//! Component registry.
//!
//! - `component key -> Component` (lazy, lives as long as the registry)
//! - one token sequence shared by all components, so method descriptors
//!   are unique registry-wide

pub mod component;

use std::sync::atomic::AtomicU64;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use perfmeter_core::model::{CustomValue, MethodDescriptor, PerformanceInfo};

use crate::config::PerfMeterConfig;
use crate::pipeline::ExceptionHandler;
use crate::session::SessionBuilder;

pub use component::Component;

/// A type whose methods are watched.
///
/// Stands in for reflection: the component declares its key and method set.
/// An empty method set means any name resolves.
pub trait MonitoredComponent {
    fn component_key() -> &'static str {
        std::any::type_name::<Self>()
    }

    fn method_names() -> &'static [&'static str] {
        &[]
    }

    /// Methods that are never measured and not listed in snapshots.
    fn ignored_methods() -> &'static [&'static str] {
        &[]
    }
}

pub struct Registry {
    components: DashMap<String, Arc<Component>>,
    tokens: Arc<AtomicU64>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            components: DashMap::new(),
            // 0 is the `unknown` descriptor
            tokens: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Process-wide registry.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// Component by key, created on first use.
    pub fn component(&self, key: &str) -> Arc<Component> {
        if let Some(c) = self.components.get(key) {
            return Arc::clone(c.value());
        }
        let c = self
            .components
            .entry(key.to_string())
            .or_insert_with(|| {
                tracing::debug!(component = key, "component registered");
                Arc::new(Component::new(key, Arc::clone(&self.tokens)))
            });
        Arc::clone(c.value())
    }

    /// Component for a typed key; its method set is declared on creation.
    pub fn component_for<C: MonitoredComponent>(&self) -> Arc<Component> {
        let key = C::component_key();
        if let Some(c) = self.components.get(key) {
            return Arc::clone(c.value());
        }
        let c = self.components.entry(key.to_string()).or_insert_with(|| {
            let c = Component::new(key, Arc::clone(&self.tokens));
            c.declare_methods(C::method_names(), C::ignored_methods());
            tracing::debug!(component = key, "typed component registered");
            Arc::new(c)
        });
        Arc::clone(c.value())
    }

    pub fn get(&self, key: &str) -> Option<Arc<Component>> {
        self.components.get(key).map(|c| Arc::clone(c.value()))
    }

    /// Known component keys, sorted.
    pub fn components(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.components.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn begin_watch(&self, component: &str, method: &str) -> SessionBuilder {
        self.component(component).begin_watch(method)
    }

    pub fn begin_watch_method(&self, component: &str, method: MethodDescriptor) -> SessionBuilder {
        self.component(component).begin_watch_method(method)
    }

    pub fn watching<C: MonitoredComponent>(&self, method: &str) -> SessionBuilder {
        self.component_for::<C>().begin_watch(method)
    }

    pub fn performance_info(&self, component: &str) -> PerformanceInfo {
        self.component(component).info()
    }

    pub fn set_cache_time(&self, component: &str, minutes: u32) {
        self.component(component).set_cache_time(minutes);
    }

    pub fn add_custom_data(&self, component: &str, key: impl Into<String>, value: impl Into<CustomValue>) {
        self.component(component).add_custom_data(key, value);
    }

    pub fn set_default_exception_handler(&self, component: &str, handler: ExceptionHandler) {
        self.component(component).set_default_exception_handler(handler);
    }

    /// Pre-declare components from a validated config.
    pub fn apply_config(&self, cfg: &PerfMeterConfig) {
        for c in &cfg.components {
            let component = self.component(&c.name);
            component.declare_methods(&c.methods, &c.ignored_methods);
            component.set_cache_time(c.cache_time_minutes);
            for (k, v) in &c.custom_data {
                component.add_custom_data(k.clone(), v.clone());
            }
            component.set_default_exception_handler(c.exception_handler.into());
            tracing::info!(
                component = %c.name,
                methods = c.methods.len(),
                cache_time_minutes = c.cache_time_minutes,
                "component configured"
            );
        }
    }
}
