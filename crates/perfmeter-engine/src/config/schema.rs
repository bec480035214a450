use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use perfmeter_core::error::{PerfMeterError, Result};
use perfmeter_core::model::CustomValue;

/// Longest accepted call-history TTL (one year).
pub const MAX_CACHE_TIME_MINUTES: u32 = 525_600;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PerfMeterConfig {
    pub version: u32,

    #[serde(default)]
    pub components: Vec<ComponentConfig>,
}

impl PerfMeterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PerfMeterError::UnsupportedVersion);
        }

        let mut seen = HashSet::new();
        for c in &self.components {
            c.validate()?;
            if !seen.insert(c.name.as_str()) {
                return Err(PerfMeterError::BadConfig(format!(
                    "duplicate component: {}",
                    c.name
                )));
            }
        }
        Ok(())
    }
}

/// How a component handles instrumentation failures by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerMode {
    /// Store under the `Last exception` custom data key.
    #[default]
    Store,
    /// Return errors to the caller of stop().
    Propagate,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentConfig {
    pub name: String,

    /// 0 keeps every call.
    #[serde(default)]
    pub cache_time_minutes: u32,

    #[serde(default)]
    pub methods: Vec<String>,

    #[serde(default)]
    pub ignored_methods: Vec<String>,

    #[serde(default)]
    pub custom_data: BTreeMap<String, CustomValue>,

    #[serde(default)]
    pub exception_handler: HandlerMode,
}

impl ComponentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PerfMeterError::BadConfig("component name must not be empty".into()));
        }
        if self.cache_time_minutes > MAX_CACHE_TIME_MINUTES {
            return Err(PerfMeterError::BadConfig(format!(
                "components[{}].cache_time_minutes must be at most {MAX_CACHE_TIME_MINUTES}",
                self.name
            )));
        }
        if let Some(m) = self.methods.iter().find(|m| m.trim().is_empty()) {
            return Err(PerfMeterError::BadConfig(format!(
                "components[{}] has an empty method name: {m:?}",
                self.name
            )));
        }
        if let Some(m) = self.ignored_methods.iter().find(|m| self.methods.contains(m)) {
            return Err(PerfMeterError::BadConfig(format!(
                "components[{}].{m} is both watched and ignored",
                self.name
            )));
        }
        Ok(())
    }
}
