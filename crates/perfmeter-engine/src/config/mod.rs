//! Config loader (strict parsing).

pub mod schema;

use std::fs;

use perfmeter_core::error::{PerfMeterError, Result};

pub use schema::{ComponentConfig, HandlerMode, PerfMeterConfig};

pub fn load_from_file(path: &str) -> Result<PerfMeterConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| PerfMeterError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<PerfMeterConfig> {
    let cfg: PerfMeterConfig = serde_yaml::from_str(s)
        .map_err(|e| PerfMeterError::BadConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
