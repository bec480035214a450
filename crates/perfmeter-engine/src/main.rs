//! perfmeter demo
//!
//! - Loads `perfmeter.yaml` (or the path given as first argument)
//! - Watches every configured method once
//! - Prints each component snapshot as JSON

use std::thread;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use perfmeter_core::error::{PerfMeterError, Result};
use perfmeter_engine::{config, Registry};

fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "perfmeter.yaml".to_string());
    if let Err(e) = run(&path) {
        tracing::error!(error = %e, %path, "perfmeter-demo failed");
        std::process::exit(1);
    }
}

fn run(path: &str) -> Result<()> {
    let cfg = config::load_from_file(path)?;
    let registry = Registry::global();
    registry.apply_config(&cfg);
    tracing::info!(components = cfg.components.len(), "perfmeter-demo starting");

    for c in &cfg.components {
        for method in &c.methods {
            let _watch = registry
                .begin_watch(&c.name, method)
                .with_caller("perfmeter-demo")
                .with_custom_data("demo", true)
                .start();
            thread::sleep(Duration::from_millis(10));
        }
    }

    for key in registry.components() {
        let info = registry.performance_info(&key);
        let json = serde_json::to_string_pretty(&info)
            .map_err(|e| PerfMeterError::Internal(format!("serialize snapshot failed: {e}")))?;
        println!("{json}");
    }
    Ok(())
}
