//! Hooks and exception routing.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use perfmeter_core::{PerfMeterError, PerformanceInfo};
use perfmeter_engine::{ExceptionHandler, HookResult, PerformanceCommand, Registry, LAST_EXCEPTION_KEY};

#[derive(Debug)]
struct Timeout;

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("timeout")
    }
}

impl std::error::Error for Timeout {}

/// Records the total it observed for its method.
struct SeenTotal {
    method: &'static str,
    seen: Arc<Mutex<Vec<u64>>>,
}

impl PerformanceCommand for SeenTotal {
    fn execute(&self, info: &PerformanceInfo) -> HookResult {
        self.seen.lock().unwrap().push(info.total_calls(self.method));
        Ok(())
    }
}

fn collecting_handler() -> (ExceptionHandler, Arc<Mutex<Vec<String>>>) {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let handler = ExceptionHandler::custom(move |e: &PerfMeterError| {
        sink.lock().unwrap().push(e.to_string());
    });
    (handler, errors)
}

#[test]
fn hooks_see_their_own_call() {
    let registry = Registry::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for _ in 0..3 {
        registry
            .begin_watch("C", "M")
            .with_command(SeenTotal { method: "M", seen: Arc::clone(&seen) })
            .with_action(|info| {
                assert_eq!(info.current_calls("M"), 0);
                Ok(())
            })
            .start()
            .stop()
            .unwrap();
    }
    assert_eq!(*seen.lock().unwrap(), [1, 2, 3]);
}

#[test]
fn hooks_run_in_registration_order_across_kinds() {
    let registry = Registry::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    let (a, b) = (Arc::clone(&order), Arc::clone(&order));

    struct Push(Arc<Mutex<Vec<&'static str>>>);
    impl PerformanceCommand for Push {
        fn execute(&self, _: &PerformanceInfo) -> HookResult {
            self.0.lock().unwrap().push("command");
            Ok(())
        }
    }

    registry
        .begin_watch("C", "M")
        .with_action(move |_| {
            a.lock().unwrap().push("action-1");
            Ok(())
        })
        .with_command(Push(Arc::clone(&order)))
        .with_action(move |_| {
            b.lock().unwrap().push("action-2");
            Ok(())
        })
        .start()
        .stop()
        .unwrap();

    assert_eq!(*order.lock().unwrap(), ["action-1", "command", "action-2"]);
}

#[test]
fn failing_hook_stops_the_rest() {
    let registry = Registry::new();
    let (handler, errors) = collecting_handler();
    let h1 = Arc::new(AtomicUsize::new(0));
    let h3 = Arc::new(AtomicUsize::new(0));
    let (h1c, h3c) = (Arc::clone(&h1), Arc::clone(&h3));

    let mut session = registry
        .begin_watch("C", "M")
        .with_exception_handler(handler)
        .with_action(move |_| {
            h1c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .with_action(|_| Err("h2 failed".into()))
        .with_action(move |_| {
            h3c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .start();

    session.stop().unwrap();
    session.stop().unwrap();

    assert_eq!(h1.load(Ordering::SeqCst), 1);
    assert_eq!(h3.load(Ordering::SeqCst), 0);
    assert_eq!(*errors.lock().unwrap(), ["hook #1 failed: h2 failed"]);

    // the commit happened before the hooks
    let info = registry.performance_info("C");
    assert_eq!(info.total_calls("M"), 1);
    assert_eq!(info.current_calls("M"), 0);
}

#[test]
fn default_handler_stores_last_exception() {
    let registry = Registry::new();
    registry
        .begin_watch("C", "M")
        .with_action(|_| Err(Box::new(Timeout)))
        .start()
        .stop()
        .unwrap();

    let info = registry.performance_info("C");
    let stored = &info.custom_data[LAST_EXCEPTION_KEY];
    assert_eq!(stored["code"], "HOOK_EXECUTION");
    assert_eq!(stored["message"], "hook #0 failed: timeout");
}

#[test]
fn propagate_returns_hook_error_from_stop() {
    let registry = Registry::new();
    registry.set_default_exception_handler("C", ExceptionHandler::Propagate);

    let mut session = registry
        .begin_watch("C", "M")
        .with_action(|_| Err(Box::new(Timeout)))
        .start();
    let err = session.stop().expect_err("must propagate");

    match err {
        PerfMeterError::Hook { index, source } => {
            assert_eq!(index, 0);
            assert!(source.downcast_ref::<Timeout>().is_some());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(session.stop().is_ok());
    assert!(!registry.performance_info("C").custom_data.contains_key(LAST_EXCEPTION_KEY));
}

#[test]
fn handler_is_captured_when_the_session_is_created() {
    let registry = Registry::new();
    let (handler, errors) = collecting_handler();
    registry.set_default_exception_handler("C", handler);

    let builder = registry.begin_watch("C", "M").with_action(|_| Err("late".into()));
    registry.set_default_exception_handler("C", ExceptionHandler::Propagate);

    let mut session = builder.start();
    session.stop().unwrap();
    assert_eq!(errors.lock().unwrap().len(), 1);

    let mut session = registry
        .begin_watch("C", "M")
        .with_action(|_| Err("now".into()))
        .start();
    assert!(session.stop().is_err());
}

#[test]
fn execute_without_watching_routes_errors() {
    let registry = Registry::new();
    let (handler, errors) = collecting_handler();

    let mut session = registry.begin_watch("C", "M").with_exception_handler(handler).start();
    let out = session
        .execute_without_watching(|| Err::<u32, _>(Timeout))
        .unwrap();
    assert_eq!(out, None);
    assert!(session.is_running());
    assert_eq!(*errors.lock().unwrap(), ["work failed: timeout"]);

    let mut session = registry
        .begin_watch("C", "M")
        .with_exception_handler(ExceptionHandler::Propagate)
        .start();
    let err = session
        .execute_without_watching(|| Err::<u32, _>(Timeout))
        .expect_err("must propagate");
    assert_eq!(err.code().as_str(), "WORK");
}

#[test]
fn typed_exception_handling() {
    let registry = Registry::new();
    let (handler, errors) = collecting_handler();
    let session = registry.begin_watch("C", "M").with_exception_handler(handler).start();

    // success passes the value through
    let ok = session
        .execute_with_exception_handling::<Timeout, _, _>(|| Ok::<_, Timeout>(5), None)
        .unwrap();
    assert_eq!(ok, Some(5));

    // matching type goes to the typed handler
    let mut typed = 0;
    let out = session
        .execute_with_exception_handling::<Timeout, u8, _>(
            || Err(Timeout),
            Some(&mut |_: Timeout| typed += 1),
        )
        .unwrap();
    assert_eq!(out, None);
    assert_eq!(typed, 1);
    assert!(errors.lock().unwrap().is_empty());

    // matching type without a typed handler is rethrown
    let err = session
        .execute_with_exception_handling::<Timeout, u8, _>(|| Err(Timeout), None)
        .expect_err("must rethrow");
    match err {
        PerfMeterError::Work(source) => assert!(source.is::<Timeout>()),
        other => panic!("unexpected error: {other}"),
    }

    // any other type goes to the session handler
    let out = session
        .execute_with_exception_handling::<Timeout, u8, _>(
            || Err(std::io::Error::new(std::io::ErrorKind::Other, "disk")),
            Some(&mut |_: Timeout| panic!("wrong handler")),
        )
        .unwrap();
    assert_eq!(out, None);
    assert_eq!(*errors.lock().unwrap(), ["work failed: disk"]);
}

#[test]
fn typed_exception_handling_rethrows_without_session_handler() {
    let registry = Registry::new();
    let session = registry
        .begin_watch("C", "M")
        .with_exception_handler(ExceptionHandler::Propagate)
        .start();

    let err = session
        .execute_with_exception_handling::<Timeout, u8, _>(
            || Err("plain".to_string()),
            None,
        )
        .expect_err("must rethrow");
    assert_eq!(err.to_string(), "work failed: plain");
}

#[test]
fn hook_error_wins_over_held_resolution_error() {
    let registry = Registry::new();
    registry.component("C").declare_methods(&["get"], &[]);
    registry.set_default_exception_handler("C", ExceptionHandler::Propagate);

    let mut session = registry
        .begin_watch("C", "nope")
        .with_action(|_| Err(Box::new(Timeout)))
        .start();
    let err = session.stop().expect_err("must propagate");
    assert_eq!(err.code().as_str(), "HOOK_EXECUTION");

    // the resolution error is not replayed on a later stop
    assert!(session.stop().is_ok());
    assert_eq!(registry.performance_info("C").total_calls("unknown"), 1);
}
