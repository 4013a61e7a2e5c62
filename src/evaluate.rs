//! Evaluate a formatted request inside the runtime and read back the outcome.

use crate::error::{LessError, ScriptError};
use crate::ops::ImportRoot;
use crate::request::CompileRequest;
use deno_core::{v8, JsRuntime};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// What `__lessc_settle__` hands back.
#[derive(Debug, Deserialize)]
struct Settled {
    #[serde(default)]
    css: Option<String>,
    #[serde(default)]
    error: Option<ScriptError>,
}

/// Terminates V8 execution if not disarmed before the deadline.
struct Watchdog {
    cancel: Option<mpsc::Sender<()>>,
    fired: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Watchdog {
    fn arm(isolate: v8::IsolateHandle, ms: u64) -> Self {
        let (cancel, disarmed) = mpsc::channel::<()>();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let thread = thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = disarmed.recv_timeout(Duration::from_millis(ms)) {
                flag.store(true, Ordering::SeqCst);
                isolate.terminate_execution();
            }
        });

        Self {
            cancel: Some(cancel),
            fired,
            thread: Some(thread),
        }
    }

    /// Stop the timer. Returns whether it already fired.
    fn disarm(mut self) -> bool {
        self.stop();
        self.fired.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        drop(self.cancel.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run `script` for `request` and return the compiled CSS.
pub(crate) fn evaluate(
    runtime: &mut JsRuntime,
    request: &CompileRequest<'_>,
    script: String,
    timeout_ms: Option<u64>,
) -> Result<String, LessError> {
    let filename = request.filename;
    let compile_error = |source: anyhow::Error| LessError::Compile {
        filename: filename.to_string(),
        source: source.into(),
    };

    let import_root = match request.base_dir {
        Some(dir) => ImportRoot::new(dir).map_err(compile_error)?,
        None => ImportRoot::disabled(),
    };
    let base_url = serde_json::to_string(&import_root.base_url()).map_err(|e| LessError::Compile {
        filename: filename.to_string(),
        source: Box::new(e),
    })?;
    runtime.op_state().borrow_mut().put(import_root);
    runtime
        .execute_script("<lessc-base>", format!("globalThis.__lessc_set_base__({})", base_url))
        .map_err(compile_error)?;

    let isolate = runtime.v8_isolate().thread_safe_handle();
    let watchdog = timeout_ms.map(|ms| (ms, Watchdog::arm(isolate.clone(), ms)));

    let outcome = runtime.execute_script("process-less.js", script);

    if let Some((ms, watchdog)) = watchdog {
        if watchdog.disarm() {
            // The termination flag may still be pending; clear it so the
            // runtime can take the next request.
            isolate.cancel_terminate_execution();

            // A deadline that passed after the script finished interrupted nothing
            if outcome.is_err() {
                return Err(LessError::Timeout {
                    filename: filename.to_string(),
                    ms,
                });
            }
        }
    }

    let value = outcome.map_err(compile_error)?;

    // Handle scope lives only for this block
    let text = {
        let scope = &mut runtime.handle_scope();
        let local = v8::Local::new(scope, &value);
        local.to_rust_string_lossy(scope)
    };

    let settled: Settled = serde_json::from_str(&text).map_err(|e| LessError::Compile {
        filename: filename.to_string(),
        source: Box::new(e),
    })?;

    match settled {
        Settled { error: Some(error), .. } => Err(LessError::Compile {
            filename: filename.to_string(),
            source: Box::new(error),
        }),
        Settled { css, .. } => Ok(css.unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_css() {
        let settled: Settled = serde_json::from_str(r#"{"css":".a { color: red; }"}"#).unwrap();
        assert_eq!(settled.css.as_deref(), Some(".a { color: red; }"));
        assert!(settled.error.is_none());
    }

    #[test]
    fn test_settled_error() {
        let settled: Settled = serde_json::from_str(
            r#"{"error":{"type":"Parse","message":"missing closing `}`","filename":"a.less","line":1,"column":5,"extract":[]}}"#,
        )
        .unwrap();
        let error = settled.error.unwrap();
        assert_eq!(error.kind, "Parse");
        assert_eq!(error.line, Some(1));
    }

    #[test]
    fn test_watchdog_disarmed_in_time_does_not_fire() {
        let mut runtime = JsRuntime::new(Default::default());
        let handle = runtime.v8_isolate().thread_safe_handle();

        let watchdog = Watchdog::arm(handle, 60_000);
        assert!(!watchdog.disarm());
    }

    #[test]
    fn test_late_watchdog_keeps_finished_result() {
        let mut runtime = JsRuntime::new(Default::default());
        let handle = runtime.v8_isolate().thread_safe_handle();

        let watchdog = Watchdog::arm(handle.clone(), 1);
        let value = runtime.execute_script("<finished>", "'done'").unwrap();
        std::thread::sleep(Duration::from_millis(100));

        assert!(watchdog.disarm());
        handle.cancel_terminate_execution();

        let text = {
            let scope = &mut runtime.handle_scope();
            let local = v8::Local::new(scope, &value);
            local.to_rust_string_lossy(scope)
        };
        assert_eq!(text, "done");
        assert!(runtime.execute_script("<next>", "1 + 1").is_ok());
    }
}
