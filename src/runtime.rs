//! Runtime bootstrap - a V8 isolate holding the environment shim and less.js.
//!
//! The shim comes from the startup snapshot built by `build.rs`. less.js is
//! either the copy compiled into the crate or a configured script read from
//! disk (once per path per process), and is evaluated on top of the shim.

use crate::config::CompilerConfig;
use crate::error::LessError;
use crate::ops::{lessc_runtime, ConsoleOutput, ImportRoot};
use deno_core::{v8, JsRuntime, RuntimeOptions};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

static RUNTIME_SNAPSHOT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/LESSC_SNAPSHOT.bin"));

/// `resources/less-1.7.0.js` as it was at build time (empty when it was absent).
static BUNDLED_LESS_JS: &str = include_str!(concat!(env!("OUT_DIR"), "/less-1.7.0.js"));

/// Library sources already read by this process, keyed by path.
static LIBRARY_SOURCES: OnceLock<Mutex<HashMap<PathBuf, Arc<str>>>> = OnceLock::new();

/// Read a library script, reusing the text if another compiler already loaded it.
pub fn library_source(path: &Path) -> Result<Arc<str>, LessError> {
    let cache = LIBRARY_SOURCES.get_or_init(Default::default);

    if let Some(source) = cache.lock().ok().and_then(|sources| sources.get(path).cloned()) {
        return Ok(source);
    }

    let text = std::fs::read_to_string(path).map_err(|e| LessError::Initialization {
        message: format!("cannot read {}", path.display()),
        source: Some(Box::new(e)),
    })?;
    let source: Arc<str> = Arc::from(text);

    if let Ok(mut sources) = cache.lock() {
        sources.entry(path.to_path_buf()).or_insert_with(|| source.clone());
    }
    Ok(source)
}

/// less.js compiled into the crate, if one was present when it was built.
pub fn bundled_less_js() -> Option<&'static str> {
    Some(BUNDLED_LESS_JS).filter(|source| !source.trim().is_empty())
}

/// The configured less.js source and the name it is reported under.
fn less_source(config: &CompilerConfig) -> Result<(Arc<str>, String), LessError> {
    match &config.less_script {
        Some(path) => Ok((library_source(path)?, path.display().to_string())),
        None => bundled_less_js()
            .map(|source| (Arc::from(source), String::from("bundled less-1.7.0.js")))
            .ok_or_else(|| LessError::Initialization {
                message: String::from(
                    "no less.js was bundled at build time (resources/less-1.7.0.js); \
                     set LESSC_LESS_JS or pass --less-js",
                ),
                source: None,
            }),
    }
}

/// Create a runtime with less.js loaded and ready for compile requests.
pub fn create_runtime(config: &CompilerConfig) -> Result<JsRuntime, LessError> {
    let (less_js, script_name) = less_source(config)?;

    // Configure V8 heap limits if specified
    let create_params = config
        .max_heap_size
        .map(|max_bytes| v8::Isolate::create_params().heap_limits(0, max_bytes));

    let mut runtime = JsRuntime::new(RuntimeOptions {
        startup_snapshot: Some(RUNTIME_SNAPSHOT),
        extensions: vec![lessc_runtime::init_ops()],
        create_params,
        ..Default::default()
    });

    if config.max_heap_size.is_some() {
        runtime.add_near_heap_limit_callback(|current, initial| {
            // Don't raise the limit; let V8 fail the running script instead
            eprintln!(
                "[lessc] Near heap limit: current={}MB, initial={}MB",
                current / (1024 * 1024),
                initial / (1024 * 1024)
            );
            current
        });
    }

    runtime.op_state().borrow_mut().put(ConsoleOutput::default());
    runtime.op_state().borrow_mut().put(ImportRoot::disabled());

    runtime
        .execute_script("less.js", less_js.to_string())
        .map_err(|e| LessError::Initialization {
            message: format!("evaluating {} failed", script_name),
            source: Some(e.into()),
        })?;

    let ready = runtime
        .execute_script(
            "<lessc-probe>",
            "typeof less === 'object' && typeof less.Parser === 'function'",
        )
        .map_err(|e| LessError::Initialization {
            message: String::from("probing for less.Parser failed"),
            source: Some(e.into()),
        })?;

    let has_parser = {
        let scope = &mut runtime.handle_scope();
        v8::Local::new(scope, &ready).is_true()
    };
    if !has_parser {
        return Err(LessError::Initialization {
            message: format!("{} did not define less.Parser", script_name),
            source: None,
        });
    }

    Ok(runtime)
}
