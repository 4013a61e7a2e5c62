//! Compiler configuration: defaults plus an environment overlay.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

/// Options forwarded to less.js for a single compile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    /// Minify the generated CSS
    pub compress: bool,
    /// Only evaluate math inside parentheses
    pub strict_math: bool,
    /// Fail on incompatible units instead of guessing
    pub strict_units: bool,
    /// Variables prepended to the source (overridable by the source)
    pub global_vars: BTreeMap<String, String>,
    /// Variables appended to the source (override the source)
    pub modify_vars: BTreeMap<String, String>,
    /// Escape line breaks instead of collapsing whitespace runs
    pub preserve_whitespace: bool,
}

/// Configuration for a [`crate::LessCompiler`]
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// less.js script evaluated on top of the environment shim
    /// (None = the copy compiled into the crate, see [`crate::bundled_less_js`])
    pub less_script: Option<PathBuf>,
    /// Maximum heap size in bytes (default: 64MB, None = unlimited)
    pub max_heap_size: Option<usize>,
    /// Maximum time for a single compile in milliseconds (default: 30000ms, None = unlimited)
    pub timeout_ms: Option<u64>,
    /// Options used by `compile_str`, `compile_named` and `compile_file`
    pub options: CompileOptions,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            less_script: None,
            max_heap_size: Some(64 * 1024 * 1024), // 64MB default
            timeout_ms: Some(30_000),              // 30 seconds default
            options: CompileOptions::default(),
        }
    }
}

impl CompilerConfig {
    /// Defaults overlaid with `LESSC_LESS_JS`, `LESSC_MAX_HEAP_MB` and `LESSC_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply(|key| env::var(key).ok());
        config
    }

    /// Overlay settings from `lookup`. Unparseable values are ignored.
    pub fn apply(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("LESSC_LESS_JS").filter(|v| !v.trim().is_empty()) {
            self.less_script = Some(PathBuf::from(path.trim()));
        }

        if let Some(mb) = lookup("LESSC_MAX_HEAP_MB").and_then(|v| v.trim().parse::<usize>().ok()) {
            self.max_heap_size = (mb > 0).then(|| mb * 1024 * 1024);
        }

        if let Some(ms) = lookup("LESSC_TIMEOUT_MS").and_then(|v| v.trim().parse::<u64>().ok()) {
            self.timeout_ms = (ms > 0).then_some(ms);
        }
    }
}

/// Parse a `NAME=VALUE` pair, as given on the command line.
pub fn parse_var(pair: &str) -> Option<(String, String)> {
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}
