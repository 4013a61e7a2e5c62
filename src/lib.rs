//! # lesscss
//!
//! Compiles LESS to CSS by running less.js inside an embedded V8 isolate
//! (deno_core).
//!
//! The crate does not parse LESS itself. It boots a runtime holding a small
//! browser environment shim plus less.js, turns each request into a one-shot
//! script, and takes care of reading and writing files.
//!
//! ## Sandbox
//!
//! - **No network access**: `@import` of http/https/data/blob URLs is refused
//! - **Imports stay in one directory**: the input file's directory, nothing above it
//! - **Console captured**: `console.*` from less.js is collected, not printed
//! - **Bounded**: heap limit and per-compile timeout (see [`CompilerConfig`])
//!
//! ## less.js
//!
//! `resources/less-1.7.0.js` is compiled into the crate when it is present at
//! build time. A script on disk can be used instead via `LESSC_LESS_JS` or
//! [`CompilerConfig::less_script`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lesscss::{CompilerConfig, LessCompiler};
//!
//! fn main() -> Result<(), lesscss::LessError> {
//!     let mut compiler = LessCompiler::with_config(CompilerConfig {
//!         less_script: Some("./vendor/less-1.7.0.js".into()),
//!         ..Default::default()
//!     })?;
//!
//!     let css = compiler.compile_str("@c: red; .a { color: @c; }")?;
//!     println!("{}", css);
//!
//!     compiler.compile_file("styles/site.less", "public/site.css")?;
//!     Ok(())
//! }
//! ```

mod compiler;
mod config;
mod error;
mod evaluate;
mod ops;
mod request;
mod runtime;
mod sanitize;

pub use compiler::{write_css, LessCompiler};
pub use config::{parse_var, CompileOptions, CompilerConfig};
pub use error::{BoxError, LessError, ScriptError};
pub use ops::ConsoleOutput;
pub use request::{encode_literal, CompileRequest, INLINE_FILENAME};
pub use runtime::{bundled_less_js, library_source};
