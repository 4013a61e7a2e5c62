//! Public compiler API: strings in, CSS out, with file plumbing on top.

use crate::config::{CompileOptions, CompilerConfig};
use crate::error::LessError;
use crate::evaluate::evaluate;
use crate::ops::ConsoleOutput;
use crate::request::CompileRequest;
use crate::runtime::create_runtime;
use deno_core::JsRuntime;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Compiles LESS input into CSS, using less.js on V8.
///
/// Each instance owns its own isolate, so it is neither `Send` nor `Sync`:
/// create one per thread that needs to compile.
pub struct LessCompiler {
    runtime: JsRuntime,
    config: CompilerConfig,
}

impl LessCompiler {
    /// Create a compiler from [`CompilerConfig::from_env`].
    pub fn new() -> Result<Self, LessError> {
        Self::with_config(CompilerConfig::from_env())
    }

    pub fn with_config(config: CompilerConfig) -> Result<Self, LessError> {
        let runtime = create_runtime(&config)?;
        Ok(Self { runtime, config })
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile the LESS file `input` and write the CSS to `output`.
    ///
    /// `@import`s resolve against the input's directory. The output is only
    /// replaced once compilation has succeeded.
    pub fn compile_file(&mut self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<(), LessError> {
        let css = self.compile_path(input)?;
        write_css(output.as_ref(), &css)
    }

    /// Compile the LESS file `input` and return the CSS.
    ///
    /// Errors name the file by its base name; `@import`s resolve against its directory.
    pub fn compile_path(&mut self, input: impl AsRef<Path>) -> Result<String, LessError> {
        let input = input.as_ref();

        let source = fs::read_to_string(input).map_err(|source| match source.kind() {
            ErrorKind::NotFound => LessError::InputNotFound {
                path: input.to_path_buf(),
                source,
            },
            _ => LessError::InputRead {
                path: input.to_path_buf(),
                source,
            },
        })?;

        let filename = input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.display().to_string());

        let base_dir = input
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let request = CompileRequest::new(&filename, &source).with_base_dir(base_dir);

        let options = self.config.options.clone();
        self.compile_with(&request, &options)
    }

    /// Compile inline LESS input, reported as `(inline input)` in errors.
    pub fn compile_str(&mut self, input: &str) -> Result<String, LessError> {
        let options = self.config.options.clone();
        self.compile_with(&CompileRequest::inline(input), &options)
    }

    /// Compile LESS input, reporting `filename` in errors.
    pub fn compile_named(&mut self, filename: &str, input: &str) -> Result<String, LessError> {
        let options = self.config.options.clone();
        self.compile_with(&CompileRequest::new(filename, input), &options)
    }

    /// Compile a request with explicit options.
    pub fn compile_with(
        &mut self,
        request: &CompileRequest<'_>,
        options: &CompileOptions,
    ) -> Result<String, LessError> {
        let script = request.to_script(options)?;
        evaluate(&mut self.runtime, request, script, self.config.timeout_ms)
    }

    /// Console output captured since the last call.
    pub fn take_console(&mut self) -> ConsoleOutput {
        let state = self.runtime.op_state();
        let mut state = state.borrow_mut();
        std::mem::take(state.borrow_mut::<ConsoleOutput>())
    }
}

/// Write `css` next to `output` and rename it into place.
///
/// An existing output keeps its permissions; a new one is created `0644`
/// on unix instead of the temp file's `0600`.
pub fn write_css(output: &Path, css: &str) -> Result<(), LessError> {
    let write_error = |source: std::io::Error| LessError::OutputWrite {
        path: output.to_path_buf(),
        source,
    };

    let dir = output
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
    file.write_all(css.as_bytes()).map_err(write_error)?;
    file.flush().map_err(write_error)?;
    if let Some(permissions) = output_permissions(output) {
        file.as_file().set_permissions(permissions).map_err(write_error)?;
    }
    file.persist(output).map_err(|e| write_error(e.error))?;

    Ok(())
}

/// Permissions for the renamed file: the existing output's, else `0644` on unix.
fn output_permissions(output: &Path) -> Option<fs::Permissions> {
    if let Ok(meta) = fs::metadata(output) {
        return Some(meta.permissions());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        Some(fs::Permissions::from_mode(0o644))
    }
    #[cfg(not(unix))]
    {
        None
    }
}
