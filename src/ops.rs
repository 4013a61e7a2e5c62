//! Shared ops module - used by both build.rs (snapshot) and runtime.rs
//!
//! This module contains all custom ops and the extension! macro definition.
//! It must be importable by both the main crate and the build script, so it
//! only depends on crates listed in `[build-dependencies]` as well.

use anyhow::{anyhow, Error};
use deno_core::{op2, OpState};
use std::path::{Path, PathBuf};
use url::Url;

// ============================================================================
// Console Output Capture
// ============================================================================

/// Captured console output from the compiler runtime
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsoleOutput {
    pub logs: Vec<String>,
    pub warns: Vec<String>,
    pub errors: Vec<String>,
}

impl ConsoleOutput {
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty() && self.warns.is_empty() && self.errors.is_empty()
    }
}

#[op2(fast)]
pub fn op_console_log(state: &mut OpState, #[string] msg: &str) {
    if let Some(output) = state.try_borrow_mut::<ConsoleOutput>() {
        output.logs.push(msg.to_string());
    }
}

#[op2(fast)]
pub fn op_console_warn(state: &mut OpState, #[string] msg: &str) {
    if let Some(output) = state.try_borrow_mut::<ConsoleOutput>() {
        output.warns.push(msg.to_string());
    }
}

#[op2(fast)]
pub fn op_console_error(state: &mut OpState, #[string] msg: &str) {
    if let Some(output) = state.try_borrow_mut::<ConsoleOutput>() {
        output.errors.push(msg.to_string());
    }
}

// ============================================================================
// Sandboxed @import reads
// ============================================================================

/// Directory that `@import` requests from less.js may read from.
///
/// Security guarantees:
/// - No network access (http/https/data/blob URLs rejected)
/// - No filesystem escape (path traversal blocked via canonicalization)
/// - Only .less and .css files allowed
#[derive(Debug, Clone, Default)]
pub struct ImportRoot {
    dir: Option<PathBuf>,
}

impl ImportRoot {
    /// Allow imports from `dir` and everything below it.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, Error> {
        let canonical = dir
            .as_ref()
            .canonicalize()
            .map_err(|e| anyhow!("Failed to canonicalize import dir: {}", e))?;

        if !canonical.is_dir() {
            return Err(anyhow!("import dir must be a directory"));
        }

        Ok(Self { dir: Some(canonical) })
    }

    /// Refuse every import.
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// Base URL that relative imports are resolved against (`location.href`).
    pub fn base_url(&self) -> String {
        self.dir
            .as_ref()
            .and_then(|dir| Url::from_directory_path(dir).ok())
            .map(|url| url.to_string())
            .unwrap_or_else(|| String::from("file:///"))
    }

    /// Map an import URL requested by the script to a readable path.
    pub fn resolve(&self, href: &str) -> Result<PathBuf, Error> {
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| anyhow!("Imports are disabled for this input: {}", href))?;

        if href.starts_with("http://")
            || href.starts_with("https://")
            || href.starts_with("data:")
            || href.starts_with("blob:")
        {
            return Err(anyhow!("Remote imports are forbidden: {}", href));
        }

        let resolved = match Url::parse(href) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = Url::from_directory_path(dir)
                    .map_err(|_| anyhow!("Invalid import dir: {}", dir.display()))?;
                base.join(href)
                    .map_err(|e| anyhow!("Failed to resolve '{}': {}", href, e))?
            }
            Err(e) => return Err(anyhow!("Invalid import URL '{}': {}", href, e)),
        };

        if resolved.scheme() != "file" {
            return Err(anyhow!("Only file:// URLs allowed, got: {}", resolved.scheme()));
        }

        let path = resolved
            .to_file_path()
            .map_err(|_| anyhow!("Failed to convert URL to path: {}", resolved))?;

        let canonical = path
            .canonicalize()
            .map_err(|e| anyhow!("Cannot read '{}': {}", path.display(), e))?;

        if !canonical.starts_with(dir) {
            return Err(anyhow!(
                "Access denied: '{}' is outside the import directory",
                path.display()
            ));
        }

        if !matches!(
            canonical.extension().and_then(|e| e.to_str()),
            Some("less") | Some("css")
        ) {
            return Err(anyhow!(
                "Only .less and .css files can be imported, got: {}",
                path.display()
            ));
        }

        Ok(canonical)
    }
}

/// Backs the shim's synchronous XMLHttpRequest.
#[op2]
#[string]
pub fn op_read_import(state: &mut OpState, #[string] href: &str) -> Result<String, Error> {
    let path = match state.try_borrow::<ImportRoot>() {
        Some(root) => root.resolve(href)?,
        None => return Err(anyhow!("Imports are disabled: {}", href)),
    };

    std::fs::read_to_string(&path).map_err(|e| anyhow!("Failed to read '{}': {}", path.display(), e))
}

// ============================================================================
// Extension Definition
// ============================================================================

deno_core::extension!(
    lessc_runtime,
    ops = [
        op_console_log,
        op_console_warn,
        op_console_error,
        op_read_import,
    ],
    esm_entry_point = "ext:lessc_runtime/bootstrap.js",
    esm = ["ext:lessc_runtime/bootstrap.js" = "src/bootstrap.js"],
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_blocks_remote_urls() {
        let dir = tempdir().unwrap();
        let root = ImportRoot::new(dir.path()).unwrap();

        let result = root.resolve("https://evil.com/payload.less");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Remote imports are forbidden"));
    }

    #[test]
    fn test_blocks_path_traversal() {
        let outer = tempdir().unwrap();
        let inner = outer.path().join("styles");
        fs::create_dir(&inner).unwrap();
        fs::write(outer.path().join("secret.less"), "@x: 1;").unwrap();
        let root = ImportRoot::new(&inner).unwrap();

        let result = root.resolve("../secret.less");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("outside the import directory"));
    }

    #[test]
    fn test_allows_valid_imports() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("mixins.less"), ".m() {}").unwrap();
        let root = ImportRoot::new(dir.path()).unwrap();

        let relative = root.resolve("mixins.less").unwrap();
        assert!(relative.ends_with("mixins.less"));

        let absolute = format!("{}mixins.less", root.base_url());
        assert_eq!(root.resolve(&absolute).unwrap(), relative);
    }

    #[test]
    fn test_blocks_other_extensions() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("data.json"), "{}").unwrap();
        let root = ImportRoot::new(dir.path()).unwrap();

        let result = root.resolve("data.json");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Only .less and .css"));
    }

    #[test]
    fn test_disabled_root_refuses_everything() {
        let root = ImportRoot::disabled();
        assert_eq!(root.base_url(), "file:///");
        assert!(root.resolve("anything.less").is_err());
    }

    #[test]
    fn test_base_url_ends_with_slash() {
        let dir = tempdir().unwrap();
        let root = ImportRoot::new(dir.path()).unwrap();
        assert!(root.base_url().starts_with("file://"));
        assert!(root.base_url().ends_with('/'));
    }
}
