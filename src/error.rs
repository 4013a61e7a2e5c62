//! Errors reported by the compiler.

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed underlying cause.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// List of errors for this crate.
#[derive(Debug, Error)]
pub enum LessError {
    /// less.js could not be loaded into a fresh runtime.
    #[error("Unable to initialize LESS compiler: {message}")]
    Initialization {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Input file {name} doesn't exist", name = display_name(.path))]
    InputNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to read input file {}", .path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// less.js reported an error, or the engine raised an exception.
    #[error("Unable to process LESS input from {filename}")]
    Compile {
        filename: String,
        #[source]
        source: BoxError,
    },

    #[error("Compiling {filename} timed out after {ms}ms")]
    Timeout { filename: String, ms: u64 },

    #[error("Invalid LESS variable '{name}': {reason}")]
    InvalidVariable { name: String, reason: String },

    #[error("Unable to write compiled CSS to {}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LessError {
    /// The less.js error behind a `Compile` failure, if the script reported one.
    pub fn script_error(&self) -> Option<&ScriptError> {
        match self {
            LessError::Compile { source, .. } => source.downcast_ref::<ScriptError>(),
            _ => None,
        }
    }
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// An error object reported by less.js, as serialized by the environment shim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, deserialize_with = "position")]
    pub line: Option<u32>,
    #[serde(default, deserialize_with = "position")]
    pub column: Option<u32>,
    #[serde(default)]
    pub extract: Vec<Option<String>>,
}

/// Negative positions (less.js uses -1 for "unknown") become `None`.
fn position<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<i64>::deserialize(deserializer)?;
    Ok(value.and_then(|n| u32::try_from(n).ok()))
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Error: {}", self.kind, self.message)?;
        if let Some(filename) = &self.filename {
            write!(f, " in {}", filename)?;
        }
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, " on line {}, column {}", line, column),
            (Some(line), None) => write!(f, " on line {}", line),
            _ => Ok(()),
        }
    }
}

impl std::error::Error for ScriptError {}
