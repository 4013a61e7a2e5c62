//! Validate global/modify variables before they are handed to less.js.
//!
//! less.js splices these into the source text as `@name: value;`, so a value
//! carrying braces or line breaks could inject whole rulesets.

use crate::error::LessError;
use std::collections::BTreeMap;

/// Maximum number of variables accepted per map
const MAX_VARS: usize = 256;

/// Check every entry of a variable map.
///
/// # Errors
/// Returns [`LessError::InvalidVariable`] if:
/// - A name is not a LESS identifier (optionally prefixed with `@`)
/// - A value is empty, contains `{`, `}` or a line break, or has a `;` anywhere but last
/// - The map holds more than MAX_VARS (256) entries
pub fn sanitize_vars(vars: &BTreeMap<String, String>) -> Result<(), LessError> {
    if vars.len() > MAX_VARS {
        return Err(LessError::InvalidVariable {
            name: format!("({} variables)", vars.len()),
            reason: format!("at most {} variables may be passed", MAX_VARS),
        });
    }

    for (name, value) in vars {
        check_name(name)?;
        check_value(name, value)?;
    }
    Ok(())
}

fn check_name(name: &str) -> Result<(), LessError> {
    let ident = name.strip_prefix('@').unwrap_or(name);
    let mut chars = ident.chars();

    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '-' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(invalid(name, "names may only contain letters, digits, '-' and '_'"))
    }
}

fn check_value(name: &str, value: &str) -> Result<(), LessError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(name, "value is empty"));
    }

    if let Some(c) = trimmed.chars().find(|c| matches!(c, '{' | '}' | '\n' | '\r')) {
        return Err(invalid(name, &format!("value may not contain {:?}", c)));
    }

    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    if body.contains(';') {
        return Err(invalid(name, "';' is only allowed at the end of a value"));
    }

    Ok(())
}

fn invalid(name: &str, reason: &str) -> LessError {
    LessError::InvalidVariable {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
