//! Request formatting: turn a filename and LESS source into one script fragment.

use crate::config::CompileOptions;
use crate::error::LessError;
use crate::sanitize::sanitize_vars;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Name reported for input that did not come from a file.
pub const INLINE_FILENAME: &str = "(inline input)";

/// A single compile request
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    /// Logical filename, used by less.js in error messages
    pub filename: &'a str,
    /// Raw LESS source
    pub source: &'a str,
    /// Directory `@import`s resolve against (None = imports refused)
    pub base_dir: Option<&'a Path>,
}

impl<'a> CompileRequest<'a> {
    pub fn new(filename: &'a str, source: &'a str) -> Self {
        Self {
            filename,
            source,
            base_dir: None,
        }
    }

    pub fn inline(source: &'a str) -> Self {
        Self::new(INLINE_FILENAME, source)
    }

    pub fn with_base_dir(mut self, dir: &'a Path) -> Self {
        self.base_dir = Some(dir);
        self
    }

    /// Build the script that runs less.js over this request.
    ///
    /// The fragment evaluates to a JSON string: `{"css": ...}` on success or
    /// `{"error": {...}}` when less.js reports a problem. Shape:
    ///
    /// ```js
    /// (function () {
    ///   var result = { css: null, error: null };
    ///   var parser = new less.Parser(Object.assign(PARSER_OPTIONS, { filename: 'FILENAME' }));
    ///   try {
    ///     parser.parse('SOURCE', function (err, tree) {
    ///       if (err) { result.error = err; return; }
    ///       result.css = tree.toCSS(CSS_OPTIONS);
    ///     }, PARSE_OPTIONS);
    ///   } catch (e) {
    ///     result.error = e;
    ///   }
    ///   return __lessc_settle__(result);
    /// })();
    /// ```
    pub fn to_script(&self, options: &CompileOptions) -> Result<String, LessError> {
        sanitize_vars(&options.global_vars)?;
        sanitize_vars(&options.modify_vars)?;

        let parser_options = json!({
            "strictMath": options.strict_math,
            "strictUnits": options.strict_units,
        });
        let css_options = json!({
            "compress": options.compress,
            "strictMath": options.strict_math,
            "strictUnits": options.strict_units,
        });
        let parse_options = json!({
            "globalVars": vars_or_null(&options.global_vars),
            "modifyVars": vars_or_null(&options.modify_vars),
        });

        let filename = encode_literal(self.filename, false);
        let source = encode_literal(self.source, options.preserve_whitespace);

        Ok(format!(
            "(function () {{ var result = {{ css: null, error: null }}; \
             var parser = new less.Parser(Object.assign({parser_options}, {{ filename: '{filename}' }})); \
             try {{ parser.parse('{source}', function (err, tree) {{ \
             if (err) {{ result.error = err; return; }} \
             result.css = tree.toCSS({css_options}); }}, {parse_options}); }} \
             catch (e) {{ result.error = e; }} \
             return globalThis.__lessc_settle__(result); }})();"
        ))
    }
}

// less.js prepends a newline for any truthy globalVars, so empty maps go out as null
fn vars_or_null(vars: &BTreeMap<String, String>) -> Value {
    if vars.is_empty() {
        Value::Null
    } else {
        json!(vars)
    }
}

/// Escape `text` for a single-quoted script literal.
///
/// Backslashes and single quotes are escaped. Whitespace runs collapse to a
/// single space unless `preserve_whitespace` is set, in which case line breaks
/// become `\n`/`\r` escapes and everything else is kept.
pub fn encode_literal(text: &str, preserve_whitespace: bool) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_space = false;

    for c in text.chars() {
        if !preserve_whitespace && c.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
            continue;
        }
        in_space = false;

        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_quotes_and_backslashes() {
        assert_eq!(encode_literal("content: 'x';", false), "content: \\'x\\';");
        assert_eq!(encode_literal(r"\9", false), r"\\9");
        // A trailing backslash must not swallow the closing quote
        assert_eq!(encode_literal(r"a\", false), r"a\\");
    }

    #[test]
    fn test_collapses_whitespace_runs() {
        assert_eq!(
            encode_literal(".a {\n\t color:  red;\r\n}\n", false),
            ".a { color: red; } "
        );
    }

    #[test]
    fn test_collapse_is_idempotent() {
        let once = encode_literal("@c:\tred;\n\n.a {\n  color: @c;\n}", false);
        assert_eq!(encode_literal(&once, false), once);
        assert_eq!(once, "@c: red; .a { color: @c; }");
    }

    #[test]
    fn test_preserve_whitespace_escapes_line_breaks() {
        let encoded = encode_literal("// note\n.a {\r\n\tcolor: red;\n}", true);
        assert_eq!(encoded, "// note\\n.a {\\r\\n\tcolor: red;\\n}");
        assert!(!encoded.contains('\n'));
    }

    #[test]
    fn test_script_embeds_filename_and_source() {
        let request = CompileRequest::new("site's.less", ".a { color: red; }");
        let script = request.to_script(&CompileOptions::default()).unwrap();

        assert!(script.contains("filename: 'site\\'s.less'"));
        assert!(script.contains("parser.parse('.a { color: red; }'"));
        assert!(script.contains("\"globalVars\":null"));
        assert!(script.contains("__lessc_settle__"));
        assert!(!script.contains('\n'));
    }

    #[test]
    fn test_script_forwards_options() {
        let mut options = CompileOptions {
            compress: true,
            strict_math: true,
            ..Default::default()
        };
        options.modify_vars.insert("brand".into(), "blue".into());

        let script = CompileRequest::inline("").to_script(&options).unwrap();
        assert!(script.contains("\"compress\":true"));
        assert!(script.contains("\"strictMath\":true"));
        assert!(script.contains("\"modifyVars\":{\"brand\":\"blue\"}"));
        assert!(script.contains("filename: '(inline input)'"));
    }

    #[test]
    fn test_script_rejects_bad_vars() {
        let mut options = CompileOptions::default();
        options.global_vars.insert("x".into(), "1; } .evil {".into());

        let result = CompileRequest::inline(".a{}").to_script(&options);
        assert!(matches!(result, Err(LessError::InvalidVariable { .. })));
    }

    #[test]
    fn test_source_cannot_break_out_of_literal() {
        let script = CompileRequest::inline("'); throw 1; ('")
            .to_script(&CompileOptions::default())
            .unwrap();
        assert!(script.contains("parser.parse('\\'); throw 1; (\\''"));
    }
}
