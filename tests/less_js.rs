//! End-to-end tests against the real less.js.
//!
//! These need less.js 1.7, either bundled from `resources/less-1.7.0.js` at
//! build time or named by `LESSC_LESS_JS`. Run them with `--ignored`.

use lesscss::{CompileOptions, CompileRequest, LessCompiler, LessError};
use std::fs;
use tempfile::tempdir;

fn real_compiler() -> LessCompiler {
    LessCompiler::new().expect("less.js 1.7 should load (bundle resources/less-1.7.0.js or set LESSC_LESS_JS)")
}

fn squash(css: &str) -> String {
    css.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[test]
#[ignore = "needs less.js 1.7 (resources/less-1.7.0.js or LESSC_LESS_JS)"]
fn test_plain_rule() {
    let mut compiler = real_compiler();
    let css = compiler.compile_str(".a { color: red; }").unwrap();
    assert_eq!(squash(&css), ".a { color: red; }");
}

#[test]
#[ignore = "needs less.js 1.7 (resources/less-1.7.0.js or LESSC_LESS_JS)"]
fn test_variable() {
    let mut compiler = real_compiler();
    let css = compiler.compile_str("@c: red; .a { color: @c; }").unwrap();
    assert_eq!(squash(&css), ".a { color: red; }");
}

#[test]
#[ignore = "needs less.js 1.7 (resources/less-1.7.0.js or LESSC_LESS_JS)"]
fn test_nesting_and_mixins() {
    let mut compiler = real_compiler();
    let css = compiler
        .compile_str(".rounded(@r: 2px) { border-radius: @r; }\n.nav { .item { .rounded(4px); } }")
        .unwrap();
    assert_eq!(squash(&css), ".nav .item { border-radius: 4px; }");
}

#[test]
#[ignore = "needs less.js 1.7 (resources/less-1.7.0.js or LESSC_LESS_JS)"]
fn test_unbalanced_braces() {
    let mut compiler = real_compiler();
    let err = compiler.compile_named("broken.less", ".a { color: red;").unwrap_err();
    assert!(matches!(err, LessError::Compile { .. }));
    assert!(err.to_string().contains("broken.less"), "got {}", err);
}

#[test]
#[ignore = "needs less.js 1.7 (resources/less-1.7.0.js or LESSC_LESS_JS)"]
fn test_undefined_variable() {
    let mut compiler = real_compiler();
    let err = compiler.compile_str(".a { color: @missing; }").unwrap_err();
    let script_error = err.script_error().expect("less.js error details");
    assert!(script_error.message.contains("@missing"), "got {}", script_error);
}

#[test]
#[ignore = "needs less.js 1.7 (resources/less-1.7.0.js or LESSC_LESS_JS)"]
fn test_quotes_in_strings() {
    let mut compiler = real_compiler();
    let css = compiler
        .compile_str(".q:before { content: 'a \"b\"'; } .r { content: \"it's\"; }")
        .unwrap();
    assert!(css.contains("content: 'a \"b\"';"), "got {}", css);
    assert!(css.contains("content: \"it's\";"), "got {}", css);
}

#[test]
#[ignore = "needs less.js 1.7 (resources/less-1.7.0.js or LESSC_LESS_JS)"]
fn test_compress_and_vars() {
    let mut compiler = real_compiler();
    let mut options = CompileOptions {
        compress: true,
        ..Default::default()
    };
    options.global_vars.insert("brand".into(), "#ff0000".into());

    let css = compiler
        .compile_with(&CompileRequest::inline(".a { color: @brand; }"), &options)
        .unwrap();
    assert_eq!(css.trim(), ".a{color:#f00}");
}

#[test]
#[ignore = "needs less.js 1.7 (resources/less-1.7.0.js or LESSC_LESS_JS)"]
fn test_line_comments_need_preserved_whitespace() {
    let mut compiler = real_compiler();
    let options = CompileOptions {
        preserve_whitespace: true,
        ..Default::default()
    };
    let css = compiler
        .compile_with(
            &CompileRequest::inline("// header\n.a { color: red; }\n"),
            &options,
        )
        .unwrap();
    assert_eq!(squash(&css), ".a { color: red; }");
}

#[test]
#[ignore = "needs less.js 1.7 (resources/less-1.7.0.js or LESSC_LESS_JS)"]
fn test_file_round_trip_with_import() {
    let mut compiler = real_compiler();
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("colors.less"), "@c: blue;").unwrap();
    fs::write(dir.path().join("site.less"), "@import \"colors.less\";\n.a { color: @c; }").unwrap();

    let output = dir.path().join("site.css");
    compiler.compile_file(dir.path().join("site.less"), &output).unwrap();

    assert_eq!(squash(&fs::read_to_string(&output).unwrap()), ".a { color: blue; }");
}

#[test]
#[ignore = "needs less.js 1.7 (resources/less-1.7.0.js or LESSC_LESS_JS)"]
fn test_import_outside_directory_is_refused() {
    let mut compiler = real_compiler();
    let outer = tempdir().unwrap();
    let inner = outer.path().join("styles");
    fs::create_dir(&inner).unwrap();
    fs::write(outer.path().join("secret.less"), "@c: red;").unwrap();
    fs::write(inner.join("site.less"), "@import \"../secret.less\";\n.a { color: @c; }").unwrap();

    let output = inner.join("site.css");
    let err = compiler.compile_file(inner.join("site.less"), &output).unwrap_err();
    assert!(matches!(err, LessError::Compile { .. }));
    assert!(!output.exists());
}
