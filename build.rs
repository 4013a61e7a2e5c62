//! Build script to create the V8 snapshot used by every compiler instance.
//!
//! The environment shim (`src/bootstrap.js`) is evaluated here, at build time,
//! so constructing a compiler only has to deserialize the snapshot and then
//! evaluate less.js on top of it.
//!
//! `resources/less-1.7.0.js`, when present, is copied into `OUT_DIR` and
//! compiled into the crate. Without it the bundled script is empty and a
//! script path has to be configured at runtime.

use std::env;
use std::path::{Path, PathBuf};

// Include the shared ops module using #[path] attribute
// This ensures ops are IDENTICAL between build.rs and runtime
#[path = "src/ops.rs"]
mod ops;

fn main() {
    println!("cargo:rerun-if-changed=src/bootstrap.js");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/ops.rs");
    println!("cargo:rerun-if-changed=resources");

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let snapshot_path = out_dir.join("LESSC_SNAPSHOT.bin");

    bundle_less_js(&out_dir);

    let snapshot = deno_core::snapshot::create_snapshot(
        deno_core::snapshot::CreateSnapshotOptions {
            cargo_manifest_dir: env!("CARGO_MANIFEST_DIR"),
            startup_snapshot: None,
            skip_op_registration: false,
            extensions: vec![ops::lessc_runtime::init_ops_and_esm()],
            with_runtime_cb: None,
            extension_transpiler: None,
        },
        None, // No warmup script
    )
    .expect("Failed to create snapshot");

    std::fs::write(&snapshot_path, snapshot.output).expect("Failed to write snapshot");

    println!(
        "cargo:warning=Snapshot created at {:?} ({} bytes)",
        snapshot_path,
        std::fs::metadata(&snapshot_path).map(|m| m.len()).unwrap_or(0)
    );
}

/// Copy less.js into `OUT_DIR` for `include_str!`, or leave an empty file there.
fn bundle_less_js(out_dir: &Path) {
    let source = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("resources")
        .join("less-1.7.0.js");
    let target = out_dir.join("less-1.7.0.js");

    if source.is_file() {
        std::fs::copy(&source, &target).expect("Failed to bundle less.js");
    } else {
        std::fs::write(&target, "").expect("Failed to write empty less.js placeholder");
        println!(
            "cargo:warning=No less.js bundled: {} not found (set LESSC_LESS_JS at runtime)",
            source.display()
        );
    }
}
