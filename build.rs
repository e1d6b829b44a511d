//! Build script - places the nRF52840 + S140 linker script where the
//! linker can find it when building the firmware.
//!
//! Host builds (library + tests) skip this entirely.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");

    // Only the `embedded` feature links against cortex-m-rt.
    if env::var_os("CARGO_FEATURE_EMBEDDED").is_none() {
        return;
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    fs::copy("memory.x", out_dir.join("memory.x")).expect("memory.x must exist at the crate root");

    println!("cargo:rustc-link-search={}", out_dir.display());
}
