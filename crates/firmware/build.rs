// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // cortex-m-rt's link.x INCLUDEs both scripts from the link search path.
    for script in ["memory.x", "device.x"] {
        let src = manifest_dir.join(script);
        fs::copy(&src, out_dir.join(script)).expect("copy linker script into OUT_DIR");
        println!("cargo:rerun-if-changed={}", src.display());
    }

    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
}
