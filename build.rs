//! Build script for `asg`.
//!
//! Emits `VERGEN_*` variables (build date, rustc version, target triple) that
//! `asg --version` prints. Missing metadata is a warning, never a build error.

use vergen_gix::{BuildBuilder, CargoBuilder, Emitter, RustcBuilder};

fn main() {
    let mut emitter = Emitter::default();

    match BuildBuilder::default().build_timestamp(true).build() {
        Ok(build) => {
            if let Err(e) = emitter.add_instructions(&build) {
                println!("cargo:warning=build timestamp unavailable: {e}");
            }
        }
        Err(e) => println!("cargo:warning=build timestamp unavailable: {e}"),
    }

    match CargoBuilder::default().target_triple(true).build() {
        Ok(cargo) => {
            if let Err(e) = emitter.add_instructions(&cargo) {
                println!("cargo:warning=target triple unavailable: {e}");
            }
        }
        Err(e) => println!("cargo:warning=target triple unavailable: {e}"),
    }

    match RustcBuilder::default().semver(true).build() {
        Ok(rustc) => {
            if let Err(e) = emitter.add_instructions(&rustc) {
                println!("cargo:warning=rustc version unavailable: {e}");
            }
        }
        Err(e) => println!("cargo:warning=rustc version unavailable: {e}"),
    }

    if let Err(e) = emitter.emit() {
        println!("cargo:warning=vergen emit failed: {e}");
    }
}
