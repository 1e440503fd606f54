//! Build script for rulecheck that generates version information.
//!
//! Uses `git describe --always --tags --dirty` when building from a git
//! checkout, and falls back to the package version otherwise (for example when
//! building from a published crate or a source tarball).

use std::env;
use std::iter;
use std::process::Command;

fn main() {
    let version = git_describe().unwrap_or_else(|error| {
        println!("cargo:warning=falling back to package version: {error}");
        env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| String::from("unknown"))
    });

    println!("cargo:rustc-env=RULECHECK_VERSION={version}");
    println!("cargo:rerun-if-changed=build.rs");
}

fn run(prog: &str, argv: &[&str]) -> Result<String, String> {
    let invocation = iter::once(prog)
        .chain(argv.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");

    let output = Command::new(prog)
        .args(argv)
        .output()
        .map_err(|e| format!("failed to execute `{invocation}`: {e}"))?;
    if !output.status.success() {
        return Err(format!("`{invocation}` exited with non-zero status"));
    }

    let output = String::from_utf8(output.stdout)
        .map_err(|e| format!("could not parse output of `{invocation}` as UTF-8: {e}"))?;
    Ok(output.trim_end().to_string())
}

fn git_describe() -> Result<String, String> {
    run("git", &["describe", "--always", "--tags", "--dirty=-dirty"])
}
