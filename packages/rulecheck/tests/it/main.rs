//! Integration tests for the rulecheck binary.
//!
//! Each test builds a throwaway project in a temporary directory, writes a
//! `.rules.yaml` and some source files into it, and runs the binary there.

mod check;
mod test_cmd;
mod validate;

use std::fs;
use std::path::Path;

use indoc::indoc;
use tempfile::TempDir;
use xshell::{Shell, cmd};

/// Rules shared by most tests.
pub const RULES: &str = indoc! {r#"
    - name: no-console-log
      description: Disallow console.log in JS/TS
      filters:
        - kind: file_extension
          pattern: "\\.(js|ts)$"
        - kind: content
          pattern: "console\\.log\\("
      actions:
        - kind: enforce
          message: "Remove console.log before committing"

    - name: ts-class-naming
      filters:
        - kind: file_extension
          pattern: "\\.ts$"
        - kind: content
          pattern: "class (?P<name>[a-z]\\w*)"
      actions:
        - kind: suggest
          message: "Class {{ $name }} should be PascalCase"
"#};

/// Create a temporary project containing `.rules.yaml` and the given files.
pub fn setup_project(rules_yaml: &str, files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    fs::write(dir.path().join(".rules.yaml"), rules_yaml).expect("write rules");
    for (name, content) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(path, content).expect("write file");
    }
    dir
}

/// Run rulecheck in `dir` with the given arguments.
///
/// The user-level config directory is redirected into `dir` so rules on the
/// machine running the tests do not leak in.
///
/// Returns (exit_code, stdout, stderr).
pub fn run_rulecheck(dir: &Path, args: &[&str]) -> (i32, String, String) {
    let sh = Shell::new().expect("create shell");
    sh.change_dir(dir);
    sh.set_var("XDG_CONFIG_HOME", dir.join(".config"));
    sh.set_var("HOME", dir);

    let binary = env!("CARGO_BIN_EXE_rulecheck");
    let output = cmd!(sh, "{binary} {args...}")
        .env_remove("RULECHECK_RULES")
        .env_remove("RULECHECK_LOG")
        .ignore_status()
        .quiet()
        .output()
        .expect("run rulecheck");

    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}
