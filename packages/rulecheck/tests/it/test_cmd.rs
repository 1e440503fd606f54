//! `rulecheck test` tests.

use pretty_assertions::assert_eq as pretty_assert_eq;

use crate::{RULES, run_rulecheck, setup_project};

#[test]
fn test_rule_match() {
    let project = setup_project(RULES, &[]);
    let (exit_code, stdout, _stderr) = run_rulecheck(
        project.path(),
        &[
            "test",
            "--rule",
            "no-console-log",
            "--file",
            "app.ts",
            "--content",
            "let a = 1;\nconsole.log(a);\n",
        ],
    );

    pretty_assert_eq!(exit_code, 0);
    assert!(stdout.contains("Result: Matched"), "got: {stdout}");
    assert!(
        stdout.contains("enforce: Remove console.log before committing"),
        "got: {stdout}"
    );
    assert!(stdout.contains("console.log(a)"), "expected a snippet, got: {stdout}");
}

#[test]
fn test_rule_no_match() {
    let project = setup_project(RULES, &[]);
    let (exit_code, stdout, _stderr) = run_rulecheck(
        project.path(),
        &["test", "--rule", "no-console-log", "--file", "app.py", "--content", "console.log(1)"],
    );

    pretty_assert_eq!(exit_code, 0);
    assert!(stdout.contains("Result: Not matched"), "got: {stdout}");
}

#[test]
fn test_content_file() {
    let project = setup_project(RULES, &[("model.ts", "class account {}\n")]);
    let (exit_code, stdout, _stderr) = run_rulecheck(
        project.path(),
        &["test", "--rule", "ts-class-naming", "--file", "model.ts", "--content-file", "model.ts"],
    );

    pretty_assert_eq!(exit_code, 0);
    assert!(stdout.contains("Class account should be PascalCase"), "got: {stdout}");
}

#[test]
fn test_rule_not_found() {
    let project = setup_project(RULES, &[]);
    let (exit_code, _stdout, stderr) =
        run_rulecheck(project.path(), &["test", "--rule", "nope", "--content", "x"]);

    pretty_assert_eq!(exit_code, 1);
    assert!(stderr.contains("Rule 'nope' not found"), "got: {stderr}");
}

#[test]
fn test_content_file_truncation_is_reported() {
    let project = setup_project(RULES, &[("big.ts", "const a = 1;\nconsole.log(a);\n")]);
    let (exit_code, stdout, stderr) = run_rulecheck(
        project.path(),
        &[
            "test",
            "--rule",
            "no-console-log",
            "--file",
            "big.ts",
            "--content-file",
            "big.ts",
            "--max-bytes",
            "8",
        ],
    );

    pretty_assert_eq!(exit_code, 0);
    assert!(stdout.contains("Result: Not matched"), "got: {stdout}");
    assert!(stderr.contains("content truncated to the first 8 bytes"), "got: {stderr}");
}
