//! `rulecheck check` tests.

use pretty_assertions::assert_eq as pretty_assert_eq;
use simple_test_case::test_case;

use crate::{RULES, run_rulecheck, setup_project};

#[test_case("app.ts", "console.log(\"hi\");\n", 1; "ts with console log")]
#[test_case("app.js", "const x = 1;\nconsole.log(x);\n", 1; "js with console log")]
#[test_case("app.py", "console.log(\"hi\");\n", 0; "wrong extension")]
#[test_case("app.ts", "const x = 1;\n", 0; "clean file")]
#[test]
fn test_exit_code(file: &str, content: &str, expected: i32) {
    let project = setup_project(RULES, &[(file, content)]);
    let (exit_code, stdout, stderr) = run_rulecheck(project.path(), &["check"]);
    pretty_assert_eq!(exit_code, expected, "stdout: {stdout}\nstderr: {stderr}");
}

#[test]
fn test_reports_location_and_message() {
    let project = setup_project(RULES, &[("app.js", "const x = 1;\nconsole.log(x);\n")]);
    let (exit_code, stdout, _stderr) = run_rulecheck(project.path(), &["check", "app.js"]);

    pretty_assert_eq!(exit_code, 1);
    assert!(
        stdout.contains("app.js:2 [no-console-log] enforce: Remove console.log before committing"),
        "expected a report line, got: {stdout}"
    );
}

#[test]
fn test_suggest_does_not_fail_by_default() {
    let project = setup_project(RULES, &[("model.ts", "class user {}\n")]);
    let (exit_code, stdout, _stderr) = run_rulecheck(project.path(), &["check"]);

    pretty_assert_eq!(exit_code, 0, "suggestions alone should not fail: {stdout}");
    assert!(
        stdout.contains("[ts-class-naming] suggest: Class user should be PascalCase"),
        "expected an interpolated suggestion, got: {stdout}"
    );
}

#[test]
fn test_fail_on_suggest() {
    let project = setup_project(RULES, &[("model.ts", "class user {}\n")]);
    let (exit_code, _stdout, _stderr) =
        run_rulecheck(project.path(), &["check", "--fail-on", "suggest"]);
    pretty_assert_eq!(exit_code, 1);
}

#[test]
fn test_json_output() {
    let project = setup_project(RULES, &[("app.ts", "console.log(1);\n")]);
    let (exit_code, stdout, _stderr) =
        run_rulecheck(project.path(), &["check", "--format", "json", "app.ts"]);

    pretty_assert_eq!(exit_code, 1);
    let reports = serde_json::from_str::<serde_json::Value>(&stdout).expect("parse json output");
    let results = &reports[0]["results"];
    pretty_assert_eq!(results[0]["rule"], "no-console-log");
    pretty_assert_eq!(results[0]["matched"], true);
    pretty_assert_eq!(results[0]["actions"][0]["kind"], "enforce");
    pretty_assert_eq!(results[1]["rule"], "ts-class-naming");
    pretty_assert_eq!(results[1]["matched"], false);
}

#[test]
fn test_invalid_rule_does_not_block_others() {
    let rules = indoc::indoc! {r#"
        - name: broken
          filters:
            - kind: content
              pattern: "(unclosed"
          actions:
            - kind: enforce
              message: never fires
        - name: no-todo
          filters:
            - kind: content
              pattern: "TODO"
          actions:
            - kind: enforce
              message: resolve the TODO
    "#};
    let project = setup_project(rules, &[("notes.txt", "TODO: write docs\n")]);
    let (exit_code, stdout, stderr) = run_rulecheck(project.path(), &["check", "notes.txt"]);

    pretty_assert_eq!(exit_code, 1, "the valid rule should still fire: {stdout}");
    assert!(stderr.contains("invalid pattern"), "expected a load warning, got: {stderr}");
    assert!(stdout.contains("[no-todo] enforce: resolve the TODO"), "got: {stdout}");
}

#[test]
fn test_explicit_rules_flag() {
    let project = setup_project("[]", &[("app.ts", "console.log(1);\n")]);
    std::fs::write(project.path().join("custom.yaml"), RULES).expect("write custom rules");

    let (exit_code, stdout, _stderr) =
        run_rulecheck(project.path(), &["check", "--rules", "custom.yaml", "app.ts"]);
    pretty_assert_eq!(exit_code, 1, "got: {stdout}");
}

#[test]
fn test_missing_rules_flag_source() {
    let project = setup_project(RULES, &[]);
    let (exit_code, _stdout, stderr) =
        run_rulecheck(project.path(), &["check", "--rules", "missing.yaml"]);

    pretty_assert_eq!(exit_code, 1);
    assert!(stderr.contains("rule source does not exist"), "got: {stderr}");
}

#[test]
fn test_no_rules() {
    let project = setup_project("[]", &[("app.ts", "console.log(1);\n")]);
    let (exit_code, stdout, _stderr) = run_rulecheck(project.path(), &["check"]);

    pretty_assert_eq!(exit_code, 0);
    assert!(stdout.contains("No rules found."), "got: {stdout}");
}

#[test]
fn test_glob_target() {
    let project = setup_project(
        RULES,
        &[
            ("src/app.ts", "console.log(1);\n"),
            ("src/nested/deep.ts", "console.log(3);\n"),
            ("vendor/lib.js", "console.log(2);\n"),
        ],
    );
    let (exit_code, stdout, _stderr) = run_rulecheck(project.path(), &["check", "src/*.ts"]);

    pretty_assert_eq!(exit_code, 1);
    assert!(stdout.contains("app.ts"), "got: {stdout}");
    assert!(!stdout.contains("deep.ts"), "`*` should not cross directories: {stdout}");
    assert!(!stdout.contains("lib.js"), "vendor should not be checked: {stdout}");
}

#[test]
fn test_rule_sources_are_not_checked() {
    let rules = indoc::indoc! {r#"
        name: no-console-log
        filters:
          - kind: content
            pattern: "console\\.log"
        actions:
          - kind: enforce
            message: remove console.log
    "#};
    let project = setup_project(
        rules,
        &[
            ("app.js", "function f(){ }\n"),
            (".git/COMMIT_EDITMSG", "drop console.log calls\n"),
        ],
    );
    let (exit_code, stdout, _stderr) = run_rulecheck(project.path(), &["check"]);

    pretty_assert_eq!(exit_code, 0, "a clean project should pass: {stdout}");
    assert!(!stdout.contains(".rules.yaml"), "got: {stdout}");
    assert!(!stdout.contains(".git"), "got: {stdout}");
}

#[test]
fn test_rules_flag_with_targets() {
    let project = setup_project("[]", &[("app.js", "console.log(1);\n")]);
    std::fs::write(project.path().join("custom.yaml"), RULES).expect("write custom rules");

    let (exit_code, stdout, _stderr) =
        run_rulecheck(project.path(), &["check", "-r", "custom.yaml", "app.js"]);
    pretty_assert_eq!(exit_code, 1, "got: {stdout}");
    assert!(stdout.contains("app.js:1 [no-console-log]"), "got: {stdout}");
}

#[test]
fn test_truncated_file_warns_once() {
    let project = setup_project(RULES, &[("app.ts", "const a = 1;\nconsole.log(a);\n")]);
    let (exit_code, _stdout, stderr) =
        run_rulecheck(project.path(), &["check", "--max-bytes", "8", "app.ts"]);

    pretty_assert_eq!(exit_code, 0, "console.log is past the limit: {stderr}");
    pretty_assert_eq!(
        stderr.matches("content truncated to the first 8 bytes").count(),
        1,
        "got: {stderr}"
    );
}
