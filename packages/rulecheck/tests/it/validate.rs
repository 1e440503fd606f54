//! `rulecheck validate` tests.

use pretty_assertions::assert_eq as pretty_assert_eq;

use crate::{RULES, run_rulecheck, setup_project};

#[test]
fn test_validate_discovers_rules() {
    let project = setup_project(RULES, &[]);
    let (exit_code, stdout, stderr) = run_rulecheck(project.path(), &["validate"]);

    pretty_assert_eq!(exit_code, 0, "stderr: {stderr}");
    assert!(stdout.contains(".rules.yaml"), "got: {stdout}");
    assert!(stdout.contains("no-console-log"), "got: {stdout}");
    assert!(stdout.contains("2 rules valid"), "got: {stdout}");
}

#[test]
fn test_validate_reports_schema_error() {
    let rules = indoc::indoc! {r#"
        - name: no-action-kind
          filters: []
          actions:
            - message: missing kind
    "#};
    let project = setup_project(rules, &[]);
    let (exit_code, _stdout, stderr) = run_rulecheck(project.path(), &["validate"]);

    pretty_assert_eq!(exit_code, 1);
    assert!(stderr.contains("actions[0].kind"), "got: {stderr}");
}

#[test]
fn test_validate_reports_malformed_source() {
    let project = setup_project("- name: [unclosed\n", &[]);
    let (exit_code, _stdout, stderr) =
        run_rulecheck(project.path(), &["validate", ".rules.yaml"]);

    pretty_assert_eq!(exit_code, 1);
    assert!(stderr.contains("malformed rule source"), "got: {stderr}");
}
