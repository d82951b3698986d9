//! Per-framework test output scanners (spec §4.9 step 4). Each scanner reads
//! stdout line by line; unrecognized frameworks never reach here (the
//! `FrameworkKind` enum already narrows this to the supported set), but any
//! framework whose output doesn't match its scanner's patterns simply
//! contributes an empty result.

use review_types::state::{TestCaseResult, TestExecutionResult};

use crate::framework::FrameworkKind;

pub fn parse(framework: FrameworkKind, stdout: &str) -> TestExecutionResult {
    let cases = match framework {
        FrameworkKind::Pytest => parse_pytest(stdout),
        FrameworkKind::Go => parse_go(stdout),
        FrameworkKind::Maven | FrameworkKind::Gradle => parse_maven_gradle(stdout),
        FrameworkKind::NpmOrYarn => parse_jest(stdout),
        FrameworkKind::Cargo | FrameworkKind::DotNet => Vec::new(),
    };

    let passed = cases.iter().filter(|c| c.passed).count() as u32;
    let failed = cases.iter().filter(|c| !c.passed).count() as u32;

    TestExecutionResult {
        framework: framework.display_name().to_string(),
        passed,
        failed,
        cases,
    }
}

fn parse_pytest(stdout: &str) -> Vec<TestCaseResult> {
    let mut cases = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        for (marker, passed) in [("PASSED", true), ("FAILED", false)] {
            if let Some(name) = line.strip_suffix(marker) {
                let name = name.trim();
                if !name.is_empty() {
                    cases.push(TestCaseResult { name: name.to_string(), passed, message: None });
                }
            }
        }
    }
    cases
}

fn parse_go(stdout: &str) -> Vec<TestCaseResult> {
    let mut cases = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        for (marker, passed) in [("--- PASS:", true), ("--- FAIL:", false)] {
            if let Some(rest) = line.strip_prefix(marker) {
                let name = rest.split_whitespace().next().unwrap_or("").to_string();
                if !name.is_empty() {
                    cases.push(TestCaseResult { name, passed, message: None });
                }
            }
        }
    }
    cases
}

fn parse_maven_gradle(stdout: &str) -> Vec<TestCaseResult> {
    let mut cases = Vec::new();
    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("[ERROR]") && trimmed.contains("Test") && trimmed.contains("failed") {
            cases.push(TestCaseResult {
                name: trimmed.to_string(),
                passed: false,
                message: Some(trimmed.to_string()),
            });
        } else if trimmed.ends_with("FAILED") {
            let name = trimmed.trim_end_matches("FAILED").trim();
            if !name.is_empty() {
                cases.push(TestCaseResult { name: name.to_string(), passed: false, message: None });
            }
        }
    }
    cases
}

fn parse_jest(stdout: &str) -> Vec<TestCaseResult> {
    let mut cases = Vec::new();
    for line in stdout.lines() {
        let trimmed = line.trim();
        for (marker, passed) in [("\u{2713}", true), ("\u{2715}", false)] {
            if let Some(rest) = trimmed.strip_prefix(marker) {
                let name = rest.trim();
                if !name.is_empty() {
                    cases.push(TestCaseResult { name: name.to_string(), passed, message: None });
                }
            }
        }
    }
    cases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pytest_counts_passed_and_failed() {
        let stdout = "test_a.py::test_one PASSED\ntest_a.py::test_two FAILED\n";
        let result = parse(FrameworkKind::Pytest, stdout);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 1);
    }

    #[test]
    fn go_parses_pass_fail_markers() {
        let stdout = "--- PASS: TestFoo (0.00s)\n--- FAIL: TestBar (0.01s)\n";
        let result = parse(FrameworkKind::Go, stdout);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.cases[0].name, "TestFoo");
    }

    #[test]
    fn maven_parses_error_test_failed_lines() {
        let stdout = "[ERROR] Tests run: 2, Failures: 1\n[ERROR] FooTest.testBar:12 Test testBar failed\n";
        let result = parse(FrameworkKind::Maven, stdout);
        assert_eq!(result.failed, 1);
    }

    #[test]
    fn jest_parses_checkmark_and_cross() {
        let stdout = "\u{2713} renders correctly\n\u{2715} handles errors\n";
        let result = parse(FrameworkKind::NpmOrYarn, stdout);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 1);
    }

    #[test]
    fn unrecognized_output_yields_empty_result() {
        let result = parse(FrameworkKind::Cargo, "test result: ok. 3 passed; 0 failed\n");
        assert_eq!(result.passed, 0);
        assert_eq!(result.failed, 0);
        assert!(result.cases.is_empty());
    }
}
