//! C10: Fix-Safety Validator. Pure function, no I/O; output is immutable.

use review_types::state::{FindingSeverity, SecurityFinding, ValidationResult};

const SENSITIVE_EXTENSIONS: &[&str] = &[
    ".config", ".properties", ".yml", ".yaml", ".env", ".key", ".pem", ".crt", ".jks", ".p12",
];

const SENSITIVE_FILENAMES: &[&str] = &["id_rsa", "id_ed25519", "id_dsa", "id_ecdsa"];

const SENSITIVE_DIR_FRAGMENTS: &[&str] = &["/config/", "/security/", "/auth/", "/credentials/", "/secrets/"];

/// Static catalog of security-finding titles that always trigger rejection,
/// regardless of confidence (spec §4.10 step 2).
const CRITICAL_SECURITY_TITLES: &[&str] = &[
    "command injection",
    "sql injection",
    "code injection",
    "path traversal",
    "arbitrary file write",
    "remote code execution",
];

/// Path-based sensitivity check (spec §4.10 step 3).
pub fn sensitive(file_path: &str) -> bool {
    let lower = file_path.to_ascii_lowercase();
    if SENSITIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return true;
    }
    let filename = lower.rsplit('/').next().unwrap_or(&lower);
    if SENSITIVE_FILENAMES.iter().any(|name| filename == *name) {
        return true;
    }
    SENSITIVE_DIR_FRAGMENTS.iter().any(|fragment| lower.contains(fragment))
}

fn is_critical_security_finding(finding: &SecurityFinding) -> bool {
    if finding.severity != FindingSeverity::Critical {
        return false;
    }
    let lower = finding.message.to_ascii_lowercase();
    CRITICAL_SECURITY_TITLES.iter().any(|title| lower.contains(title))
}

/// Validates a candidate fix diff against the file it targets and any
/// security findings discovered for the same request (spec §4.10).
pub fn validate_fix(
    fix_diff: &str,
    file_path: &str,
    confidence_score: f32,
    security_findings: &[SecurityFinding],
) -> ValidationResult {
    if fix_diff.trim().is_empty() {
        return ValidationResult::Rejected {
            reason: "empty fix diff".to_string(),
        };
    }

    if let Some(critical) = security_findings.iter().find(|f| is_critical_security_finding(f)) {
        return ValidationResult::Rejected {
            reason: format!("critical security finding present: {}", critical.message),
        };
    }

    let required_threshold = if sensitive(file_path) { 0.95 } else { 0.90 };

    if confidence_score < required_threshold || sensitive(file_path) {
        return ValidationResult::Manual {
            reason: format!(
                "confidence {confidence_score:.2} below required threshold {required_threshold:.2} for {file_path}"
            ),
        };
    }

    let risk_score = security_findings.iter().map(|f| f.severity.weight()).sum();
    ValidationResult::Approved { risk_score }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: FindingSeverity, message: &str) -> SecurityFinding {
        SecurityFinding {
            detector: "test".to_string(),
            severity,
            message: message.to_string(),
            file: "a.rs".to_string(),
            line: 1,
        }
    }

    #[test]
    fn empty_diff_is_rejected() {
        let result = validate_fix("", "src/main.rs", 0.99, &[]);
        assert!(matches!(result, ValidationResult::Rejected { .. }));
    }

    #[test]
    fn critical_security_finding_rejects_regardless_of_confidence() {
        let findings = vec![finding(FindingSeverity::Critical, "command injection detected at line 4")];
        let result = validate_fix("diff", "src/main.rs", 0.99, &findings);
        assert!(matches!(result, ValidationResult::Rejected { .. }));
    }

    #[test]
    fn sensitive_path_requires_higher_threshold() {
        assert!(sensitive("config/app.yaml"));
        assert!(sensitive("/home/user/.ssh/id_rsa"));
        assert!(sensitive("src/auth/session.rs"));
        assert!(!sensitive("src/lib.rs"));

        let result = validate_fix("diff", "config/app.yaml", 0.92, &[]);
        assert!(matches!(result, ValidationResult::Manual { .. }));
    }

    #[test]
    fn non_sensitive_path_above_threshold_is_approved() {
        let findings = vec![finding(FindingSeverity::Low, "minor style issue")];
        let result = validate_fix("diff", "src/lib.rs", 0.95, &findings);
        match result {
            ValidationResult::Approved { risk_score } => assert_eq!(risk_score, 1.0),
            other => panic!("expected Approved, got {other:?}"),
        }
    }

    #[test]
    fn below_threshold_on_non_sensitive_path_is_manual() {
        let result = validate_fix("diff", "src/lib.rs", 0.5, &[]);
        assert!(matches!(result, ValidationResult::Manual { .. }));
    }
}
