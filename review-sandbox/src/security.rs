//! In-process security AST detectors (spec §4.9 step 5, §9 design note).
//!
//! Detectors are modeled as variants over a capability set
//! (`visitMethodCall`, `visitObjectCreation`) with a flat match dispatching
//! to the right pattern catalog, rather than a vtable of visitor objects.
//! Each catalog entry pairs a dangerous-call pattern with a severity; a
//! matching "safe" pattern on the same line suppresses the finding (the
//! call is already wrapped by a known sanitizer).

use review_types::state::{FindingSeverity, SecurityFinding};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    VisitMethodCall,
    VisitObjectCreation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    CommandInjection,
    ReflectionAbuse,
    CodeInjection,
    PathTraversal,
}

impl DetectorKind {
    pub fn all() -> [DetectorKind; 4] {
        [
            DetectorKind::CommandInjection,
            DetectorKind::ReflectionAbuse,
            DetectorKind::CodeInjection,
            DetectorKind::PathTraversal,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::CommandInjection => "command-injection",
            Self::ReflectionAbuse => "reflection-abuse",
            Self::CodeInjection => "code-injection",
            Self::PathTraversal => "path-traversal",
        }
    }

    /// Human-readable category embedded in finding messages. Matches the
    /// critical-security catalog's title strings used by the fix-safety
    /// validator (e.g. "command injection"), so a critical finding from this
    /// detector is recognized there without re-deriving the mapping.
    fn category(self) -> &'static str {
        match self {
            Self::CommandInjection => "command injection",
            Self::ReflectionAbuse => "reflection abuse",
            Self::CodeInjection => "code injection",
            Self::PathTraversal => "path traversal",
        }
    }

    /// Flat dispatch over the capability set a detector implements.
    pub fn capabilities(self) -> &'static [Capability] {
        match self {
            Self::CommandInjection => &[Capability::VisitMethodCall],
            Self::ReflectionAbuse => &[Capability::VisitMethodCall, Capability::VisitObjectCreation],
            Self::CodeInjection => &[Capability::VisitMethodCall],
            Self::PathTraversal => &[Capability::VisitMethodCall, Capability::VisitObjectCreation],
        }
    }

    fn dangerous_patterns(self) -> &'static [(&'static str, FindingSeverity)] {
        match self {
            Self::CommandInjection => &[
                ("Runtime.getRuntime().exec", FindingSeverity::Critical),
                ("ProcessBuilder(", FindingSeverity::High),
                ("os.system(", FindingSeverity::Critical),
                ("subprocess.Popen(", FindingSeverity::High),
                ("subprocess.call(", FindingSeverity::High),
                ("child_process.exec(", FindingSeverity::Critical),
            ],
            Self::ReflectionAbuse => &[
                ("setAccessible(true)", FindingSeverity::High),
                ("Class.forName(", FindingSeverity::Medium),
                ("getDeclaredMethod(", FindingSeverity::Medium),
                ("__import__(", FindingSeverity::Medium),
            ],
            Self::CodeInjection => &[
                ("eval(", FindingSeverity::Critical),
                ("new Function(", FindingSeverity::High),
                ("exec(", FindingSeverity::High),
                ("pickle.loads(", FindingSeverity::High),
            ],
            Self::PathTraversal => &[
                ("../", FindingSeverity::Medium),
                ("..\\", FindingSeverity::Medium),
            ],
        }
    }

    fn safe_patterns(self) -> &'static [&'static str] {
        match self {
            Self::CommandInjection => &["ProcessBuilder.Redirect", "shlex.quote("],
            Self::PathTraversal => &[".canonicalize(", "Paths.get(SANDBOX_ROOT"],
            Self::ReflectionAbuse | Self::CodeInjection => &[],
        }
    }

    /// Scans `content` line by line for this detector's dangerous patterns,
    /// emitting a finding per match not covered by a safe pattern on the
    /// same line. Messages embed the literal "line N" (N 1-based within
    /// `content`) so callers can offset it to the file's global position
    /// via [`extract_line_number`].
    pub fn scan(self, file: &str, content: &str) -> Vec<SecurityFinding> {
        let mut findings = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let line_no = idx as u32 + 1;
            for (pattern, severity) in self.dangerous_patterns() {
                if !line.contains(pattern) {
                    continue;
                }
                if self.safe_patterns().iter().any(|safe| line.contains(safe)) {
                    continue;
                }
                findings.push(SecurityFinding {
                    detector: self.name().to_string(),
                    severity: *severity,
                    message: format!(
                        "{} via {} on line {}",
                        self.category(),
                        pattern.trim_end_matches('('),
                        line_no
                    ),
                    file: file.to_string(),
                    line: line_no,
                });
            }
        }
        findings
    }
}

/// Runs every detector over `content`, offsetting reported lines by
/// `global_offset` (spec §4.9 step 5: "adjusted to the file's global
/// offset"), for use when `content` is a window into a larger file.
pub fn scan_all(file: &str, content: &str, global_offset: u32) -> Vec<SecurityFinding> {
    DetectorKind::all()
        .into_iter()
        .flat_map(|d| d.scan(file, content))
        .map(|mut f| {
            if let Some(n) = extract_line_number(&f.message) {
                f.line = n + global_offset;
            }
            f
        })
        .collect()
}

/// Extracts the integer following the literal substring "line " in a
/// detector message.
pub fn extract_line_number(message: &str) -> Option<u32> {
    let idx = message.find("line ")?;
    let rest = &message[idx + "line ".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_command_injection() {
        let findings = DetectorKind::CommandInjection.scan("a.py", "os.system(user_input)\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, FindingSeverity::Critical);
    }

    #[test]
    fn safe_pattern_on_same_line_suppresses_finding() {
        let findings = DetectorKind::CommandInjection
            .scan("a.py", "subprocess.call(shlex.quote(cmd))\n");
        assert!(findings.is_empty());
    }

    #[test]
    fn path_traversal_detects_dotdot() {
        let findings = DetectorKind::PathTraversal.scan("a.rs", "let p = base.join(\"../secret\");\n");
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn extract_line_number_parses_trailing_digits() {
        assert_eq!(extract_line_number("eval use detected on line 42"), Some(42));
        assert_eq!(extract_line_number("no marker here"), None);
    }

    #[test]
    fn scan_all_applies_global_offset() {
        let findings = scan_all("a.py", "safe\neval(x)\n", 100);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 102);
    }
}
