//! Framework detection by marker file (spec §4.9 step 2), probed in
//! declaration order. Each entry pairs a marker (exact filename or a
//! `*`-suffix glob) with the command run inside the sandbox.

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameworkKind {
    Maven,
    Gradle,
    NpmOrYarn,
    Pytest,
    Go,
    Cargo,
    DotNet,
}

impl FrameworkKind {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Maven => "Maven",
            Self::Gradle => "Gradle",
            Self::NpmOrYarn => "NPM/Yarn",
            Self::Pytest => "pytest",
            Self::Go => "Go",
            Self::Cargo => "Cargo",
            Self::DotNet => "dotnet",
        }
    }

    /// Command run inside the sandbox, relative to `/workspace/repo`.
    pub fn test_command(self) -> Vec<String> {
        let argv: &[&str] = match self {
            Self::Maven => &["mvn", "-B", "test"],
            Self::Gradle => &["./gradlew", "test"],
            Self::NpmOrYarn => &["npm", "test", "--", "--ci"],
            Self::Pytest => &["pytest", "-q"],
            Self::Go => &["go", "test", "./..."],
            Self::Cargo => &["cargo", "test"],
            Self::DotNet => &["dotnet", "test"],
        };
        argv.iter().map(|s| s.to_string()).collect()
    }
}

/// Marker, in declaration order: exact filename, or `*.ext` for a glob.
const MARKER_TABLE: &[(&str, FrameworkKind)] = &[
    ("pom.xml", FrameworkKind::Maven),
    ("build.gradle", FrameworkKind::Gradle),
    ("build.gradle.kts", FrameworkKind::Gradle),
    ("package.json", FrameworkKind::NpmOrYarn),
    ("yarn.lock", FrameworkKind::NpmOrYarn),
    ("pytest.ini", FrameworkKind::Pytest),
    ("setup.py", FrameworkKind::Pytest),
    ("go.mod", FrameworkKind::Go),
    ("Cargo.toml", FrameworkKind::Cargo),
    ("*.csproj", FrameworkKind::DotNet),
];

fn matches_marker(filename: &str, marker: &str) -> bool {
    match marker.strip_prefix('*') {
        Some(suffix) => filename.ends_with(suffix),
        None => filename == marker,
    }
}

/// Detects every framework with a marker present at `repo_root`'s top level,
/// in marker-table declaration order. A repo may match more than one (e.g. a
/// polyglot repo with both `Cargo.toml` and `package.json`).
pub fn detect_frameworks(repo_root: &Path) -> Vec<FrameworkKind> {
    let entries = match std::fs::read_dir(repo_root) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let filenames: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();

    let mut found = Vec::new();
    for (marker, kind) in MARKER_TABLE {
        if filenames.iter().any(|f| matches_marker(f, marker)) && !found.contains(kind) {
            found.push(*kind);
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "").unwrap();
    }

    #[test]
    fn detects_cargo_project() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Cargo.toml");
        assert_eq!(detect_frameworks(dir.path()), vec![FrameworkKind::Cargo]);
    }

    #[test]
    fn detects_gradle_kts_variant() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "build.gradle.kts");
        assert_eq!(detect_frameworks(dir.path()), vec![FrameworkKind::Gradle]);
    }

    #[test]
    fn detects_csproj_glob() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "MyApp.csproj");
        assert_eq!(detect_frameworks(dir.path()), vec![FrameworkKind::DotNet]);
    }

    #[test]
    fn detects_multiple_frameworks_in_declaration_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "package.json");
        touch(dir.path(), "pom.xml");
        assert_eq!(
            detect_frameworks(dir.path()),
            vec![FrameworkKind::Maven, FrameworkKind::NpmOrYarn]
        );
    }

    #[test]
    fn empty_repo_detects_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(detect_frameworks(dir.path()).is_empty());
    }

    #[test]
    fn npm_and_yarn_markers_collapse_to_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "package.json");
        touch(dir.path(), "yarn.lock");
        assert_eq!(detect_frameworks(dir.path()), vec![FrameworkKind::NpmOrYarn]);
    }
}
