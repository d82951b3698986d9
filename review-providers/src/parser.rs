//! Unified diff parser (spec §4.6.1).
//!
//! `--- a/<path>` starts a file record; `+++ b/<path>` sets the new path and
//! appends the file; `@@ -l[,c] +l[,c] @@` begins a hunk. A hunk header with
//! no explicit `c` defaults the count to 1, matching the unified diff format
//! itself rather than the common "assume zero" shortcut.

use review_types::diff::{DiffDocument, DiffHunk, DiffLine, FileModification};

pub fn parse_unified_diff(raw: &str) -> DiffDocument {
    let mut files = Vec::new();
    let mut old_path: Option<String> = None;
    let mut cur_file: Option<FileModification> = None;
    let mut cur_hunk: Option<DiffHunk> = None;
    let mut old_line = 0u32;
    let mut new_line = 0u32;

    for line in raw.lines() {
        if let Some(path) = line.strip_prefix("--- a/") {
            flush_hunk(&mut cur_file, &mut cur_hunk);
            flush_file(&mut files, &mut cur_file);
            old_path = Some(path.to_string());
            continue;
        }
        if let Some(path) = line.strip_prefix("+++ b/") {
            flush_hunk(&mut cur_file, &mut cur_hunk);
            flush_file(&mut files, &mut cur_file);
            cur_file = Some(FileModification {
                old_path: old_path.take(),
                new_path: Some(path.to_string()),
                hunks: Vec::new(),
            });
            continue;
        }
        if line.starts_with("@@") {
            flush_hunk(&mut cur_file, &mut cur_hunk);
            if let Some((old_start, old_count, new_start, new_count)) = parse_hunk_header(line) {
                old_line = old_start;
                new_line = new_start;
                cur_hunk = Some(DiffHunk {
                    old_start,
                    old_count,
                    new_start,
                    new_count,
                    lines: Vec::new(),
                });
            }
            continue;
        }
        if line.starts_with("\\ ") {
            continue;
        }
        let Some(hunk) = cur_hunk.as_mut() else {
            continue;
        };
        if let Some(rest) = line.strip_prefix('+') {
            hunk.lines.push(DiffLine::Added {
                new_line,
                content: rest.to_string(),
            });
            new_line += 1;
        } else if let Some(rest) = line.strip_prefix('-') {
            hunk.lines.push(DiffLine::Removed {
                old_line,
                content: rest.to_string(),
            });
            old_line += 1;
        } else {
            let rest = line.strip_prefix(' ').unwrap_or(line);
            hunk.lines.push(DiffLine::Context {
                old_line,
                new_line,
                content: rest.to_string(),
            });
            old_line += 1;
            new_line += 1;
        }
    }

    flush_hunk(&mut cur_file, &mut cur_hunk);
    flush_file(&mut files, &mut cur_file);
    DiffDocument { files }
}

fn flush_hunk(file: &mut Option<FileModification>, hunk: &mut Option<DiffHunk>) {
    if let (Some(f), Some(h)) = (file.as_mut(), hunk.take()) {
        f.hunks.push(h);
    }
}

fn flush_file(files: &mut Vec<FileModification>, file: &mut Option<FileModification>) {
    if let Some(f) = file.take() {
        files.push(f);
    }
}

/// Parses `@@ -l[,c] +l[,c] @@...`. Missing `c` defaults to 1.
fn parse_hunk_header(line: &str) -> Option<(u32, u32, u32, u32)> {
    let body = line.trim_start_matches('@').trim_end_matches('@').trim();
    let body = body.strip_prefix('@').unwrap_or(body);
    let (left, right) = body.trim().split_once('+')?;
    let left = left.trim().trim_start_matches('-');
    let right = right.trim();
    let (old_start, old_count) = split_range(left);
    let (new_start, new_count) = split_range(right);
    Some((old_start, old_count, new_start, new_count))
}

fn split_range(s: &str) -> (u32, u32) {
    let s = s.trim();
    match s.split_once(',') {
        Some((start, count)) => (start.parse().unwrap_or(0), count.parse().unwrap_or(1)),
        None => (s.parse().unwrap_or(0), 1),
    }
}

/// Mirrors `git diff`'s binary-patch markers.
pub fn looks_like_binary_patch(s: &str) -> bool {
    s.contains("GIT binary patch")
        || s.starts_with("Binary files ")
        || (s.starts_with("Files ") && s.contains(" differ"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hunk_header_defaults_missing_count_to_one() {
        let (old_start, old_count, new_start, new_count) =
            parse_hunk_header("@@ -12 +15 @@ fn foo() {").unwrap();
        assert_eq!((old_start, old_count, new_start, new_count), (12, 1, 15, 1));
    }

    #[test]
    fn parses_a_single_file_single_hunk_diff() {
        let raw = "--- a/src/lib.rs\n+++ b/src/lib.rs\n@@ -1,2 +1,3 @@\n-old\n+new\n+added\n context\n";
        let doc = parse_unified_diff(raw);
        assert_eq!(doc.files.len(), 1);
        let file = &doc.files[0];
        assert_eq!(file.new_path.as_deref(), Some("src/lib.rs"));
        assert_eq!(file.hunks.len(), 1);
        assert_eq!(file.hunks[0].lines.len(), 4);
    }

    #[test]
    fn no_newline_marker_lines_are_ignored() {
        let raw = "--- a/a.txt\n+++ b/a.txt\n@@ -1 +1 @@\n-old\n\\ No newline at end of file\n+new\n\\ No newline at end of file\n";
        let doc = parse_unified_diff(raw);
        assert_eq!(doc.files[0].hunks[0].lines.len(), 2);
    }

    #[test]
    fn binary_patch_markers_are_detected() {
        assert!(looks_like_binary_patch("Binary files a/x.png and b/x.png differ"));
        assert!(looks_like_binary_patch("GIT binary patch\ndelta 10\n"));
        assert!(!looks_like_binary_patch("--- a/x\n+++ b/x\n@@ -1 +1 @@\n-a\n+b\n"));
    }
}
