//! Small-file expansion (spec §4.6 step 4): for files under a line-count
//! threshold, attach the full file content alongside the hunks so the LLM
//! sees surrounding context, subject to a per-request size budget.

pub struct ExpansionOutcome {
    pub expanded: Vec<(String, String)>,
    pub files_expanded: usize,
    pub files_skipped: usize,
}

/// `max_file_lines` bounds which files are eligible; `max_total_bytes` bounds
/// the cumulative expansion budget for the whole request.
pub fn expand_small_files(
    candidates: Vec<(String, String)>,
    max_file_lines: usize,
    max_total_bytes: usize,
) -> ExpansionOutcome {
    let mut expanded = Vec::new();
    let mut files_expanded = 0;
    let mut files_skipped = 0;
    let mut budget_used = 0usize;

    for (path, content) in candidates {
        let line_count = content.lines().count();
        if line_count > max_file_lines {
            files_skipped += 1;
            continue;
        }
        if budget_used + content.len() > max_total_bytes {
            files_skipped += 1;
            continue;
        }
        budget_used += content.len();
        files_expanded += 1;
        expanded.push((path, content));
    }

    ExpansionOutcome { expanded, files_expanded, files_skipped }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_files_over_the_line_threshold() {
        let big = "line\n".repeat(500);
        let outcome = expand_small_files(vec![("big.rs".to_string(), big)], 100, 1_000_000);
        assert_eq!(outcome.files_expanded, 0);
        assert_eq!(outcome.files_skipped, 1);
    }

    #[test]
    fn respects_the_total_byte_budget() {
        let a = "x".repeat(600);
        let b = "y".repeat(600);
        let outcome = expand_small_files(vec![("a.rs".into(), a), ("b.rs".into(), b)], 1000, 1000);
        assert_eq!(outcome.files_expanded, 1);
        assert_eq!(outcome.files_skipped, 1);
    }
}
