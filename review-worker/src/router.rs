//! C4: Review-Mode Router. A pure total function, no I/O.

use review_broker::{AGENTIC_STREAM, DIFF_STREAM};
use review_types::ReviewMode;

/// `DIFF -> diff-stream`, `AGENTIC -> agent-stream` (spec §4.4). Absence of
/// `reviewMode` is handled upstream by `ReviewMode`'s serde default.
pub fn route(mode: ReviewMode) -> &'static str {
    match mode {
        ReviewMode::Diff => DIFF_STREAM,
        ReviewMode::Agentic => AGENTIC_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_routes_to_diff_stream() {
        assert_eq!(route(ReviewMode::Diff), DIFF_STREAM);
    }

    #[test]
    fn agentic_routes_to_agent_stream() {
        assert_eq!(route(ReviewMode::Agentic), AGENTIC_STREAM);
    }

    #[test]
    fn default_mode_is_diff() {
        assert_eq!(route(ReviewMode::default()), DIFF_STREAM);
    }
}
