//! Property-based tests for content ceilings

use benchline::report::{truncate_to_ceiling, TRUNCATION_MARKER};
use proptest::prelude::*;

proptest! {
    #[test]
    fn truncated_text_never_exceeds_the_limit(text in "(\\PC{0,40}\n?){0,30}", limit in 0usize..600) {
        let out = truncate_to_ceiling(&text, limit);
        prop_assert!(out.len() <= limit || out == text);
        if text.len() > limit {
            prop_assert!(out.len() <= limit);
        }
    }

    #[test]
    fn text_within_the_limit_is_untouched(text in "\\PC{0,200}", slack in 0usize..50) {
        let limit = text.len() + slack;
        prop_assert_eq!(truncate_to_ceiling(&text, limit), text);
    }

    #[test]
    fn shortened_text_carries_the_marker(text in "[a-z \n]{200,800}", limit in 40usize..190) {
        prop_assume!(limit > TRUNCATION_MARKER.len());
        let out = truncate_to_ceiling(&text, limit);
        prop_assert!(out.ends_with(TRUNCATION_MARKER));
        let kept = &out[..out.len() - TRUNCATION_MARKER.len()];
        prop_assert!(text.starts_with(kept));
    }
}
