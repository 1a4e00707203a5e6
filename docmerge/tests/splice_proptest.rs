//! Property-based tests for text normalization and span splicing
//!
//! Splicing must give the same text as a plain string replacement no matter
//! how that text is split into spans, must never change the span count, and
//! must leave spans lying wholly outside the match exactly as they were.

use docmerge::document_model::Container;
use docmerge::normalize::normalize;
use docmerge::splicer;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::ops::Range;

/// Span texts, including empty spans and multi-byte characters
fn pieces_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-cé{} ]{0,6}", 0..6)
}

/// Replacement text, possibly empty and possibly marker-like
fn replacement_strategy() -> impl Strategy<Value = String> {
    prop_oneof!["[a-zß ]{0,8}", Just(String::new()), Just("{{x}}".to_string())]
}

/// Byte offset of the `n`th char boundary, clamped to the end
fn boundary(text: &str, n: usize) -> usize {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .nth(n)
        .unwrap_or(text.len())
}

/// Spans that end before `matched` starts or begin after it ends keep their text
fn check_outside_spans(
    before: &Container,
    after: &Container,
    matched: &Range<usize>,
) -> Result<(), TestCaseError> {
    for (idx, span_range) in before.span_ranges().into_iter().enumerate() {
        if span_range.end <= matched.start || span_range.start >= matched.end {
            prop_assert_eq!(&after.spans[idx].text, &before.spans[idx].text);
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn test_normalize_is_idempotent(s in "\\PC{0,24}") {
        let once = normalize(&s);
        prop_assert_eq!(normalize(&once), once.clone());
        prop_assert!(once.chars().all(char::is_alphanumeric));
    }

    #[test]
    fn test_replace_matches_string_replacement(
        pieces in pieces_strategy(),
        a in 0usize..40,
        b in 0usize..40,
        replacement in replacement_strategy(),
    ) {
        let mut container = Container::from_pieces(&pieces);
        let text = container.text();
        let chars = text.chars().count();
        let (lo, hi) = (a.min(b).min(chars), a.max(b).min(chars));
        prop_assume!(lo < hi);
        let target = text[boundary(&text, lo)..boundary(&text, hi)].to_string();

        let before = container.clone();
        let start = text.find(&target).unwrap();
        let matched = start..start + target.len();

        prop_assert!(splicer::replace(&mut container, &target, &replacement));
        prop_assert_eq!(container.text(), text.replacen(&target, &replacement, 1));
        prop_assert_eq!(container.spans.len(), before.spans.len());
        check_outside_spans(&before, &container, &matched)?;
    }

    #[test]
    fn test_replace_range_matches_string_splice(
        pieces in pieces_strategy(),
        a in 0usize..40,
        b in 0usize..40,
        replacement in replacement_strategy(),
    ) {
        let mut container = Container::from_pieces(&pieces);
        let text = container.text();
        let chars = text.chars().count();
        let (lo, hi) = (a.min(b).min(chars), a.max(b).min(chars));
        prop_assume!(lo < hi);
        let range = boundary(&text, lo)..boundary(&text, hi);

        let mut expected = text.clone();
        expected.replace_range(range.clone(), &replacement);

        let before = container.clone();
        prop_assert!(splicer::replace_range(&mut container, range.clone(), &replacement));
        prop_assert_eq!(container.text(), expected);
        check_outside_spans(&before, &container, &range)?;
    }

    #[test]
    fn test_absent_target_is_a_no_op(pieces in pieces_strategy(), replacement in replacement_strategy()) {
        let mut container = Container::from_pieces(&pieces);
        let before = container.clone();
        prop_assert!(!splicer::replace(&mut container, "zzz", &replacement));
        prop_assert_eq!(container, before);
    }
}
