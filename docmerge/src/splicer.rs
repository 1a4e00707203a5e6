//! In-place text replacement across formatted spans
//!
//! A match may start in one span and end several spans later. The span in
//! which the match starts absorbs the whole replacement; every other span
//! touched by the match loses only its matched portion. Text outside the
//! match keeps its span, and therefore its formatting.
//!
//! Spans emptied by a replacement are kept: codecs map spans one-to-one onto
//! elements of the source file, so removing them would orphan those elements.

use crate::document_model::Container;
use std::ops::Range;

/// Replace the first occurrence of `target` in the container's text
///
/// # Returns
/// * `true` - The target was found and replaced
/// * `false` - The target does not occur (or is empty); the container is untouched
pub fn replace(container: &mut Container, target: &str, replacement: &str) -> bool {
    if target.is_empty() {
        return false;
    }
    let full = container.text();
    match full.find(target) {
        Some(start) => replace_range(container, start..start + target.len(), replacement),
        None => false,
    }
}

/// Replace the given byte range of the container's text
///
/// The range is expressed in offsets of [`Container::text`] and must fall on
/// char boundaries. Returns `false` without touching the container when the
/// range is empty, reversed or out of bounds.
pub fn replace_range(container: &mut Container, range: Range<usize>, replacement: &str) -> bool {
    let ranges = container.span_ranges();
    let total = ranges.last().map_or(0, |r| r.end);
    if range.start >= range.end || range.end > total {
        return false;
    }

    let mut absorbed = false;
    for (span, span_range) in container.spans.iter_mut().zip(ranges) {
        if span_range.start >= range.end || span_range.end <= range.start {
            continue;
        }

        let overlap_start = span_range.start.max(range.start) - span_range.start;
        let overlap_end = span_range.end.min(range.end) - span_range.start;
        let keep_before = &span.text[..overlap_start];
        let keep_after = &span.text[overlap_end..];

        let new_text = if absorbed {
            format!("{}{}", keep_before, keep_after)
        } else {
            absorbed = true;
            format!("{}{}{}", keep_before, replacement, keep_after)
        };
        span.text = new_text;
    }

    absorbed
}
