//! Deterministic reading order for located blocks.

use crate::domain::TextBlock;
use std::cmp::Ordering;

/// Tops closer than this (normalized units) belong to the same line.
pub const LINE_TOLERANCE: f32 = 0.01;

/// Sorts blocks by page, then line band, then left edge.
///
/// A band starts at the highest remaining block and absorbs every block whose
/// top is within [`LINE_TOLERANCE`] of that first top. Blocks without
/// geometry go last on their page, in their original order.
pub fn sort_reading_order(blocks: &mut Vec<TextBlock>) {
    let mut keyed: Vec<(usize, TextBlock)> = blocks.drain(..).enumerate().collect();
    keyed.sort_by(|(ia, a), (ib, b)| {
        a.page
            .cmp(&b.page)
            .then_with(|| match (a.bounding_box, b.bounding_box) {
                (Some(x), Some(y)) => x
                    .top
                    .total_cmp(&y.top)
                    .then_with(|| x.left.total_cmp(&y.left)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| ia.cmp(ib))
    });

    let mut start = 0;
    while start < keyed.len() {
        let (page, anchor) = (keyed[start].1.page, keyed[start].1.bounding_box);
        let Some(anchor) = anchor else {
            start += 1;
            continue;
        };

        let mut end = start + 1;
        while end < keyed.len() {
            let next = &keyed[end].1;
            match next.bounding_box {
                Some(b) if next.page == page && b.top - anchor.top < LINE_TOLERANCE => end += 1,
                _ => break,
            }
        }

        keyed[start..end].sort_by(|(ia, a), (ib, b)| {
            let left = |t: &TextBlock| t.bounding_box.map_or(0.0, |bb| bb.left);
            left(a).total_cmp(&left(b)).then_with(|| ia.cmp(ib))
        });
        start = end;
    }

    blocks.extend(keyed.into_iter().map(|(_, b)| b));
}
