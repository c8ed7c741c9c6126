//! Re-associating card-number matches with OCR block geometry.
//!
//! The locator runs an ordered list of strategies and keeps the first one
//! that finds anything. When every strategy comes up empty, a synthetic
//! block is fabricated so the match is still rendered (as an approximate,
//! visibly unlocated placeholder) rather than silently dropped.

pub mod order;
pub mod visibility;

pub use order::sort_reading_order;
pub use visibility::{classify, Classified, Visibility};

use crate::domain::{BlockKind, RedactionElement, SensitiveMatch, TextBlock};
use crate::geometry::DEFAULT_BOX;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Width of the sliding digit window used by chunk containment.
pub const CHUNK_WINDOW: usize = 8;

/// One way of finding the blocks that carry a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    /// LINE blocks holding the literal or the full digit string
    ExactContainment,
    /// WORD blocks holding any 8-digit window of the number
    ChunkContainment,
    /// WORD blocks holding at least `min_group_hits` of the digit groups
    GroupContainment { min_group_hits: usize },
}

impl LocatorStrategy {
    /// The default chain: exact, then chunk, then single-group containment.
    pub fn default_chain() -> Vec<LocatorStrategy> {
        vec![
            Self::ExactContainment,
            Self::ChunkContainment,
            Self::GroupContainment { min_group_hits: 1 },
        ]
    }

    fn name(&self) -> &'static str {
        match self {
            Self::ExactContainment => "exact",
            Self::ChunkContainment => "chunk",
            Self::GroupContainment { .. } => "group",
        }
    }

    fn select<'a>(&self, m: &SensitiveMatch, blocks: &'a [TextBlock]) -> Vec<&'a TextBlock> {
        match *self {
            Self::ExactContainment => blocks
                .iter()
                .filter(|b| b.is_line())
                .filter(|b| b.text.contains(&m.raw_matched) || b.digits().contains(&m.digits))
                .collect(),
            Self::ChunkContainment => blocks
                .iter()
                .filter(|b| b.is_word())
                .filter(|b| {
                    let digits = b.digits();
                    m.windows(CHUNK_WINDOW).any(|w| digits.contains(w))
                })
                .collect(),
            Self::GroupContainment { min_group_hits } => blocks
                .iter()
                .filter(|b| b.is_word())
                .filter(|b| {
                    let digits = b.digits();
                    let hits = m
                        .groups
                        .iter()
                        .collect::<HashSet<_>>()
                        .into_iter()
                        .filter(|g| digits.contains(g.as_str()))
                        .count();
                    hits >= min_group_hits.max(1)
                })
                .collect(),
        }
    }
}

/// Which strategy produced a located block set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatedBy {
    Strategy(LocatorStrategy),
    Synthetic,
}

/// Blocks found for one match, deduplicated and guaranteed to carry geometry.
#[derive(Debug, Clone)]
pub struct Located {
    pub by: LocatedBy,
    pub blocks: Vec<TextBlock>,
}

/// Finds the blocks on a page that carry a [`SensitiveMatch`].
#[derive(Debug, Clone)]
pub struct BlockLocator {
    strategies: Vec<LocatorStrategy>,
}

impl Default for BlockLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockLocator {
    /// Creates a locator with the default strategy chain.
    pub fn new() -> Self {
        Self {
            strategies: LocatorStrategy::default_chain(),
        }
    }

    /// Replaces the strategy chain. An empty chain always synthesizes.
    pub fn with_strategies(mut self, strategies: Vec<LocatorStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Requires `hits` distinct groups before group containment accepts a block.
    pub fn with_min_group_hits(mut self, hits: usize) -> Self {
        for strategy in &mut self.strategies {
            if let LocatorStrategy::GroupContainment { min_group_hits } = strategy {
                *min_group_hits = hits.max(1);
            }
        }
        self
    }

    pub fn strategies(&self) -> &[LocatorStrategy] {
        &self.strategies
    }

    /// Runs the strategy chain for `m` over one page's blocks.
    pub fn locate(&self, m: &SensitiveMatch, blocks: &[TextBlock], page: u32) -> Located {
        for strategy in &self.strategies {
            let found = strategy.select(m, blocks);
            if found.is_empty() {
                continue;
            }

            debug!(
                strategy = strategy.name(),
                blocks = found.len(),
                label = %m.label,
                "located match"
            );
            let mut seen = HashSet::new();
            let blocks = found
                .into_iter()
                .filter(|b| seen.insert(b.id.as_str()))
                .map(|b| {
                    let mut block = b.clone();
                    block.bounding_box.get_or_insert(DEFAULT_BOX);
                    block
                })
                .collect();
            return Located {
                by: LocatedBy::Strategy(*strategy),
                blocks,
            };
        }

        debug!(label = %m.label, "no block found, synthesizing placeholder");
        Located {
            by: LocatedBy::Synthetic,
            blocks: vec![synthetic_block(m, page)],
        }
    }

    /// Locates, orders and classifies `m`, producing the element to redact.
    ///
    /// Returns `None` when every located block may stay visible.
    pub fn resolve(
        &self,
        m: &SensitiveMatch,
        blocks: &[TextBlock],
        page_index: usize,
        element_id: impl Into<String>,
    ) -> Option<RedactionElement> {
        let page = u32::try_from(page_index + 1).unwrap_or(u32::MAX);
        let mut located = self.locate(m, blocks, page);
        sort_reading_order(&mut located.blocks);

        let classified = classify(m, &located.blocks);
        let redact: Vec<&TextBlock> = classified.redacted().collect();
        if redact.is_empty() {
            debug!(label = %m.label, "all located blocks are tail-only");
        }
        RedactionElement::from_blocks(element_id, m.label.clone(), page_index, &redact)
    }
}

fn synthetic_block(m: &SensitiveMatch, page: u32) -> TextBlock {
    TextBlock::new(
        format!("synthetic-p{}-{}", page, m.tail),
        m.raw_matched.clone(),
        BlockKind::Synthetic,
    )
    .with_box(DEFAULT_BOX)
    .with_confidence(100.0)
    .with_page(page)
}
