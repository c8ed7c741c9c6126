//! Decides which located blocks must be hidden.
//!
//! Only a block showing the tail digits and nothing else from the number may
//! stay visible. A block mixing the tail with any leading group is redacted
//! whole.

use crate::domain::{digits_only, SensitiveMatch, TextBlock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Redact,
    Visible,
}

/// Blocks in reading order paired with their verdict.
#[derive(Debug)]
pub struct Classified<'a> {
    pub blocks: Vec<(&'a TextBlock, Visibility)>,
}

impl<'a> Classified<'a> {
    pub fn redacted(&self) -> impl Iterator<Item = &'a TextBlock> + '_ {
        self.blocks
            .iter()
            .filter(|(_, v)| *v == Visibility::Redact)
            .map(|(b, _)| *b)
    }

    pub fn visible(&self) -> impl Iterator<Item = &'a TextBlock> + '_ {
        self.blocks
            .iter()
            .filter(|(_, v)| *v == Visibility::Visible)
            .map(|(b, _)| *b)
    }
}

/// Verdict for a single block's text.
pub fn visibility_of(m: &SensitiveMatch, text: &str) -> Visibility {
    let digits = digits_only(text);
    let tail_only = digits.contains(m.tail.as_str())
        && !m
            .leading_groups()
            .iter()
            .any(|g| digits.contains(g.as_str()));

    if tail_only {
        Visibility::Visible
    } else {
        Visibility::Redact
    }
}

/// Classifies every block, preserving order.
pub fn classify<'a>(m: &SensitiveMatch, blocks: &'a [TextBlock]) -> Classified<'a> {
    Classified {
        blocks: blocks
            .iter()
            .map(|b| (b, visibility_of(m, &b.text)))
            .collect(),
    }
}
