//! Scripted stand-ins for the analysis service.

use pan_redactor::geometry::NormalizedBox;
use pan_redactor::{
    AnalysisError, AnalysisResponse, BlockKind, DocumentAnalyzer, PageImage, TextBlock,
};
use std::collections::HashMap;

/// What a scripted page returns.
#[derive(Debug, Clone)]
pub enum Script {
    Blocks(Vec<TextBlock>),
    Fail(String),
}

/// Returns canned blocks per 0-based page index; unscripted pages are empty.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAnalyzer {
    pages: HashMap<usize, Script>,
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, index: usize, blocks: Vec<TextBlock>) -> Self {
        self.pages.insert(index, Script::Blocks(blocks));
        self
    }

    pub fn failing_page(mut self, index: usize, message: &str) -> Self {
        self.pages.insert(index, Script::Fail(message.to_string()));
        self
    }
}

impl DocumentAnalyzer for ScriptedAnalyzer {
    fn analyze(&self, page: &PageImage) -> Result<AnalysisResponse, AnalysisError> {
        match self.pages.get(&page.index) {
            Some(Script::Blocks(blocks)) => Ok(AnalysisResponse::new(blocks.clone())),
            Some(Script::Fail(message)) => Err(AnalysisError::Transport(message.clone())),
            None => Ok(AnalysisResponse::default()),
        }
    }

    fn name(&self) -> &str {
        "Scripted"
    }
}

/// A LINE block with geometry.
pub fn line(id: &str, text: &str, left: f32, top: f32) -> TextBlock {
    TextBlock::new(id, text, BlockKind::Line)
        .with_box(NormalizedBox::new(left, top, 0.4, 0.02))
        .with_confidence(99.0)
}

/// A WORD block with geometry.
pub fn word(id: &str, text: &str, left: f32, top: f32) -> TextBlock {
    TextBlock::new(id, text, BlockKind::Word)
        .with_box(NormalizedBox::new(left, top, 0.06, 0.02))
        .with_confidence(98.0)
}

/// Blocks for a page showing one spaced card number.
pub fn card_page(prefix: &str, digits: [&str; 4]) -> Vec<TextBlock> {
    let text = format!("Card: {}", digits.join(" "));
    let mut blocks = vec![line(&format!("{}-l", prefix), &text, 0.1, 0.2)];
    for (i, group) in digits.iter().enumerate() {
        blocks.push(word(
            &format!("{}-w{}", prefix, i),
            group,
            0.2 + i as f32 * 0.07,
            0.2,
        ));
    }
    blocks
}
