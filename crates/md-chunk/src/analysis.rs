use serde::Serialize;

use crate::options::ChunkingStrategy;
use crate::patterns::{
    CODE_BLOCK, HEADER, LIST_ITEM, MATH_BLOCK, PARAGRAPH_END, SENTENCE_END,
};

/// Structural counts used to pick a chunking strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAnalysis {
    pub total_length: usize,
    pub sentence_count: usize,
    pub paragraph_count: usize,
    pub code_block_count: usize,
    pub math_block_count: usize,
    pub header_count: usize,
    pub list_item_count: usize,
    pub suggested_strategy: ChunkingStrategy,
    pub average_sentence_length: f64,
    /// 1.0 (plain prose) to 10.0
    pub complexity: f64,
}

pub fn analyze(content: &str) -> ContentAnalysis {
    let total_length = content.len();
    let sentence_count = SENTENCE_END.find_iter(content).count();
    let paragraph_count = PARAGRAPH_END.find_iter(content).count();
    let code_block_count = CODE_BLOCK.find_iter(content).count();
    let math_block_count = MATH_BLOCK.find_iter(content).count();
    let header_count = HEADER.find_iter(content).count();
    let list_item_count = LIST_ITEM.find_iter(content).count();

    let suggested_strategy = if code_block_count > 0 || math_block_count > 0 {
        ChunkingStrategy::Adaptive
    } else if paragraph_count > 2 {
        ChunkingStrategy::Paragraph
    } else if sentence_count > 5 {
        ChunkingStrategy::Sentence
    } else {
        ChunkingStrategy::Adaptive
    };

    let raw = (total_length as f64 / 1000.0).min(5.0)
        + code_block_count as f64 * 2.0
        + math_block_count as f64 * 2.0
        + header_count as f64 * 0.5
        + list_item_count as f64 * 0.2;

    ContentAnalysis {
        total_length,
        sentence_count,
        paragraph_count,
        code_block_count,
        math_block_count,
        header_count,
        list_item_count,
        suggested_strategy,
        average_sentence_length: total_length as f64 / sentence_count.max(1) as f64,
        complexity: raw.clamp(1.0, 10.0),
    }
}
