//! Splitting text into ordered chunks without breaking atomic regions.

use regex::Regex;
use tracing::debug;

use crate::analysis::analyze;
use crate::chunk::{Chunk, ChunkKind};
use crate::options::{ChunkOptions, ChunkingStrategy};
use crate::patterns::{
    CLAUSE_BREAK, HEADER, LIST_MARKER, MATH_BLOCK, PARAGRAPH_END, SENTENCE_END, WHITESPACE,
};

/// A byte range that must end up in a single chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Region {
    start: usize,
    end: usize,
    kind: ChunkKind,
}

/// A chunk before ids, kinds and priorities are assigned.
#[derive(Debug, Clone)]
struct Draft {
    start: usize,
    end: usize,
    kind: ChunkKind,
}

impl Draft {
    fn is_atomic(&self) -> bool {
        self.kind.is_atomic()
    }
}

#[derive(Debug, Clone, Copy)]
enum Detector {
    Sentence,
    Paragraph,
    /// Whichever of sentence or paragraph breaks later
    Structural,
    Clause,
    Whitespace,
}

impl ChunkingStrategy {
    fn detectors(&self) -> &'static [Detector] {
        match self {
            ChunkingStrategy::Sentence => &[
                Detector::Sentence,
                Detector::Paragraph,
                Detector::Clause,
                Detector::Whitespace,
            ],
            ChunkingStrategy::Paragraph => &[
                Detector::Paragraph,
                Detector::Sentence,
                Detector::Clause,
                Detector::Whitespace,
            ],
            ChunkingStrategy::Word => &[Detector::Whitespace],
            ChunkingStrategy::Adaptive => &[
                Detector::Structural,
                Detector::Clause,
                Detector::Whitespace,
            ],
        }
    }
}

/// Split `content` into ordered chunks.
///
/// Concatenating the chunk contents always gives back `content`.
pub fn chunk(content: &str, options: &ChunkOptions) -> Vec<Chunk> {
    if content.is_empty() {
        return Vec::new();
    }

    let strategy = options
        .strategy
        .unwrap_or_else(|| analyze(content).suggested_strategy);
    let max = options.max_chunk_size.max(1);
    let min = options.effective_min();

    let mut drafts = Vec::new();
    let mut pos = 0;
    for region in atomic_regions(content) {
        split_text(content, pos, region.start, max, min, strategy, &mut drafts);
        pos = region.end;
        drafts.push(Draft {
            start: region.start,
            end: region.end,
            kind: region.kind,
        });
    }
    split_text(content, pos, content.len(), max, min, strategy, &mut drafts);

    merge_small(content, &mut drafts, options.merge_threshold());

    let chunks: Vec<Chunk> = drafts
        .into_iter()
        .enumerate()
        .map(|(id, draft)| finish_chunk(content, id, draft, options.fold_threshold))
        .collect();

    debug!(
        "chunked {} bytes into {} chunks ({})",
        content.len(),
        chunks.len(),
        strategy.name()
    );

    chunks
}

/// Fenced code, display math and ATX headers, in source order and never
/// overlapping. Scanning resumes after each region, so a `#` line inside a
/// code fence never becomes a header.
fn atomic_regions(content: &str) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut pos = 0;

    while pos < content.len() {
        let next = [
            next_code_block(content, pos),
            next_math_block(content, pos),
            next_header(content, pos),
        ]
        .into_iter()
        .flatten()
        .min_by_key(|region| region.start);

        let Some(region) = next else {
            break;
        };
        pos = region.end;
        regions.push(region);
    }

    regions
}

fn next_code_block(content: &str, from: usize) -> Option<Region> {
    let start = from + content[from..].find("```")?;
    let body = start + 3;
    let end = match content[body..].find("```") {
        Some(close) => body + close + 3,
        // An unclosed fence runs to the end of input
        None => content.len(),
    };

    let language = content[body..end]
        .split_once('\n')
        .and_then(|(info, _)| info.split_whitespace().next())
        .filter(|word| !word.contains('`'))
        .map(str::to_string);

    Some(Region {
        start,
        end,
        kind: ChunkKind::CodeBlock { language },
    })
}

fn next_math_block(content: &str, from: usize) -> Option<Region> {
    let m = MATH_BLOCK.find_at(content, from)?;
    Some(Region {
        start: m.start(),
        end: m.end(),
        kind: ChunkKind::MathBlock,
    })
}

fn next_header(content: &str, from: usize) -> Option<Region> {
    let caps = HEADER.captures_at(content, from)?;
    let whole = caps.get(0)?;
    let level = caps.get(1)?.len() as u8;
    Some(Region {
        start: whole.start(),
        end: whole.end(),
        kind: ChunkKind::Header { level },
    })
}

/// Split the text in `start..end` into windows of at most `max` bytes,
/// preferring break points in the strategy's order.
fn split_text(
    content: &str,
    start: usize,
    end: usize,
    max: usize,
    min: usize,
    strategy: ChunkingStrategy,
    drafts: &mut Vec<Draft>,
) {
    let mut pos = start;

    while pos < end {
        let chunk_end = if end - pos <= max {
            end
        } else {
            let window_end = floor_char_boundary(content, pos + max, pos);
            find_break(&content[pos..window_end], min, strategy)
                .map(|offset| pos + offset)
                .unwrap_or(window_end)
        };

        drafts.push(Draft {
            start: pos,
            end: chunk_end,
            kind: ChunkKind::Text,
        });
        pos = chunk_end;
    }
}

/// The best break inside `window`, as a byte offset into it, leaving at
/// least `min` bytes before it.
fn find_break(window: &str, min: usize, strategy: ChunkingStrategy) -> Option<usize> {
    strategy
        .detectors()
        .iter()
        .filter_map(|detector| detect(window, *detector))
        .find(|&offset| offset >= min && offset > 0)
}

fn detect(window: &str, detector: Detector) -> Option<usize> {
    match detector {
        Detector::Sentence => last_match_end(&SENTENCE_END, window),
        Detector::Paragraph => last_match_end(&PARAGRAPH_END, window),
        Detector::Structural => last_match_end(&SENTENCE_END, window)
            .max(last_match_end(&PARAGRAPH_END, window)),
        Detector::Clause => last_match_end(&CLAUSE_BREAK, window),
        Detector::Whitespace => last_match_end(&WHITESPACE, window),
    }
}

fn last_match_end(re: &Regex, text: &str) -> Option<usize> {
    re.find_iter(text).last().map(|m| m.end())
}

/// Largest char boundary at or below `index`, but always past `floor` so
/// every window makes progress.
fn floor_char_boundary(content: &str, index: usize, floor: usize) -> usize {
    let mut i = index.min(content.len());
    while i > floor && !content.is_char_boundary(i) {
        i -= 1;
    }
    if i > floor {
        return i;
    }

    // The window is narrower than one character
    let mut i = floor + 1;
    while i < content.len() && !content.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Fold micro-chunks and whitespace-only chunks into a non-atomic
/// neighbour, the next one first.
fn merge_small(content: &str, drafts: &mut Vec<Draft>, threshold: usize) {
    let mut i = 0;

    while i < drafts.len() {
        let draft = &drafts[i];
        let text = &content[draft.start..draft.end];
        let small = !draft.is_atomic() && (text.len() < threshold || text.trim().is_empty());

        if small {
            if drafts.get(i + 1).is_some_and(|next| !next.is_atomic()) {
                drafts[i + 1].start = drafts[i].start;
                drafts.remove(i);
                continue;
            }
            if i > 0 && !drafts[i - 1].is_atomic() {
                drafts[i - 1].end = drafts[i].end;
                drafts.remove(i);
                continue;
            }
        }

        i += 1;
    }
}

fn finish_chunk(content: &str, id: usize, draft: Draft, fold_threshold: usize) -> Chunk {
    let text = &content[draft.start..draft.end];

    let kind = match draft.kind {
        ChunkKind::Text if LIST_MARKER.is_match(text.trim_start()) => ChunkKind::ListItem,
        kind => kind,
    };

    let is_above_fold = draft.start < fold_threshold;
    let mut priority = 1;
    if is_above_fold {
        priority += 2;
    }
    if matches!(kind, ChunkKind::Header { .. }) {
        priority += 1;
    }

    Chunk {
        id,
        content: text.to_string(),
        is_atomic: kind.is_atomic(),
        kind,
        start_offset: draft.start,
        end_offset: draft.end,
        priority,
        is_above_fold,
    }
}
