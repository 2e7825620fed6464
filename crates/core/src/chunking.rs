use crate::error::IngestError;
use crate::models::IngestionOptions;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub separator: &'static str,
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl From<IngestionOptions> for ChunkingConfig {
    fn from(value: IngestionOptions) -> Self {
        Self {
            separator: value.chunk_separator,
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        IngestionOptions::default().into()
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.separator.is_empty() {
            return Err(IngestError::InvalidChunkConfig(
                "separator must not be empty".to_string(),
            ));
        }
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap ({}) must be less than max_chars ({})",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Splits `text` into overlapping chunks of at most `config.max_chars` characters.
///
/// Text that already fits is returned unchanged as a single chunk. Longer text
/// is split on the separator and re-merged greedily; each new chunk starts with
/// the trailing pieces of the previous one, up to `config.overlap_chars`.
pub fn split_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>, IngestError> {
    config.validate()?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    if char_len(text) <= config.max_chars {
        return Ok(vec![text.to_string()]);
    }

    let mut pieces = Vec::new();
    for piece in text.split(config.separator).filter(|piece| !piece.is_empty()) {
        if char_len(piece) > config.max_chars {
            pieces.extend(split_by_window(piece, config));
        } else {
            pieces.push(piece.to_string());
        }
    }

    Ok(merge_pieces(&pieces, config))
}

/// Hard split for a single piece that has no separator to break on.
fn split_by_window(piece: &str, config: &ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = piece.chars().collect();
    let step = config.max_chars - config.overlap_chars;

    let mut windows = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + config.max_chars).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    windows
}

fn merge_pieces(pieces: &[String], config: &ChunkingConfig) -> Vec<String> {
    let separator_len = char_len(config.separator);
    let mut chunks = Vec::new();
    let mut current: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(piece);
        let joiner = |current: &VecDeque<(&str, usize)>| {
            if current.is_empty() {
                0
            } else {
                separator_len
            }
        };

        if total + len + joiner(&current) > config.max_chars && !current.is_empty() {
            push_joined(&mut chunks, &current, config.separator);

            while total > config.overlap_chars
                || (total > 0 && total + len + joiner(&current) > config.max_chars)
            {
                let Some((_, dropped)) = current.pop_front() else {
                    break;
                };
                total -= dropped + joiner(&current);
            }
        }

        current.push_back((piece.as_str(), len));
        total += len + if current.len() > 1 { separator_len } else { 0 };
    }

    push_joined(&mut chunks, &current, config.separator);
    chunks
}

fn push_joined(chunks: &mut Vec<String>, current: &VecDeque<(&str, usize)>, separator: &str) {
    let joined = current
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
