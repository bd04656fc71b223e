//! Deterministic text segmentation.
//!
//! Splits extracted document text into bounded chunks for downstream
//! summarization. Pure function of its input: restartable, finite, and the
//! concatenation of its output reconstructs the original text up to
//! whitespace trimming at chunk boundaries.

use crate::defaults::CHUNK_SEPARATORS;
use crate::error::{Error, Result};

/// Split `text` into chunks of at least `min_chunk_size` bytes.
///
/// Scans greedily: once `min_chunk_size` bytes past the current position, the
/// boundary lands on the first occurrence of the highest-priority separator
/// found at-or-after that point (paragraph break, line break, sentence
/// terminators, then word space). The separator belongs to the chunk it ends.
/// A remainder shorter than `min_chunk_size`, or one with no separator left,
/// becomes the final chunk. Every chunk is whitespace-trimmed.
pub fn segment(text: &str, min_chunk_size: usize) -> Result<Vec<String>> {
    if min_chunk_size == 0 {
        return Err(Error::InvalidInput(
            "min_chunk_size must be greater than zero".into(),
        ));
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let mut chunks = Vec::new();
    let mut pos = 0;

    loop {
        if text.len() - pos <= min_chunk_size {
            chunks.push(text[pos..].trim().to_string());
            break;
        }

        // Separators are ASCII, but the text is not; nudge the search start
        // onto a char boundary.
        let mut start = pos + min_chunk_size;
        while start < text.len() && !text.is_char_boundary(start) {
            start += 1;
        }

        let boundary = CHUNK_SEPARATORS
            .iter()
            .find_map(|sep| text[start..].find(sep).map(|i| start + i + sep.len()));

        match boundary {
            Some(end) => {
                chunks.push(text[pos..end].trim().to_string());
                pos = end;
            }
            None => {
                chunks.push(text[pos..].trim().to_string());
                break;
            }
        }
    }

    Ok(chunks)
}
