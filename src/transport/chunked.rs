//! Decoder for `Transfer-Encoding: chunked` bodies.
//!
//! ```text
//! 4\r\n
//! Wiki\r\n
//! 5\r\n
//! pedia\r\n
//! 0\r\n
//! \r\n
//! ```
//!
//! The zero-length chunk is the only valid terminator. Anything after the
//! trailer section is rejected, as is a body that ends before the
//! terminator.

use thiserror::Error;

/// Reasons a chunked body could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    #[error("Invalid chunk size line: {0:?}")]
    InvalidSize(String),

    #[error("Chunk data not followed by CRLF at offset {0}")]
    MissingChunkTerminator(usize),

    #[error("Chunked body truncated before terminal chunk")]
    Truncated,

    #[error("{0} unexpected bytes after terminal chunk")]
    TrailingData(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Size,
    Data(usize),
    DataCrlf,
    Trailer,
    Done,
}

/// Reassemble a chunked body into its payload bytes.
pub fn decode_chunked(input: &[u8]) -> Result<Vec<u8>, ChunkError> {
    let mut decoded = Vec::with_capacity(input.len());
    let mut pos = 0;
    let mut state = State::Size;

    loop {
        match state {
            State::Size => {
                let line = next_line(input, pos).ok_or(ChunkError::Truncated)?;
                pos += line.len() + 2;
                let size = parse_size(line)?;
                state = if size == 0 {
                    State::Trailer
                } else {
                    State::Data(size)
                };
            }
            State::Data(size) => {
                let end = pos.checked_add(size).ok_or(ChunkError::Truncated)?;
                if end > input.len() {
                    return Err(ChunkError::Truncated);
                }
                decoded.extend_from_slice(&input[pos..end]);
                pos = end;
                state = State::DataCrlf;
            }
            State::DataCrlf => {
                if input.len() < pos + 2 {
                    return Err(ChunkError::Truncated);
                }
                if &input[pos..pos + 2] != b"\r\n" {
                    return Err(ChunkError::MissingChunkTerminator(pos));
                }
                pos += 2;
                state = State::Size;
            }
            State::Trailer => {
                // Trailer fields are skipped until the blank line.
                let line = next_line(input, pos).ok_or(ChunkError::Truncated)?;
                pos += line.len() + 2;
                if line.is_empty() {
                    state = State::Done;
                }
            }
            State::Done => {
                if pos != input.len() {
                    return Err(ChunkError::TrailingData(input.len() - pos));
                }
                return Ok(decoded);
            }
        }
    }
}

/// Bytes from `pos` up to (not including) the next CRLF.
fn next_line(input: &[u8], pos: usize) -> Option<&[u8]> {
    let rest = input.get(pos..)?;
    rest.windows(2)
        .position(|w| w == b"\r\n")
        .map(|end| &rest[..end])
}

fn parse_size(line: &[u8]) -> Result<usize, ChunkError> {
    let text = std::str::from_utf8(line)
        .map_err(|_| ChunkError::InvalidSize(String::from_utf8_lossy(line).into_owned()))?;
    // Chunk extensions (";name=value") are ignored.
    let digits = text.split(';').next().unwrap_or_default().trim();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ChunkError::InvalidSize(text.to_string()));
    }
    usize::from_str_radix(digits, 16).map_err(|_| ChunkError::InvalidSize(text.to_string()))
}
