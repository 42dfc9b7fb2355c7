use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading newline-delimited JSON lines from a chunk
/// stream.
///
/// Blank lines are skipped; a trailing line without a final newline is
/// still yielded when the stream ends.
pub struct Lines {
    buf: String,
    chunks: Chunks,
}

impl Lines {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: String::new(),
            chunks,
        }
    }

    pub async fn next_line(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(line) = self.take_buffered_line() {
                return Ok(Some(line));
            }

            let Some(bytes) = self
                .chunks
                .next_chunk()
                .await
                .map_err(Error::ChunksError)?
            else {
                // The body ended; flush whatever is left.
                let rest = std::mem::take(&mut self.buf);
                let rest = rest.trim();
                if rest.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(rest.to_owned()));
            };
            let Ok(s) = str::from_utf8(&bytes) else {
                return Err(Error::InvalidPayload);
            };
            self.buf.push_str(s);
        }
    }

    fn take_buffered_line(&mut self) -> Option<String> {
        loop {
            let eol_idx = self.buf.find('\n')?;
            let line: String = self.buf.drain(..=eol_idx).collect();
            let line = line.trim();
            if !line.is_empty() {
                return Some(line.to_owned());
            }
        }
    }
}
