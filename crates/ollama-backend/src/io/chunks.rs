#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;

/// The transport dropped the connection mid-body.
#[derive(Debug, PartialEq, Eq)]
pub struct Error;

/// A source of raw body bytes, either a live HTTP response or a
/// scripted sequence in tests.
pub enum Chunks {
    Response(Response),
    #[cfg(test)]
    Scripted(VecDeque<Bytes>),
}

impl Chunks {
    #[inline]
    pub fn from_response(response: Response) -> Self {
        Chunks::Response(response)
    }

    #[cfg(test)]
    pub fn scripted(chunks: impl Into<VecDeque<Bytes>>) -> Self {
        Chunks::Scripted(chunks.into())
    }

    /// Reads the next body chunk; `None` means the body ended.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self {
            Chunks::Response(response) => {
                response.chunk().await.map_err(|_| Error)
            }
            #[cfg(test)]
            Chunks::Scripted(chunks) => Ok(chunks.pop_front()),
        }
    }
}
