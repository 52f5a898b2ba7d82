//! # Streaming Payload Generator
//!
//! Upload bodies are synthesized on demand instead of being held in memory.
//! A [`RandomPayload`] is a finite byte stream whose content is a pure
//! function of `(seed, position)`: every 8-byte word is produced in counter
//! mode by the SplitMix64 finalizer keyed with the seed and the word index.
//! Rewinding therefore never needs buffered history, and two instances built
//! from the same `(len, seed)` always yield byte-identical streams, which is
//! what lets `UploadAndRead` verify a download without keeping the upload.
//!
//! The stream implements [`std::io::Read`], [`std::io::Seek`] and
//! [`tokio::io::AsyncRead`] so it can be handed straight to a storage client.

use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::GenerationError;

/// Default upper bound on the bytes returned by a single read call.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

const WORD_SIZE: u64 = 8;
const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// SplitMix64 output function applied to the `index`-th counter of `seed`.
fn word_at(seed: u64, index: u64) -> u64 {
    let mut z = seed.wrapping_add(index.wrapping_add(1).wrapping_mul(GOLDEN_GAMMA));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// A reproducible pseudo-random byte stream of fixed length.
#[derive(Debug, Clone)]
pub struct RandomPayload {
    len: u64,
    seed: u64,
    position: u64,
    mark: Option<u64>,
    chunk_size: usize,
}

impl RandomPayload {
    /// Create a payload of `len` bytes derived from `seed`.
    pub fn new(len: u64, seed: u64) -> Self {
        Self {
            len,
            seed,
            position: 0,
            mark: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Create a payload whose reads return at most `chunk_size` bytes each.
    pub fn with_chunk_size(len: u64, seed: u64, chunk_size: usize) -> Result<Self, GenerationError> {
        if chunk_size == 0 {
            return Err(GenerationError::ZeroChunkSize);
        }
        Ok(Self {
            chunk_size,
            ..Self::new(len, seed)
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn remaining(&self) -> u64 {
        self.len - self.position
    }

    /// Read up to `length` bytes into `buf[offset..]`.
    ///
    /// Returns `Ok(None)` once the stream is exhausted. Reads are partial:
    /// at most `min(length, remaining, chunk_size)` bytes are produced.
    pub fn read_into(
        &mut self,
        buf: &mut [u8],
        offset: usize,
        length: usize,
    ) -> Result<Option<usize>, GenerationError> {
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= buf.len())
            .ok_or(GenerationError::OutOfBounds {
                offset,
                length,
                capacity: buf.len(),
            })?;

        if self.remaining() == 0 {
            return Ok(None);
        }

        let n = (length as u64)
            .min(self.remaining())
            .min(self.chunk_size as u64) as usize;
        self.fill(&mut buf[offset..end][..n]);
        Ok(Some(n))
    }

    /// Record the current position as the rewind point.
    ///
    /// `limit` is accepted for stream-API parity; since content is derived
    /// from the position, any number of bytes may be read before `reset`.
    pub fn mark(&mut self, _limit: usize) {
        self.mark = Some(self.position);
    }

    /// Rewind to the last mark, or to the start if none was set.
    pub fn reset(&mut self) {
        self.position = self.mark.unwrap_or(0);
    }

    /// SHA-256 hex digest of the bytes from the current position to the end.
    ///
    /// Consumes a clone, so `self` is left where it was.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        let mut stream = self.clone();
        let mut buf = vec![0u8; self.chunk_size.min(DEFAULT_CHUNK_SIZE)];
        let len = buf.len();
        while let Ok(Some(n)) = stream.read_into(&mut buf, 0, len) {
            hasher.update(&buf[..n]);
        }
        hex::encode(hasher.finalize())
    }

    fn fill(&mut self, out: &mut [u8]) {
        let mut pos = self.position;
        let mut written = 0;
        while written < out.len() {
            let word = word_at(self.seed, pos / WORD_SIZE).to_le_bytes();
            let start = (pos % WORD_SIZE) as usize;
            let take = (WORD_SIZE as usize - start).min(out.len() - written);
            out[written..written + take].copy_from_slice(&word[start..start + take]);
            written += take;
            pos += take as u64;
        }
        self.position = pos;
    }
}

impl io::Read for RandomPayload {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len();
        match self.read_into(buf, 0, len) {
            Ok(read) => Ok(read.unwrap_or(0)),
            Err(err) => Err(io::Error::new(io::ErrorKind::InvalidInput, err)),
        }
    }
}

impl io::Seek for RandomPayload {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        match target {
            Some(target) => {
                self.position = target.min(self.len);
                Ok(self.position)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of payload",
            )),
        }
    }
}

impl AsyncRead for RandomPayload {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let n = (buf.remaining() as u64)
            .min(self.remaining())
            .min(self.chunk_size as u64) as usize;

        let fill_buf = buf.initialize_unfilled_to(n);
        self.fill(fill_buf);
        buf.advance(n);

        Poll::Ready(Ok(()))
    }
}

/// Stream `reader` to the end and return its SHA-256 digest as lowercase hex.
pub async fn sha256_hex<R>(reader: &mut R) -> io::Result<String>
where
    R: AsyncRead + Unpin + ?Sized,
{
    use tokio::io::AsyncReadExt;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 8 * 1024];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
