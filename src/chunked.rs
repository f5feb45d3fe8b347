//! Chunked write protocol for payloads larger than one transfer unit.
//!
//! A payload is split into `ceil(len / chunk_size)` chunks, every chunk
//! exactly `chunk_size` long except possibly the last:
//!
//! ```text
//! payload (300 B), chunk_size 100
//! ┌───────────┬───────────┬───────────┐
//! │ chunk 1   │ chunk 2   │ chunk 3   │
//! │ 100 B     │ 100 B     │ 100 B     │
//! └───────────┴───────────┴───────────┘
//! ```
//!
//! [`ChunkedTransfer`] sequences them with strict backpressure: a chunk is
//! only handed out after the previous one was acknowledged.  It does no
//! I/O; the write driver in [`crate::connection`] feeds it completions.

/// Split `data` into `chunk_size`-byte slices.  Empty input or a zero
/// chunk size yields no chunks.
pub fn split(data: &[u8], chunk_size: usize) -> Vec<&[u8]> {
    if chunk_size == 0 {
        return Vec::new();
    }
    data.chunks(chunk_size).collect()
}

/// Progress report emitted after each acknowledged chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteProgress {
    pub written: usize,
    pub total: usize,
}

impl WriteProgress {
    /// `written / total` in `[0.0, 1.0]`.
    pub fn fraction(self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.written as f64 / self.total as f64
    }

    pub fn is_complete(self) -> bool {
        self.written == self.total
    }
}

/// Send-side state of one chunked write.
#[derive(Debug)]
pub struct ChunkedTransfer {
    payload: Vec<u8>,
    chunk_size: usize,
    /// Offset of the next chunk to hand out.
    offset: usize,
    /// Length of the chunk currently awaiting acknowledgement.
    in_flight: Option<usize>,
    written: usize,
    abandoned: bool,
}

impl ChunkedTransfer {
    /// `None` for an empty payload or a zero chunk size: nothing to do.
    pub fn new(payload: Vec<u8>, chunk_size: usize) -> Option<Self> {
        if payload.is_empty() || chunk_size == 0 {
            return None;
        }
        Some(Self {
            payload,
            chunk_size,
            offset: 0,
            in_flight: None,
            written: 0,
            abandoned: false,
        })
    }

    pub fn total(&self) -> usize {
        self.payload.len()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> usize {
        self.payload.len().div_ceil(self.chunk_size)
    }

    /// Bytes of acknowledged chunks.
    pub fn written(&self) -> usize {
        self.written
    }

    /// 1-based index of the chunk in flight, if any.
    pub fn in_flight_index(&self) -> Option<usize> {
        self.in_flight.map(|_| self.offset.div_ceil(self.chunk_size))
    }

    pub fn is_complete(&self) -> bool {
        !self.abandoned && self.written == self.payload.len()
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    /// Hand out the next chunk.  Returns `None` while a chunk is still in
    /// flight, after completion, or after a failure.
    pub fn next_chunk(&mut self) -> Option<Vec<u8>> {
        if self.in_flight.is_some() || self.abandoned || self.offset >= self.payload.len() {
            return None;
        }
        let end = (self.offset + self.chunk_size).min(self.payload.len());
        let chunk = self.payload[self.offset..end].to_vec();
        self.in_flight = Some(chunk.len());
        self.offset = end;
        Some(chunk)
    }

    /// Record acknowledgement of the chunk in flight, counting its true
    /// length.  Returns `None` if nothing was in flight.
    pub fn on_chunk_acked(&mut self) -> Option<WriteProgress> {
        let len = self.in_flight.take()?;
        self.written += len;
        Some(WriteProgress {
            written: self.written,
            total: self.payload.len(),
        })
    }

    /// Record failure of the chunk in flight and abandon the rest.
    /// Returns the bytes of chunks acknowledged before it.
    pub fn on_chunk_failed(&mut self) -> usize {
        self.in_flight = None;
        self.abandoned = true;
        self.written
    }

    /// The full payload being written.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

// ── Tests ────────────────────────────────────────────────────
