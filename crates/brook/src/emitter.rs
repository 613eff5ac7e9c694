#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

use bytes::Bytes;

/// Minimum interval between two chunk emissions.
pub const EMIT_INTERVAL: Duration = Duration::from_millis(1000);

/// Accumulation buffer plus read cursor for VOD chunk delivery.
///
/// The buffer grows monotonically by payload concatenation and never
/// shrinks or rewrites written bytes. The cursor marks the next byte not
/// yet emitted and advances only through [`try_emit`](Self::try_emit), by
/// exactly the length of the emitted slice.
///
/// Emission is a pure time gate: at most one slice per interval, excess
/// attempts inside the window are dropped rather than queued. The gate
/// timestamp advances only when a chunk is actually emitted, so an attempt
/// against an empty buffer does not burn the window.
#[derive(Debug)]
pub struct ChunkEmitter {
    data: Vec<u8>,
    cursor: usize,
    chunk_size: usize,
    min_interval: Duration,
    last_emit: Option<Instant>,
}

impl ChunkEmitter {
    pub fn new(chunk_size: usize) -> Self {
        Self::with_interval(chunk_size, EMIT_INTERVAL)
    }

    pub fn with_interval(chunk_size: usize, min_interval: Duration) -> Self {
        Self {
            data: Vec::new(),
            cursor: 0,
            chunk_size: chunk_size.max(1),
            min_interval,
            last_emit: None,
        }
    }

    /// Append a received payload to the accumulation buffer.
    pub fn append(&mut self, payload: &[u8]) {
        self.data.extend_from_slice(payload);
    }

    /// Attempt one chunk emission.
    ///
    /// Returns the next slice `[cursor, min(cursor + chunk_size, len))` as
    /// an owned copy, or `None` when the time gate is closed or the buffer
    /// has not grown past the cursor. Never blocks, never yields an empty
    /// chunk.
    pub fn try_emit(&mut self) -> Option<Bytes> {
        if let Some(last) = self.last_emit
            && last.elapsed() < self.min_interval
        {
            return None;
        }

        let end = (self.cursor + self.chunk_size).min(self.data.len());
        if end == self.cursor {
            return None;
        }

        // Owned copy: the consumer must never observe later buffer growth.
        let chunk = Bytes::copy_from_slice(&self.data[self.cursor..end]);
        self.cursor = end;
        self.last_emit = Some(Instant::now());
        Some(chunk)
    }

    /// Whether any chunk has been emitted yet.
    ///
    /// Drives the one priming emission after the first payload arrives.
    pub fn primed(&self) -> bool {
        self.cursor > 0
    }

    /// Next byte offset not yet emitted.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Total bytes accumulated.
    pub fn buffered(&self) -> usize {
        self.data.len()
    }

    /// Discard the buffer on teardown.
    pub fn release(&mut self) {
        self.data = Vec::new();
        self.cursor = 0;
    }
}
