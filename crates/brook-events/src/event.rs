#![forbid(unsafe_code)]

use bytes::Bytes;

/// Signals emitted over one loading session.
///
/// `Data` payloads arrive in strictly increasing offset order with no gaps
/// and no overlaps. Exactly one of `Ended` / `Failed` / silent range-window
/// exhaustion terminates a session.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Loading is about to begin; published before any network activity.
    Started,
    /// Incremental source exhausted cleanly. Range-fetch sessions end
    /// implicitly when the window sequence runs out.
    Ended,
    /// Transport failure; the session aborts without retry.
    Failed { error: String },
    /// One delivered payload (live) or one sliced chunk (VOD).
    Data(Bytes),
    /// Periodic throughput report.
    Throughput { bytes_per_second: u64 },
}

impl StreamEvent {
    /// Payload bytes if this is a `Data` event.
    pub fn data(&self) -> Option<&Bytes> {
        match self {
            Self::Data(bytes) => Some(bytes),
            _ => None,
        }
    }
}
