#![forbid(unsafe_code)]

use brook_net::NetError;
use thiserror::Error;

/// Errors produced by a loader session.
///
/// Notes:
/// - Every transport failure is also published as
///   [`StreamEvent::Failed`](brook_events::StreamEvent) before the session
///   aborts; the variants here are what the session task itself returns.
/// - There is no retry anywhere: each failure is terminal for the current
///   session and the caller decides whether to build a new one.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("transport open failed: {0}")]
    Net(#[source] NetError),

    #[error("stream transport failed: {0}")]
    Transport(#[source] NetError),

    #[error("loader task ended; channel closed")]
    ChannelClosed,

    #[error("loader task join error: {0}")]
    TaskJoin(String),
}

/// Result type for loader sessions.
pub type LoaderResult<T> = Result<T, LoaderError>;
