//! `brook`
//!
//! Remote media byte loading under two delivery regimes.
//!
//! ## Design goals
//! - Live: forward every received payload immediately, unbuffered
//! - VOD: accumulate into a grow-only buffer, release fixed-size chunks
//!   paced by playback progress rather than network arrival
//! - One outstanding network operation per session: a long-lived
//!   incremental read loop, or strictly sequential byte-range fetches when
//!   the transport or device class rules the stream path out

#![forbid(unsafe_code)]

pub mod config;
pub mod emitter;
mod error;
mod fetch;
pub mod meter;
mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use config::{Delivery, DeviceClass, LoaderConfig};
pub use emitter::ChunkEmitter;
pub use error::{LoaderError, LoaderResult};
pub use fetch::RangeSequence;
pub use meter::RateMeter;
pub use session::{Loader, LoaderHandle, PlaybackProgress, PROGRESS_GAP_SECS};
