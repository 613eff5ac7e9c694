#![forbid(unsafe_code)]

//! Configuration for a [`Loader`](crate::Loader) session.

use std::time::Duration;

use brook_net::{Headers, NetOptions};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Delivery regime for one session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Delivery {
    /// Forward every received payload immediately, no buffering.
    Live,
    /// Accumulate into a buffer, release fixed-size chunks paced by
    /// playback progress.
    #[default]
    Vod,
}

/// Device class of the playback host.
///
/// Mobile hosts are forced onto the sequential range-fetch path even when
/// the transport supports incremental reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeviceClass {
    #[default]
    Desktop,
    Mobile,
}

/// Unified configuration for one loading session.
///
/// # Example
///
/// ```ignore
/// use brook::{Delivery, LoaderConfig};
///
/// let config = LoaderConfig::new("https://example.com/video.flv".parse()?)
///     .with_chunk_size(1024 * 1024)
///     .with_delivery(Delivery::Vod)
///     .with_fallback_size(10_000_000);
/// ```
#[derive(Clone, Debug)]
pub struct LoaderConfig {
    /// Resource locator.
    pub url: Url,
    /// Extra request headers sent with every request of the session.
    pub headers: Option<Headers>,
    /// Chunk size in bytes: the VOD emission slice size and the range
    /// request window size.
    pub chunk_size: u64,
    /// Delivery regime.
    pub delivery: Delivery,
    /// Caller-supplied total size, used when the server does not report
    /// `content-length` on the probe.
    pub fallback_size: Option<u64>,
    /// Device class of the playback host.
    pub device_class: DeviceClass,
    /// Network configuration (timeouts, pooling).
    pub net: NetOptions,
    /// Cancellation token for teardown.
    pub cancel: Option<CancellationToken>,
    /// Minimum interval between VOD chunk emissions.
    pub emit_interval: Duration,
    /// Throughput sampling window.
    pub rate_window: Duration,
}

impl LoaderConfig {
    /// Default emission slice / range window size.
    pub const DEFAULT_CHUNK_SIZE: u64 = 256 * 1024;

    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: None,
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            delivery: Delivery::default(),
            fallback_size: None,
            device_class: DeviceClass::default(),
            net: NetOptions::default(),
            cancel: None,
            emit_interval: crate::emitter::EMIT_INTERVAL,
            rate_window: crate::meter::SAMPLE_WINDOW,
        }
    }

    /// Set extra request headers.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Set chunk size in bytes.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set delivery regime.
    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Set the fallback total size for when the probe reports no length.
    pub fn with_fallback_size(mut self, size: u64) -> Self {
        self.fallback_size = Some(size);
        self
    }

    /// Set device class.
    pub fn with_device_class(mut self, device_class: DeviceClass) -> Self {
        self.device_class = device_class;
        self
    }

    /// Set network options.
    pub fn with_net(mut self, net: NetOptions) -> Self {
        self.net = net;
        self
    }

    /// Set cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Set the minimum interval between VOD chunk emissions.
    pub fn with_emit_interval(mut self, interval: Duration) -> Self {
        self.emit_interval = interval;
        self
    }

    /// Set the throughput sampling window.
    pub fn with_rate_window(mut self, window: Duration) -> Self {
        self.rate_window = window;
        self
    }
}
