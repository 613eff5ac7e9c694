use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use url::Url;

use crate::error::NetError;
use crate::types::{Headers, RangeSpec};

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, NetError>> + Send>>;

#[async_trait]
pub trait Net: Send + Sync {
    /// Get all bytes from a URL
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> Result<Bytes, NetError>;

    /// Stream bytes from a URL
    async fn stream(&self, url: Url, headers: Option<Headers>) -> Result<ByteStream, NetError>;

    /// Get a range of bytes from a URL
    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<Headers>,
    ) -> Result<ByteStream, NetError>;

    /// Issue a header-only probe and return the response headers
    async fn head(&self, url: Url, headers: Option<Headers>) -> Result<Headers, NetError>;

    /// Whether this transport can expose an incremental read stream.
    ///
    /// Transports that can only deliver fully-buffered payloads return
    /// `false`, which forces callers onto sequential range fetches.
    fn supports_streaming(&self) -> bool {
        true
    }
}
