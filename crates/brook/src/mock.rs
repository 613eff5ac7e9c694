#![forbid(unsafe_code)]

//! Scripted [`Net`] transport for tests.
//!
//! Serves a fixed in-memory resource: range requests slice it with
//! server-side clamping, incremental streams replay a scripted payload
//! sequence, and the probe answers from a configurable header map.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use brook_net::{ByteStream, Headers, Net, NetError, RangeSpec};
use futures::{StreamExt, stream};
use url::Url;

#[derive(Clone)]
pub struct ScriptedNet {
    data: Bytes,
    stream_payloads: Vec<Result<Bytes, NetError>>,
    head: Headers,
    streaming: bool,
    fail_ranges: bool,
    hang_stream_after: Option<usize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ScriptedNet {
    /// Transport serving `data`, with a probe reporting its length.
    pub fn new(data: Bytes) -> Self {
        let mut head = Headers::new();
        head.insert("content-length", data.len().to_string());
        Self {
            data,
            stream_payloads: Vec::new(),
            head,
            streaming: true,
            fail_ranges: false,
            hang_stream_after: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Payload sequence replayed by `stream()`.
    pub fn with_stream_payloads(mut self, payloads: Vec<Result<Bytes, NetError>>) -> Self {
        self.stream_payloads = payloads;
        self
    }

    /// Report no incremental-read capability, forcing the range path.
    pub fn without_streaming(mut self) -> Self {
        self.streaming = false;
        self
    }

    /// Probe responds without a `content-length` header.
    pub fn without_content_length(mut self) -> Self {
        self.head = Headers::new();
        self
    }

    /// Every range request fails.
    pub fn fail_range_requests(mut self) -> Self {
        self.fail_ranges = true;
        self
    }

    /// `stream()` yields this many payloads, then pends forever.
    pub fn hang_stream_after(mut self, payloads: usize) -> Self {
        self.hang_stream_after = Some(payloads);
        self
    }

    /// Shared log of issued `Range` header values.
    pub fn requests_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.requests)
    }

    fn slice(&self, range: &RangeSpec) -> Bytes {
        let len = self.data.len() as u64;
        if range.start >= len {
            return Bytes::new();
        }
        // Inclusive end, clamped to the resource the way a server would.
        let end = range.end.map_or(len, |e| len.min(e + 1));
        self.data.slice(range.start as usize..end as usize)
    }
}

#[async_trait]
impl Net for ScriptedNet {
    async fn get_bytes(&self, _url: Url, _headers: Option<Headers>) -> Result<Bytes, NetError> {
        Ok(self.data.clone())
    }

    async fn stream(&self, _url: Url, _headers: Option<Headers>) -> Result<ByteStream, NetError> {
        let items = stream::iter(self.stream_payloads.clone());
        match self.hang_stream_after {
            Some(n) => Ok(Box::pin(items.take(n).chain(stream::pending()))),
            None => Ok(Box::pin(items)),
        }
    }

    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        _headers: Option<Headers>,
    ) -> Result<ByteStream, NetError> {
        self.requests
            .lock()
            .expect("requests log poisoned")
            .push(range.to_header_value());

        if self.fail_ranges {
            return Err(NetError::http_status(503, url.to_string()));
        }

        let payload = self.slice(&range);
        Ok(Box::pin(stream::iter([Ok(payload)])))
    }

    async fn head(&self, _url: Url, _headers: Option<Headers>) -> Result<Headers, NetError> {
        Ok(self.head.clone())
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }
}
