#![forbid(unsafe_code)]

use bytes::{Bytes, BytesMut};
use brook_net::{Headers, Net, NetError, RangeSpec};
use futures::{Stream, StreamExt};
use tracing::{debug, warn};
use url::Url;

/// Sequential byte-range fetch pipeline.
///
/// Issues inclusive windows one at a time: no second request is in flight
/// before the prior one resolves, windows are contiguous and never overlap
/// or go out of order. The first window is `[start, start + chunk_size]`;
/// each following window is
/// `[min(len, end + 1), min(len, min(len, end + 1) + chunk_size)]`.
/// The sequence terminates when the next window is empty — there is no
/// explicit end-of-data item.
///
/// Each yielded payload is one fully-collected window body. A body whose
/// length differs from the requested window is logged and accepted; the
/// bytes still count.
pub struct RangeSequence<N> {
    net: N,
    url: Url,
    headers: Option<Headers>,
    content_len: u64,
    chunk_size: u64,
}

impl<N> RangeSequence<N>
where
    N: Net + Send + Sync + 'static,
{
    pub fn new(
        net: N,
        url: Url,
        headers: Option<Headers>,
        content_len: u64,
        chunk_size: u64,
    ) -> Self {
        Self {
            net,
            url,
            headers,
            content_len,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Window following `[_, end]`, or `None` when the content is exhausted.
    fn next_window(content_len: u64, end: u64, chunk_size: u64) -> Option<(u64, u64)> {
        let next_start = content_len.min(end.saturating_add(1));
        let next_end = content_len.min(next_start.saturating_add(chunk_size));
        (next_end > next_start).then_some((next_start, next_end))
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, NetError>> + Send + 'static {
        let mut start = 0u64;
        let mut end = self.chunk_size;

        async_stream::stream! {
            loop {
                let range = RangeSpec::new(start, Some(end));
                let mut body = match self
                    .net
                    .get_range(self.url.clone(), range.clone(), self.headers.clone())
                    .await
                {
                    Ok(body) => body,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                let mut payload = BytesMut::new();
                let mut failed = false;
                while let Some(next) = body.next().await {
                    match next {
                        Ok(bytes) => payload.extend_from_slice(&bytes),
                        Err(e) => {
                            yield Err(e);
                            failed = true;
                            break;
                        }
                    }
                }
                if failed {
                    return;
                }

                if let Some(expected) = range.expected_len()
                    && payload.len() as u64 != expected
                {
                    warn!(
                        content_len = self.content_len,
                        start,
                        end,
                        expected,
                        received = payload.len(),
                        "range payload length mismatch"
                    );
                }

                yield Ok(payload.freeze());

                match Self::next_window(self.content_len, end, self.chunk_size) {
                    Some((next_start, next_end)) => {
                        start = next_start;
                        end = next_end;
                    }
                    None => {
                        debug!(content_len = self.content_len, "range windows exhausted");
                        return;
                    }
                }
            }
        }
    }
}
