#![forbid(unsafe_code)]

//! Loader orchestration: strategy selection, the session loop, and the
//! handle the playback side drives it with.

use brook_events::{EventBus, StreamEvent};
use brook_net::{ByteStream, Net};
use futures::StreamExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    config::{Delivery, DeviceClass, LoaderConfig},
    emitter::ChunkEmitter,
    error::{LoaderError, LoaderResult},
    fetch::RangeSequence,
    meter::RateMeter,
};

/// VOD chunks are released only while the buffered playback duration runs
/// this close (in seconds) to the playhead.
pub const PROGRESS_GAP_SECS: f64 = 5.0;

/// One playback clock report.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackProgress {
    /// Current playback position in seconds.
    pub position_secs: f64,
    /// Total loaded/seekable duration in seconds.
    pub loaded_secs: f64,
}

impl PlaybackProgress {
    fn wants_chunk(&self) -> bool {
        self.loaded_secs - self.position_secs <= PROGRESS_GAP_SECS
    }
}

/// Handle to a running loader session.
///
/// Dropping the handle does not stop the session; call
/// [`shutdown`](Self::shutdown) for teardown.
pub struct LoaderHandle {
    progress_tx: mpsc::Sender<PlaybackProgress>,
    cancel: CancellationToken,
    task: JoinHandle<LoaderResult<()>>,
}

impl LoaderHandle {
    /// Report playback progress (VOD pacing input).
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::ChannelClosed`] when the session task has
    /// already finished.
    pub async fn progress(&self, position_secs: f64, loaded_secs: f64) -> LoaderResult<()> {
        self.progress_tx
            .send(PlaybackProgress {
                position_secs,
                loaded_secs,
            })
            .await
            .map_err(|_| LoaderError::ChannelClosed)
    }

    /// Tear the session down: cancel the open reader (if any), discard the
    /// buffer, suppress any follow-up range request.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Token observed by the session; cancel it for teardown from elsewhere.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the session task to finish.
    ///
    /// # Errors
    ///
    /// Returns the session's own error, or [`LoaderError::TaskJoin`] if the
    /// task panicked.
    pub async fn join(self) -> LoaderResult<()> {
        let Self {
            progress_tx, task, ..
        } = self;
        // No progress can arrive once the handle is consumed; close the
        // channel so a draining session can finish.
        drop(progress_tx);
        task.await.map_err(|e| LoaderError::TaskJoin(e.to_string()))?
    }
}

/// Loader for one remote media resource.
///
/// Picks the transport strategy once at spawn: the long-lived incremental
/// read loop when the transport supports it and the device class allows,
/// otherwise the probe-then-sequential-range path. Exactly one network
/// operation is ever outstanding.
pub struct Loader;

impl Loader {
    /// Spawn a loading session onto the current Tokio runtime.
    pub fn spawn<N>(config: LoaderConfig, net: N, bus: EventBus) -> LoaderHandle
    where
        N: Net + Send + Sync + 'static,
    {
        let cancel = config.cancel.clone().unwrap_or_default();
        let (progress_tx, progress_rx) = mpsc::channel(16);

        let session = Session {
            config,
            bus,
            cancel: cancel.clone(),
            progress_rx,
        };
        let task = tokio::spawn(session.run(net));

        LoaderHandle {
            progress_tx,
            cancel,
            task,
        }
    }
}

struct Session {
    config: LoaderConfig,
    bus: EventBus,
    cancel: CancellationToken,
    progress_rx: mpsc::Receiver<PlaybackProgress>,
}

impl Session {
    async fn run<N>(self, net: N) -> LoaderResult<()>
    where
        N: Net + Send + Sync + 'static,
    {
        let incremental =
            net.supports_streaming() && self.config.device_class != DeviceClass::Mobile;
        debug!(
            url = %self.config.url,
            delivery = ?self.config.delivery,
            incremental,
            "session start"
        );
        self.bus.publish(StreamEvent::Started);

        let source: ByteStream = if incremental {
            match net
                .stream(self.config.url.clone(), self.config.headers.clone())
                .await
            {
                Ok(stream) => stream,
                Err(e) => return self.fail_open(e),
            }
        } else {
            let probed = match net
                .head(self.config.url.clone(), self.config.headers.clone())
                .await
            {
                Ok(headers) => headers.content_length(),
                Err(e) => return self.fail_open(e),
            };
            let content_len = probed.or(self.config.fallback_size).unwrap_or_else(|| {
                warn!(
                    url = %self.config.url,
                    "content length unavailable from probe or configuration"
                );
                0
            });

            Box::pin(
                RangeSequence::new(
                    net,
                    self.config.url.clone(),
                    self.config.headers.clone(),
                    content_len,
                    self.config.chunk_size,
                )
                .into_stream(),
            )
        };

        self.pump(source, incremental).await
    }

    fn fail_open(&self, error: brook_net::NetError) -> LoaderResult<()> {
        self.bus.publish(StreamEvent::Failed {
            error: error.to_string(),
        });
        Err(LoaderError::Net(error))
    }

    /// Drive the session loop: teardown first, then pacing, then transport.
    async fn pump(mut self, mut source: ByteStream, explicit_end: bool) -> LoaderResult<()> {
        let mut emitter =
            ChunkEmitter::with_interval(self.config.chunk_size as usize, self.config.emit_interval);
        let mut meter = RateMeter::with_window(self.config.rate_window);
        let mut total_bytes: u64 = 0;

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    debug!(total_bytes, "session cancelled");
                    emitter.release();
                    return Ok(());
                }

                Some(progress) = self.progress_rx.recv() => {
                    if self.config.delivery == Delivery::Vod
                        && progress.wants_chunk()
                        && let Some(chunk) = emitter.try_emit()
                    {
                        self.bus.publish(StreamEvent::Data(chunk));
                    }
                }

                next = source.next() => {
                    let Some(next) = next else {
                        break;
                    };

                    let payload = match next {
                        Ok(payload) => payload,
                        Err(e) => {
                            self.bus.publish(StreamEvent::Failed {
                                error: e.to_string(),
                            });
                            return Err(LoaderError::Transport(e));
                        }
                    };
                    if payload.is_empty() {
                        warn!(total_bytes, "received empty payload");
                        continue;
                    }

                    total_bytes = total_bytes.saturating_add(payload.len() as u64);
                    if let Some(rate) = meter.record(payload.len()) {
                        self.bus.publish(StreamEvent::Throughput {
                            bytes_per_second: rate,
                        });
                    }

                    match self.config.delivery {
                        Delivery::Live => self.bus.publish(StreamEvent::Data(payload)),
                        Delivery::Vod => {
                            emitter.append(&payload);
                            // Prime the consumer on first data, ahead of any
                            // playback progress report.
                            if !emitter.primed()
                                && let Some(chunk) = emitter.try_emit()
                            {
                                self.bus.publish(StreamEvent::Data(chunk));
                            }
                        }
                    }
                }
            }
        }

        if explicit_end {
            debug!(total_bytes, "stream end");
            self.bus.publish(StreamEvent::Ended);
        } else {
            debug!(total_bytes, "range windows exhausted");
        }

        if self.config.delivery == Delivery::Vod {
            self.drain(emitter).await?;
        }
        Ok(())
    }

    /// Transport is done but buffered bytes may remain; keep releasing
    /// chunks against playback progress until the cursor catches up.
    async fn drain(&mut self, mut emitter: ChunkEmitter) -> LoaderResult<()> {
        while emitter.cursor() < emitter.buffered() {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    debug!("session cancelled during drain");
                    emitter.release();
                    return Ok(());
                }

                progress = self.progress_rx.recv() => {
                    // No pacing source left once the handle is gone.
                    let Some(progress) = progress else { return Ok(()) };
                    if progress.wants_chunk()
                        && let Some(chunk) = emitter.try_emit()
                    {
                        self.bus.publish(StreamEvent::Data(chunk));
                    }
                }
            }
        }
        debug!(delivered = emitter.cursor(), "buffer drained");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use brook_net::NetError;
    use tokio::sync::broadcast::error::TryRecvError;
    use url::Url;

    use super::*;
    use crate::mock::ScriptedNet;

    fn url() -> Url {
        Url::parse("http://test/resource.flv").unwrap()
    }

    fn config() -> LoaderConfig {
        LoaderConfig::new(url())
            .with_chunk_size(4)
            .with_emit_interval(Duration::ZERO)
            .with_rate_window(Duration::ZERO)
    }

    async fn next_data(rx: &mut tokio::sync::broadcast::Receiver<StreamEvent>) -> Option<Bytes> {
        loop {
            match rx.recv().await {
                Ok(StreamEvent::Data(bytes)) => return Some(bytes),
                Ok(StreamEvent::Ended) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }

    #[tokio::test]
    async fn live_incremental_forwards_payloads_unbuffered() {
        let payloads = vec![
            Ok(Bytes::from(vec![1u8; 10])),
            Ok(Bytes::from(vec![2u8; 20])),
            Ok(Bytes::from(vec![3u8; 5])),
        ];
        let net = ScriptedNet::new(Bytes::new()).with_stream_payloads(payloads);
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();

        let handle = Loader::spawn(config().with_delivery(Delivery::Live), net, bus);

        assert_eq!(rx.recv().await.unwrap(), StreamEvent::Started);
        // Payload boundaries are the delivery boundaries: 10, 20, 5.
        assert_eq!(next_data(&mut rx).await.unwrap().len(), 10);
        assert_eq!(next_data(&mut rx).await.unwrap().len(), 20);
        assert_eq!(next_data(&mut rx).await.unwrap().len(), 5);
        assert_eq!(next_data(&mut rx).await, None, "ended after 3 payloads");

        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn mobile_device_is_forced_onto_the_range_path() {
        let net = ScriptedNet::new(Bytes::from(vec![7u8; 10]));
        let requests = net.requests_handle();
        let bus = EventBus::new(64);

        let handle = Loader::spawn(
            config().with_device_class(DeviceClass::Mobile),
            net,
            bus.clone(),
        );
        handle.join().await.unwrap();

        assert_eq!(
            requests.lock().unwrap().as_slice(),
            ["bytes=0-4", "bytes=5-9"],
            "capable transport, but mobile class forces sequential ranges"
        );
    }

    #[tokio::test]
    async fn non_streaming_transport_falls_back_to_ranges() {
        let net = ScriptedNet::new(Bytes::from(vec![7u8; 6])).without_streaming();
        let requests = net.requests_handle();

        let handle = Loader::spawn(config(), net, EventBus::new(64));
        handle.join().await.unwrap();

        assert_eq!(requests.lock().unwrap().as_slice(), ["bytes=0-4", "bytes=5-6"]);
    }

    #[tokio::test]
    async fn vod_primes_one_chunk_then_waits_for_progress() {
        let net = ScriptedNet::new(Bytes::from(vec![9u8; 12])).without_streaming();
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();

        let handle = Loader::spawn(config(), net, bus);

        assert_eq!(rx.recv().await.unwrap(), StreamEvent::Started);
        let primed = next_data(&mut rx).await.unwrap();
        assert_eq!(primed.len(), 4, "priming emission, one chunk only");

        // Nothing further without a progress report.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        // Playhead close to the loaded edge: release the rest. A report may
        // land while the cursor has caught up to the buffer, so keep
        // reporting until every byte is out.
        let mut delivered = primed.to_vec();
        while delivered.len() < 12 {
            let _ = handle.progress(10.0, 12.0).await;
            match tokio::time::timeout(Duration::from_millis(20), next_data(&mut rx)).await {
                Ok(Some(chunk)) => delivered.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(_) => {}
            }
        }
        assert_eq!(delivered, vec![9u8; 12], "no byte duplicated or skipped");

        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn progress_with_a_wide_gap_releases_nothing() {
        let net = ScriptedNet::new(Bytes::from(vec![1u8; 12])).without_streaming();
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();

        let handle = Loader::spawn(config(), net, bus);

        assert_eq!(rx.recv().await.unwrap(), StreamEvent::Started);
        assert!(next_data(&mut rx).await.is_some(), "priming chunk");

        // Buffered 20s ahead of the playhead: no release.
        handle.progress(0.0, 20.0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        handle.shutdown();
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn teardown_cancels_the_open_reader() {
        let net = ScriptedNet::new(Bytes::new())
            .with_stream_payloads(vec![Ok(Bytes::from(vec![1u8; 8]))])
            .hang_stream_after(1);
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();

        let handle = Loader::spawn(config().with_delivery(Delivery::Live), net, bus);

        assert_eq!(rx.recv().await.unwrap(), StreamEvent::Started);
        assert_eq!(next_data(&mut rx).await.unwrap().len(), 8);

        handle.shutdown();
        handle.join().await.unwrap();

        // No further streaming events after teardown.
        loop {
            match rx.try_recv() {
                Ok(event) => assert!(event.data().is_none()),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(e) => panic!("unexpected recv error: {e}"),
            }
        }
    }

    #[tokio::test]
    async fn missing_content_length_still_issues_the_first_window() {
        let net = ScriptedNet::new(Bytes::from(vec![5u8; 20]))
            .without_streaming()
            .without_content_length();
        let requests = net.requests_handle();
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();

        let handle = Loader::spawn(config(), net, bus);
        handle.join().await.unwrap();

        // Degraded length 0: one window at offset 0, then exhaustion.
        assert_eq!(requests.lock().unwrap().as_slice(), ["bytes=0-4"]);
        assert_eq!(rx.recv().await.unwrap(), StreamEvent::Started);
        assert_eq!(next_data(&mut rx).await.unwrap().len(), 4, "still primed");
    }

    #[tokio::test]
    async fn transport_failure_publishes_failed_and_aborts() {
        let net = ScriptedNet::new(Bytes::from(vec![0u8; 10]))
            .without_streaming()
            .fail_range_requests();
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();

        let handle = Loader::spawn(config(), net, bus);
        let result = handle.join().await;

        assert!(matches!(result, Err(LoaderError::Transport(_))));
        assert_eq!(rx.recv().await.unwrap(), StreamEvent::Started);
        let failed = loop {
            match rx.recv().await.unwrap() {
                StreamEvent::Failed { error } => break error,
                other => panic!("expected Failed, got {other:?}"),
            }
        };
        assert!(failed.contains("503"), "error surfaced: {failed}");
    }

    #[tokio::test]
    async fn incremental_error_mid_stream_aborts_without_retry() {
        let net = ScriptedNet::new(Bytes::new()).with_stream_payloads(vec![
            Ok(Bytes::from(vec![1u8; 4])),
            Err(NetError::http("connection reset")),
        ]);
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();

        let handle = Loader::spawn(config().with_delivery(Delivery::Live), net, bus);
        let result = handle.join().await;

        assert!(matches!(result, Err(LoaderError::Transport(_))));
        assert_eq!(rx.recv().await.unwrap(), StreamEvent::Started);
        assert_eq!(next_data(&mut rx).await.unwrap().len(), 4);
        assert!(matches!(
            rx.recv().await.unwrap(),
            StreamEvent::Failed { .. }
        ));
    }
}
