use crate::common::{body::ByteSource, runtime};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid status code: {0}")]
    InvalidStatusCode(u16),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("response sink is closed")]
    SinkClosed,
    #[error("cannot read response body source: {0}")]
    Source(#[from] std::io::Error),
    #[error("the buffered response body is unavailable because its source failed")]
    ReplayUnavailable,
}

/// The outbound half of the transport. A delivery calls `write_head` once, then
/// `write_chunk` any number of times, then `end`.
#[async_trait]
pub trait ResponseSink: Send {
    async fn write_head(&mut self, status: u16, headers: &[(String, String)]) -> Result<(), Error>;
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), Error>;
    async fn end(&mut self) -> Result<(), Error>;
}

// ************************************************************************************************
// BodyState
// ************************************************************************************************
/// Response body of a live expectation.
///
/// Lifecycle of a stream body on an expectation that can match more than once:
/// `Source` is drained by the first delivery and becomes `Draining` while that delivery
/// forwards and buffers the chunks. Once the buffer is complete the next delivery turns
/// it into `Ready`, and every later delivery writes that buffer. A stream body on an
/// expectation with `max == 1` is piped through without buffering.
pub(crate) enum BodyState {
    Ready(Bytes),
    Source(ByteSource),
    Draining(watch::Receiver<Option<Bytes>>),
}

impl BodyState {
    /// Produces the body of the next delivery and advances the lifecycle.
    pub(crate) fn next_delivery(&mut self, reusable: bool) -> DeliveryBody {
        match std::mem::replace(self, BodyState::Ready(Bytes::new())) {
            BodyState::Ready(body) => {
                *self = BodyState::Ready(body.clone());
                DeliveryBody::Full(body)
            }
            BodyState::Source(source) if !reusable => DeliveryBody::Pipe(source),
            BodyState::Source(source) => {
                let (replay, receiver) = watch::channel(None);
                *self = BodyState::Draining(receiver);
                DeliveryBody::Tee { source, replay }
            }
            BodyState::Draining(receiver) => {
                let buffered = receiver.borrow().clone();
                match buffered {
                    Some(body) => {
                        *self = BodyState::Ready(body.clone());
                        DeliveryBody::Full(body)
                    }
                    None => {
                        *self = BodyState::Draining(receiver.clone());
                        DeliveryBody::Replay(receiver)
                    }
                }
            }
        }
    }
}

pub(crate) enum DeliveryBody {
    Full(Bytes),
    Pipe(ByteSource),
    Tee {
        source: ByteSource,
        replay: watch::Sender<Option<Bytes>>,
    },
    Replay(watch::Receiver<Option<Bytes>>),
}

// ************************************************************************************************
// Delivery
// ************************************************************************************************
/// Everything needed to answer one matched request. It is taken from the queue while the
/// queue lock is held and written to the sink after the lock has been released.
pub(crate) struct Delivery {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub delay: Option<Duration>,
    pub body: DeliveryBody,
}

impl Delivery {
    pub(crate) async fn write_to(self, sink: &mut dyn ResponseSink) -> Result<(), Error> {
        if let Some(delay) = self.delay {
            runtime::sleep(delay).await;
        }

        sink.write_head(self.status, &self.headers).await?;

        match self.body {
            DeliveryBody::Full(body) => {
                if !body.is_empty() {
                    sink.write_chunk(body).await?;
                }
            }
            DeliveryBody::Pipe(mut source) => {
                while let Some(chunk) = source.next_chunk().await {
                    sink.write_chunk(chunk?).await?;
                }
            }
            DeliveryBody::Tee { source, replay } => tee(source, replay, sink).await?,
            DeliveryBody::Replay(mut receiver) => {
                let buffered = match receiver.wait_for(Option::is_some).await {
                    Ok(buffered) => buffered.clone(),
                    Err(_) => return Err(Error::ReplayUnavailable),
                };
                if let Some(body) = buffered {
                    if !body.is_empty() {
                        sink.write_chunk(body).await?;
                    }
                }
            }
        }

        sink.end().await
    }
}

/// Forwards every chunk to the sink and buffers it for later replays. The source is
/// drained completely even if the sink goes away, so the replay buffer stays complete.
async fn tee(
    mut source: ByteSource,
    replay: watch::Sender<Option<Bytes>>,
    sink: &mut dyn ResponseSink,
) -> Result<(), Error> {
    let mut buffer = BytesMut::new();
    let mut sink_error = None;

    while let Some(chunk) = source.next_chunk().await {
        let chunk = chunk?;
        buffer.extend_from_slice(&chunk);

        if sink_error.is_none() {
            if let Err(err) = sink.write_chunk(chunk).await {
                tracing::debug!("response sink failed while streaming, still buffering: {}", err);
                sink_error = Some(err);
            }
        }
    }

    tracing::trace!("buffered {} bytes of streamed response body", buffer.len());
    replay.send_replace(Some(buffer.freeze()));

    match sink_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
