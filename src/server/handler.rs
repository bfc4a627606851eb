use crate::{
    api::output,
    common::data::IncomingRequest,
    server::{
        delivery::{self, ResponseSink},
        state::StateManager,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

/// Body of the reply sent for unmatched requests when they are not treated as errors.
pub const NOT_FOUND_BODY: &str = "No Matching Response!\n";

#[derive(Error, Debug)]
pub enum Error {
    #[error("No Match For: {method} {url}")]
    UnmatchedRequest { method: String, url: String },
    #[error("cannot deliver response: {0}")]
    DeliveryError(#[from] delivery::Error),
}

#[async_trait]
pub(crate) trait Handler {
    async fn handle(&self, req: IncomingRequest, sink: &mut dyn ResponseSink) -> Result<(), Error>;
}

pub(crate) struct ExpectationHandler<S>
where
    S: StateManager + Send + Sync + 'static,
{
    state: Arc<S>,
    log_on_unmatched: bool,
    throw_on_unmatched: bool,
}

impl<S> ExpectationHandler<S>
where
    S: StateManager + Send + Sync + 'static,
{
    pub fn new(state: Arc<S>, log_on_unmatched: bool, throw_on_unmatched: bool) -> Self {
        Self {
            state,
            log_on_unmatched,
            throw_on_unmatched,
        }
    }

    async fn handle_unmatched(
        &self,
        req: IncomingRequest,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), Error> {
        if self.throw_on_unmatched {
            self.state.record_unmatched(&req);
            return Err(Error::UnmatchedRequest {
                method: req.method().to_string(),
                url: req.url().to_string(),
            });
        }

        if self.log_on_unmatched {
            self.log_unmatched(&req);
        }

        let headers = vec![("Content-Type".to_string(), "text/plain".to_string())];
        sink.write_head(404, &headers).await?;
        sink.write_chunk(Bytes::from_static(NOT_FOUND_BODY.as_bytes()))
            .await?;
        sink.end().await?;

        Ok(())
    }

    fn log_unmatched(&self, req: &IncomingRequest) {
        tracing::warn!("No Match For: {} {}", req.method(), req.url());

        if matches!(req.method(), "PUT" | "PATCH" | "POST") {
            tracing::warn!("{}", req.body_string());
        }

        if tracing::enabled!(tracing::Level::DEBUG) {
            match self.state.closest_match(req) {
                Some(closest) => tracing::debug!("{}", output::render_closest_match(&closest)),
                None => tracing::debug!("The expectation queue is empty."),
            }
        }
    }
}

#[async_trait]
impl<S> Handler for ExpectationHandler<S>
where
    S: StateManager + Send + Sync + 'static,
{
    async fn handle(&self, req: IncomingRequest, sink: &mut dyn ResponseSink) -> Result<(), Error> {
        tracing::trace!("Handling incoming request: {} {}", req.method(), req.url());

        let req = match self.state.path_filter() {
            Some(filter) => {
                let url = filter(req.url());
                req.with_url(url)
            }
            None => req,
        };

        match self.state.serve(&req) {
            Some(delivery) => Ok(delivery.write_to(sink).await?),
            None => self.handle_unmatched(req, sink).await,
        }
    }
}
