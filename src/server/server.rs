use crate::{
    common::data::IncomingRequest,
    server::{
        self,
        delivery::{self, ResponseSink},
        handler::Handler,
        server::Error::{
            BufferError, LocalSocketAddrError, PublishSocketAddrError, SocketBindError,
        },
    },
};
use async_trait::async_trait;
use futures_util::FutureExt;
use http::{HeaderName, HeaderValue, Request, Response, StatusCode};
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::{
    body::{Body, Frame, Incoming},
    service::service_fn,
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder as ServerBuilder,
};
use bytes::Bytes;
use std::{
    convert::TryFrom,
    future::Future,
    io,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use thiserror::Error;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{mpsc, oneshot},
    task::spawn,
};

/// Number of body chunks buffered between the handler task and the connection.
const CHUNK_CHANNEL_CAPACITY: usize = 16;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot bind to socket addr {0}: {1}")]
    SocketBindError(SocketAddr, std::io::Error),
    #[error("cannot parse socket address: {0}")]
    SocketAddrParseError(#[from] std::net::AddrParseError),
    #[error("cannot obtain local address: {0}")]
    LocalSocketAddrError(std::io::Error),
    #[error("cannot send reserved TCP address to test thread {0}")]
    PublishSocketAddrError(SocketAddr),
    #[error("buffering error: {0}")]
    BufferError(hyper::Error),
    #[error("HTTP error: {0}")]
    HTTPError(#[from] http::Error),
    #[error("{0}")]
    HandlerError(#[from] server::handler::Error),
    #[error("the request handler finished without producing a response")]
    NoResponse,
    #[error("Server error: {0}")]
    ServerConnectionError(Box<dyn std::error::Error + Send + Sync>),
}

pub struct HttpServerConfig {
    pub static_port: Option<u16>,
    pub expose: bool,
}

/// Serves the expectation queue over HTTP/1.1.
pub(crate) struct HttpServer<H>
where
    H: Handler + Send + Sync + 'static,
{
    handler: Arc<H>,
    config: HttpServerConfig,
}

impl<H> HttpServer<H>
where
    H: Handler + Send + Sync + 'static,
{
    pub fn new(handler: Arc<H>, config: HttpServerConfig) -> Self {
        HttpServer { handler, config }
    }

    /// Binds the listener, publishes its address through `socket_addr_sender` and serves
    /// connections until `shutdown` resolves.
    pub async fn start_with_signals<F>(
        self,
        socket_addr_sender: Option<oneshot::Sender<SocketAddr>>,
        shutdown: F,
    ) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let host = if self.config.expose {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        };
        let addr: SocketAddr =
            format!("{}:{}", host, self.config.static_port.unwrap_or(0)).parse()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| SocketBindError(addr, e))?;

        let local_addr = listener.local_addr().map_err(LocalSocketAddrError)?;
        if let Some(sender) = socket_addr_sender {
            sender.send(local_addr).map_err(PublishSocketAddrError)?;
        }

        tracing::info!("Listening on {}", local_addr);
        self.run_accept_loop(listener, shutdown).await
    }

    async fn run_accept_loop<F>(self, listener: TcpListener, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let shutdown = shutdown.shared();
        let server = Arc::new(self);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((tcp_stream, remote_address)) => {
                            let server = server.clone();
                            spawn(async move {
                                if let Err(err) = server.handle_tcp_stream(tcp_stream, remote_address).await {
                                    tracing::error!("{:?}", err);
                                }
                            });
                        },
                        Err(err) => {
                            tracing::error!("TCP error: {:?}", err);
                        },
                    };
                }
                _ = shutdown.clone() => {
                    tracing::debug!("Shutting down listener");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_tcp_stream(
        self: Arc<Self>,
        tcp_stream: TcpStream,
        remote_address: SocketAddr,
    ) -> Result<(), Error> {
        tracing::trace!("new TCP connection from {}", remote_address);

        let server = self.clone();
        let server_builder = ServerBuilder::new(TokioExecutor::new());
        server_builder
            .serve_connection(
                TokioIo::new(tcp_stream),
                service_fn(move |req| server.clone().service(req)),
            )
            .await
            .map_err(Error::ServerConnectionError)
    }

    async fn service(
        self: Arc<Self>,
        req: Request<Incoming>,
    ) -> Result<Response<BoxBody<Bytes, io::Error>>, Error> {
        tracing::trace!("New HTTP request received: {} {}", req.method(), req.uri());

        let req = match buffer_request(req).await {
            Ok(req) => req,
            Err(err) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, BufferError(err)),
        };

        let incoming = IncomingRequest::from(&req);

        let (head_sender, head_receiver) = oneshot::channel();
        let (chunk_sender, chunk_receiver) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let mut sink = ChannelSink {
            head: Some(head_sender),
            chunks: Some(chunk_sender),
        };

        let handler = self.handler.clone();
        spawn(async move {
            if let Err(err) = handler.handle(incoming, &mut sink).await {
                sink.abort(err);
            }
        });

        match head_receiver.await {
            Ok(Ok(head)) => {
                let (parts, _) = head.into_parts();
                let body = ChannelBody {
                    chunks: chunk_receiver,
                };
                Ok(Response::from_parts(parts, body.boxed()))
            }
            Ok(Err(err)) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.into()),
            Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, Error::NoResponse),
        }
    }
}

// ************************************************************************************************
// ChannelSink / ChannelBody
// ************************************************************************************************
/// Hands the response produced by the handler task over to the connection: the head through
/// a oneshot channel, the body chunks through a bounded channel.
struct ChannelSink {
    head: Option<oneshot::Sender<Result<Response<()>, server::handler::Error>>>,
    chunks: Option<mpsc::Sender<io::Result<Bytes>>>,
}

impl ChannelSink {
    /// Reports a handler failure. Before the head is sent the client gets a 500 response,
    /// afterwards the body is terminated with an error so the connection is aborted.
    fn abort(&mut self, err: server::handler::Error) {
        if let Some(head) = self.head.take() {
            let _ = head.send(Err(err));
            return;
        }

        tracing::error!("failed to stream response: {}", err);
        if let Some(chunks) = self.chunks.take() {
            let _ = chunks.try_send(Err(io::Error::new(io::ErrorKind::Other, err.to_string())));
        }
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    async fn write_head(
        &mut self,
        status: u16,
        headers: &[(String, String)],
    ) -> Result<(), delivery::Error> {
        let status =
            StatusCode::from_u16(status).map_err(|_| delivery::Error::InvalidStatusCode(status))?;

        let mut response = Response::new(());
        *response.status_mut() = status;
        for (name, value) in headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|err| delivery::Error::InvalidHeader(format!("{}: {}", name, err)))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|err| delivery::Error::InvalidHeader(format!("{}: {}", name, err)))?;
            response.headers_mut().append(name, value);
        }

        let head = self.head.take().ok_or(delivery::Error::SinkClosed)?;
        head.send(Ok(response)).map_err(|_| delivery::Error::SinkClosed)
    }

    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), delivery::Error> {
        let chunks = self.chunks.as_ref().ok_or(delivery::Error::SinkClosed)?;
        chunks
            .send(Ok(chunk))
            .await
            .map_err(|_| delivery::Error::SinkClosed)
    }

    async fn end(&mut self) -> Result<(), delivery::Error> {
        self.chunks = None;
        Ok(())
    }
}

/// Response body fed by a [`ChannelSink`]. It ends when the sink is ended or dropped.
struct ChannelBody {
    chunks: mpsc::Receiver<io::Result<Bytes>>,
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.chunks
            .poll_recv(cx)
            .map(|chunk| chunk.map(|result| result.map(Frame::data)))
    }
}

async fn buffer_request(req: Request<Incoming>) -> Result<Request<Bytes>, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();
    Ok(Request::from_parts(parts, body))
}

fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, io::Error> {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

fn error_response(
    code: StatusCode,
    err: Error,
) -> Result<Response<BoxBody<Bytes, io::Error>>, Error> {
    tracing::error!("failed to process request: {}", err);
    Ok(Response::builder()
        .status(code)
        .body(full(err.to_string()))?)
}
