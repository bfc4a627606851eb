use crate::{
    api::{server::Listener, Error, MockServer},
    common::{
        runtime,
        util::{read_env, Join},
    },
    server::server::{HttpServer, HttpServerConfig},
};
use std::{net::SocketAddr, thread};
use tokio::sync::oneshot;

/// Policies of a [`MockServer`](crate::MockServer). All of them are enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    /// Log unmatched requests (and the body of unmatched PUT, PATCH and POST requests).
    pub log_on_unmatched_requests: bool,
    /// Answer unmatched requests with an error and report them on verification instead of
    /// replying `404`.
    pub throw_on_unmatched_requests: bool,
    /// Make verification fail while expectations are not satisfied.
    pub throw_on_unprocessed_requests: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            log_on_unmatched_requests: true,
            throw_on_unmatched_requests: true,
            throw_on_unprocessed_requests: true,
        }
    }
}

/// Configures and starts a [`MockServer`](crate::MockServer).
///
/// The port and the bind address fall back to the environment variables `HTTPEXPECT_PORT`
/// and `HTTPEXPECT_EXPOSE` when they are not set explicitly. Without either, the server
/// binds to a random port on `127.0.0.1`.
///
/// **Example**:
/// ```
/// use httpexpect::MockServer;
///
/// let server = MockServer::builder()
///     .throw_on_unmatched_requests(false)
///     .start();
///
/// server.get("/hello").reply(200, "world");
/// ```
#[derive(Debug, Default)]
pub struct MockServerBuilder {
    port: Option<u16>,
    expose: Option<bool>,
    options: ServerOptions,
    default_reply_headers: Vec<(String, String)>,
}

impl MockServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the port to bind to. Port `0` requests a random free port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn port_option(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    /// Binds to `0.0.0.0` instead of `127.0.0.1` when `true`.
    pub fn expose(mut self, expose: bool) -> Self {
        self.expose = Some(expose);
        self
    }

    pub fn options(mut self, options: ServerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn log_on_unmatched_requests(mut self, enabled: bool) -> Self {
        self.options.log_on_unmatched_requests = enabled;
        self
    }

    pub fn throw_on_unmatched_requests(mut self, enabled: bool) -> Self {
        self.options.throw_on_unmatched_requests = enabled;
        self
    }

    pub fn throw_on_unprocessed_requests(mut self, enabled: bool) -> Self {
        self.options.throw_on_unprocessed_requests = enabled;
        self
    }

    /// Headers used by every reply that does not configure its own.
    pub fn default_reply_headers<K, V>(mut self, headers: Vec<(K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.default_reply_headers = headers
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Builds the expectation queue without starting a listener. Requests can still be
    /// dispatched through [`MockServer::handle`](crate::MockServer::handle).
    pub fn build(self) -> MockServer {
        let server = MockServer::with_options(self.options);
        if !self.default_reply_headers.is_empty() {
            server.default_reply_headers(self.default_reply_headers);
        }
        server
    }

    /// Starts the server on a background thread and waits until it listens.
    ///
    /// # Panics
    /// Panics if the server cannot be started. Use [`try_start`](Self::try_start) to handle
    /// that case.
    pub fn start(self) -> MockServer {
        match self.try_start() {
            Ok(server) => server,
            Err(err) => panic!("{}", err),
        }
    }

    pub fn try_start(self) -> Result<MockServer, Error> {
        let (server, address) = self.spawn()?;
        let address = address.join().map_err(|_| Error::StartupFailed)?;
        Ok(server.listening(address))
    }

    /// Starts the server on a background thread and resolves once it listens.
    pub async fn start_async(self) -> Result<MockServer, Error> {
        let (server, address) = self.spawn()?;
        let address = address.await.map_err(|_| Error::StartupFailed)?;
        Ok(server.listening(address))
    }

    fn spawn(self) -> Result<(PendingServer, oneshot::Receiver<SocketAddr>), Error> {
        let config = HttpServerConfig {
            static_port: self
                .port
                .or_else(|| read_env("HTTPEXPECT_PORT", "").parse::<u16>().ok()),
            expose: self
                .expose
                .unwrap_or_else(|| read_env("HTTPEXPECT_EXPOSE", "false") == "true"),
        };

        let server = self.build();
        let handler = server.handler();
        let (addr_sender, addr_receiver) = oneshot::channel::<SocketAddr>();
        let (shutdown_sender, shutdown_receiver) = oneshot::channel::<()>();

        thread::Builder::new()
            .name("httpexpect-server".to_string())
            .spawn(move || {
                let srv = HttpServer::new(handler, config).start_with_signals(
                    Some(addr_sender),
                    async move {
                        let _ = shutdown_receiver.await;
                    },
                );

                match runtime::block_on_current_thread(srv) {
                    Ok(Ok(())) => tracing::debug!("Mock server stopped"),
                    Ok(Err(err)) => tracing::error!("Mock server failed: {}", err),
                    Err(err) => tracing::error!("Cannot build local tokio runtime: {}", err),
                }
            })?;

        Ok((
            PendingServer {
                server,
                shutdown: shutdown_sender,
            },
            addr_receiver,
        ))
    }
}

/// A server whose listener thread has been spawned but has not reported its address yet.
struct PendingServer {
    server: MockServer,
    shutdown: oneshot::Sender<()>,
}

impl PendingServer {
    fn listening(self, address: SocketAddr) -> MockServer {
        self.server.with_listener(Listener::new(address, self.shutdown))
    }
}
