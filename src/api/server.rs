use crate::{
    api::{
        builder::{MockServerBuilder, ServerOptions},
        expectation::RequestExpectation,
        output, Error,
    },
    common::{
        body::ExpectedBody,
        data::{ExpectationDefinition, ExpectationSnapshot, IncomingRequest, Method, RequestRequirements},
    },
    server::{
        delivery::ResponseSink,
        handler::{self, ExpectationHandler, Handler},
        state::{ExpectationStateManager, StateManager},
    },
};
use bytes::Bytes;
use regex::Regex;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::oneshot;

/// The background listener of a started server. Dropping it stops the listener.
pub(crate) struct Listener {
    address: SocketAddr,
    _shutdown: oneshot::Sender<()>,
}

impl Listener {
    pub(crate) fn new(address: SocketAddr, shutdown: oneshot::Sender<()>) -> Self {
        Listener {
            address,
            _shutdown: shutdown,
        }
    }
}

/// An HTTP test double that answers requests from an ordered queue of expectations.
///
/// Every expectation describes a request (method, url, optionally headers and body) and the
/// reply to send when such a request arrives. Incoming requests are matched against the
/// queue in registration order and the first live match answers. An expectation leaves the
/// queue once it has been matched as often as its maximum allows.
///
/// **Example**:
/// ```
/// use httpexpect::MockServer;
///
/// let server = MockServer::start();
///
/// server.get("/hello").reply(200, "world");
///
/// let body = reqwest::blocking::get(server.url("/hello")).unwrap().text().unwrap();
/// assert_eq!(body, "world");
///
/// server.done();
/// ```
pub struct MockServer {
    state: Arc<ExpectationStateManager>,
    handler: Arc<ExpectationHandler<ExpectationStateManager>>,
    options: ServerOptions,
    listener: Option<Listener>,
}

impl MockServer {
    /// Creates a server with default options that is not listening on any port. Requests
    /// are dispatched through [`handle`](Self::handle).
    pub fn new() -> Self {
        Self::with_options(ServerOptions::default())
    }

    pub fn with_options(options: ServerOptions) -> Self {
        let state = Arc::new(ExpectationStateManager::new());
        let handler = Arc::new(ExpectationHandler::new(
            state.clone(),
            options.log_on_unmatched_requests,
            options.throw_on_unmatched_requests,
        ));

        MockServer {
            state,
            handler,
            options,
            listener: None,
        }
    }

    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::new()
    }

    /// Starts a server with default options on a random local port.
    ///
    /// # Panics
    /// Panics if the server cannot be started.
    pub fn start() -> Self {
        MockServerBuilder::new().start()
    }

    pub async fn start_async() -> Result<Self, Error> {
        MockServerBuilder::new().start_async().await
    }

    pub(crate) fn with_listener(mut self, listener: Listener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub(crate) fn handler(&self) -> Arc<ExpectationHandler<ExpectationStateManager>> {
        self.handler.clone()
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// The address the server listens on, or `None` if it was built without a listener.
    pub fn address(&self) -> Option<&SocketAddr> {
        self.listener.as_ref().map(|l| &l.address)
    }

    /// The TCP port the server listens on.
    ///
    /// # Panics
    /// Panics if the server was built without a listener.
    pub fn port(&self) -> u16 {
        self.listening_address().port()
    }

    /// Builds the URL for a path on this server.
    ///
    /// # Panics
    /// Panics if the server was built without a listener.
    pub fn url<S: Into<String>>(&self, path: S) -> String {
        format!("http://{}{}", self.listening_address(), path.into())
    }

    pub fn base_url(&self) -> String {
        self.url("")
    }

    fn listening_address(&self) -> &SocketAddr {
        match self.address() {
            Some(address) => address,
            None => panic!("The mock server was built without a listener"),
        }
    }

    // ********************************************************************************************
    // Registration
    // ********************************************************************************************
    fn expectation(&self, method: Method, url: String, body: Option<ExpectedBody>) -> RequestExpectation<'_> {
        let mut request = RequestRequirements::new(method, url);
        if let Some(body) = body {
            request.body = body.0;
        }
        RequestExpectation::new(self, request)
    }

    pub fn get<U: Into<String>>(&self, url: U) -> RequestExpectation<'_> {
        self.expectation(Method::GET, url.into(), None)
    }

    pub fn head<U: Into<String>>(&self, url: U) -> RequestExpectation<'_> {
        self.expectation(Method::HEAD, url.into(), None)
    }

    pub fn copy<U: Into<String>>(&self, url: U) -> RequestExpectation<'_> {
        self.expectation(Method::COPY, url.into(), None)
    }

    /// Body comparison is skipped for `DELETE`, so no body is taken.
    pub fn delete<U: Into<String>>(&self, url: U) -> RequestExpectation<'_> {
        self.expectation(Method::DELETE, url.into(), None)
    }

    pub fn put<U, B>(&self, url: U, body: B) -> RequestExpectation<'_>
    where
        U: Into<String>,
        B: Into<ExpectedBody>,
    {
        self.expectation(Method::PUT, url.into(), Some(body.into()))
    }

    pub fn patch<U, B>(&self, url: U, body: B) -> RequestExpectation<'_>
    where
        U: Into<String>,
        B: Into<ExpectedBody>,
    {
        self.expectation(Method::PATCH, url.into(), Some(body.into()))
    }

    pub fn post<U, B>(&self, url: U, body: B) -> RequestExpectation<'_>
    where
        U: Into<String>,
        B: Into<ExpectedBody>,
    {
        self.expectation(Method::POST, url.into(), Some(body.into()))
    }

    pub(crate) fn enqueue(&self, definition: ExpectationDefinition) -> usize {
        self.state.enqueue(definition)
    }

    // ********************************************************************************************
    // Filters
    // ********************************************************************************************
    /// Rewrites the expected body of every expectation registered from now on. Expectations
    /// that are already queued keep their body.
    pub fn filtering_request_body<F>(&self, filter: F) -> &Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.state.set_body_filter(Some(Arc::new(filter)));
        self
    }

    /// Replaces every match of `regex` in expected bodies registered from now on.
    pub fn filtering_request_body_regex<R: Into<String>>(&self, regex: Regex, replacement: R) -> &Self {
        let replacement = replacement.into();
        self.filtering_request_body(move |body| {
            regex.replace_all(body, replacement.as_str()).to_string()
        })
    }

    pub fn clear_body_filter(&self) -> &Self {
        self.state.set_body_filter(None);
        self
    }

    /// Rewrites the path and query of every incoming request before it is matched.
    pub fn filtering_path<F>(&self, filter: F) -> &Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.state.set_path_filter(Some(Arc::new(filter)));
        self
    }

    /// Replaces every match of `regex` in the path and query of incoming requests.
    ///
    /// **Example**:
    /// ```
    /// use httpexpect::MockServer;
    /// use regex::Regex;
    ///
    /// let server = MockServer::start();
    /// server
    ///     .filtering_path_regex(Regex::new("password=[^&]*").unwrap(), "password=XXX")
    ///     .get("/login?user=a&password=XXX")
    ///     .reply(204, "");
    ///
    /// let status = reqwest::blocking::get(server.url("/login?user=a&password=hunter2"))
    ///     .unwrap()
    ///     .status();
    /// assert_eq!(status, 204);
    /// ```
    pub fn filtering_path_regex<R: Into<String>>(&self, regex: Regex, replacement: R) -> &Self {
        let replacement = replacement.into();
        self.filtering_path(move |path| regex.replace_all(path, replacement.as_str()).to_string())
    }

    pub fn clear_path_filter(&self) -> &Self {
        self.state.set_path_filter(None);
        self
    }

    /// Headers used by replies registered from now on that do not configure their own.
    pub fn default_reply_headers<K, V>(&self, headers: Vec<(K, V)>) -> &Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.state.set_default_reply_headers(headers);
        self
    }

    // ********************************************************************************************
    // Verification
    // ********************************************************************************************
    /// Checks that no unmatched request was recorded and every queued expectation is
    /// satisfied. Expectations that are already satisfied are removed from the queue.
    ///
    /// Unmatched requests are only recorded when `throw_on_unmatched_requests` is enabled.
    /// When `throw_on_unprocessed_requests` is disabled unsatisfied expectations are not
    /// reported.
    pub fn verify(&self) -> Result<(), Error> {
        if let Some(req) = self.state.unmatched().into_iter().next() {
            return Err(Error::UnmatchedRequest {
                method: req.method().to_string(),
                url: req.url().to_string(),
            });
        }

        if !self.options.throw_on_unprocessed_requests {
            return Ok(());
        }

        let pending = self.state.retain_unsatisfied();
        if pending.is_empty() {
            return Ok(());
        }

        Err(Error::UnprocessedExpectations(
            pending.iter().map(ExpectationSnapshot::route).collect(),
        ))
    }

    /// Asserts that all expectations are satisfied.
    ///
    /// # Panics
    /// Panics with the verification error and a table of the pending expectations.
    pub fn done(&self) {
        if let Err(err) = self.verify() {
            let pending = self.state.snapshots();
            if pending.is_empty() {
                panic!("{}", err);
            }
            panic!("{}\n\n{}", err, output::render_expectations(&pending));
        }
    }

    /// Passes the verification result to `callback` instead of panicking.
    pub fn done_with<F, T>(&self, callback: F) -> T
    where
        F: FnOnce(Result<(), Error>) -> T,
    {
        callback(self.verify())
    }

    // ********************************************************************************************
    // Queries
    // ********************************************************************************************
    /// Tells whether a request with this method and url would currently be answered. The
    /// queue is not changed and the path filter is not applied.
    pub fn has_route<U: Into<String>>(&self, method: Method, url: U) -> bool {
        self.has_route_with(method, url, "", &[])
    }

    pub fn has_route_with<U, B>(&self, method: Method, url: U, body: B, headers: &[(&str, &str)]) -> bool
    where
        U: Into<String>,
        B: Into<Bytes>,
    {
        let headers = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let req = IncomingRequest::new(method.as_str(), url, headers, body.into());
        self.state.has_route(&req)
    }

    /// Snapshots of all queued expectations in registration order.
    pub fn expectations(&self) -> Vec<ExpectationSnapshot> {
        self.state.snapshots()
    }

    /// Snapshots of the queued expectations that are not satisfied yet.
    pub fn unsatisfied_expectations(&self) -> Vec<ExpectationSnapshot> {
        self.state.unsatisfied()
    }

    /// Removes all expectations, filters, default reply headers and recorded unmatched
    /// requests. The listener keeps running.
    pub fn reset(&self) {
        self.state.reset();
    }

    /// Answers a request without going through the network listener.
    pub async fn handle(
        &self,
        req: IncomingRequest,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), handler::Error> {
        self.handler.handle(req, sink).await
    }
}

impl Default for MockServer {
    fn default() -> Self {
        MockServer::new()
    }
}
