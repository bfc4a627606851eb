use crate::{
    api::MockServer,
    common::{
        body::{ByteSource, ExpectedBody, ResponseBody},
        data::{ExpectationDefinition, ReplyDefinition, Repetition, RequestRequirements},
    },
};
use std::{path::Path, time::Duration};

/// Builder for one expectation. Created by the method helpers of [`MockServer`] such as
/// [`MockServer::get`]; the expectation joins the queue when a reply is attached.
///
/// Without further configuration an expectation must be matched exactly once.
///
/// **Example**:
/// ```
/// use httpexpect::MockServer;
/// use serde_json::json;
///
/// let server = MockServer::start();
///
/// server
///     .post("/users", json!({ "name": "Fred" }))
///     .header("Content-Type", "application/json")
///     .twice()
///     .reply(201, json!({ "id": 1 }));
///
/// assert_eq!(server.unsatisfied_expectations().len(), 1);
/// ```
#[must_use = "an expectation joins the queue only once a reply is attached"]
pub struct RequestExpectation<'a> {
    server: &'a MockServer,
    request: RequestRequirements,
    repetition: Repetition,
    delay: Option<Duration>,
    reply_headers: Option<Vec<(String, String)>>,
}

impl<'a> RequestExpectation<'a> {
    pub(crate) fn new(server: &'a MockServer, request: RequestRequirements) -> Self {
        RequestExpectation {
            server,
            request,
            repetition: Repetition::default(),
            delay: None,
            reply_headers: None,
        }
    }

    /// Requires a request header. Names are compared case-insensitively and the value must
    /// match exactly. An empty value is not enforced.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        self.request.insert_header(name, value);
        self
    }

    pub fn headers<K, V>(mut self, headers: Vec<(K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.request.insert_header(name, value);
        }
        self
    }

    /// Replaces the expected request body. Ignored for `GET` and `DELETE` expectations.
    pub fn body<B: Into<ExpectedBody>>(mut self, body: B) -> Self {
        self.request.body = body.into().0;
        self
    }

    /// Sets both bounds at once. `None` leaves a bound unchanged; `Some(None)` as `max`
    /// removes the upper bound.
    pub fn times(mut self, min: Option<usize>, max: Option<Option<usize>>) -> Self {
        self.repetition.configure(min, max);
        self
    }

    /// Exactly one match.
    pub fn once(self) -> Self {
        self.times(Some(1), Some(Some(1)))
    }

    /// At least one and at most two matches.
    pub fn twice(self) -> Self {
        self.times(Some(1), Some(Some(2)))
    }

    /// Any number of matches, including none. The expectation never leaves the queue.
    pub fn any(self) -> Self {
        self.times(Some(0), Some(None))
    }

    /// At least one match and no upper bound.
    pub fn many(self) -> Self {
        self.times(Some(1), Some(None))
    }

    /// Sets the minimum. A maximum below it is raised to the same value.
    pub fn min(mut self, min: usize) -> Self {
        self.repetition.set_min(min);
        self
    }

    /// Sets the maximum. A minimum above it is lowered to the same value.
    pub fn max(mut self, max: usize) -> Self {
        self.repetition.set_max(Some(max));
        self
    }

    /// Waits this long before the response head is written.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Reply headers for this expectation. They replace the server's default reply headers.
    pub fn reply_headers<K, V>(mut self, headers: Vec<(K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.reply_headers = Some(
            headers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Attaches the reply and appends the expectation to the queue. Returns the server so
    /// that further expectations can be chained.
    pub fn reply<B: Into<ResponseBody>>(self, status: u16, body: B) -> &'a MockServer {
        let server = self.server;
        let definition = ExpectationDefinition {
            request: self.request,
            repetition: self.repetition,
            reply: ReplyDefinition {
                status,
                body: body.into(),
                headers: self.reply_headers,
                delay: self.delay,
            },
        };

        server.enqueue(definition);
        server
    }

    pub fn reply_with_headers<B, K, V>(self, status: u16, body: B, headers: Vec<(K, V)>) -> &'a MockServer
    where
        B: Into<ResponseBody>,
        K: Into<String>,
        V: Into<String>,
    {
        self.reply_headers(headers).reply(status, body)
    }

    /// Replies with the contents of a file. The file is opened when the first matching
    /// request is answered.
    pub fn reply_with_file<P: AsRef<Path>>(self, status: u16, path: P) -> &'a MockServer {
        self.reply(status, ByteSource::from_file(path))
    }
}
