//! `httpexpect` is an embeddable HTTP test double. Tests register an ordered queue of
//! expectations, each describing a request and the reply to send for it, and point the code
//! under test at the server. When the test is over, [`MockServer::done`] checks that every
//! expectation was used as often as required.
//!
//! # Getting Started
//! ```
//! use httpexpect::MockServer;
//! use serde_json::json;
//!
//! let server = MockServer::start();
//!
//! server
//!     .get("/users/1")
//!     .reply(200, json!({ "id": 1, "name": "Fred" }))
//!     .post("/users", json!({ "name": "Wilma" }))
//!     .reply(201, "");
//!
//! let client = reqwest::blocking::Client::new();
//! let user: serde_json::Value = client.get(server.url("/users/1")).send().unwrap().json().unwrap();
//! assert_eq!(user["name"], "Fred");
//!
//! let status = client
//!     .post(server.url("/users"))
//!     .body(r#"{ "name" : "Wilma" }"#)
//!     .send()
//!     .unwrap()
//!     .status();
//! assert_eq!(status, 201);
//!
//! server.done();
//! ```
//!
//! # Matching
//! A request matches an expectation when the method is equal, the path and query are equal,
//! every expected header is present with the expected value and the body is equal. Bodies
//! that parse as JSON on both sides are compared structurally. Bodies of `GET` and `DELETE`
//! expectations are never compared. The first live expectation in registration order wins.
//!
//! # Repetition
//! Every expectation has a minimum and an optional maximum number of matches (one and one
//! by default, see [`RequestExpectation::once`], [`RequestExpectation::twice`],
//! [`RequestExpectation::any`] and [`RequestExpectation::many`]). It leaves the queue when
//! the maximum is reached.
//!
//! # Streaming
//! A reply body can be a [`ByteSource`], for example a file. For an expectation that is
//! matched at most once the source is piped straight to the client. Otherwise the first
//! response buffers the bytes it streams and later responses replay that buffer.
//!
//! # Unmatched requests
//! By default an unmatched request is answered with status `500`, logged and reported by
//! the next verification. With `throw_on_unmatched_requests` disabled it is answered with
//! `404` and the body `No Matching Response!`.
//!
//! # Logging
//! The crate logs through `tracing` (with its `log` bridge enabled). Unmatched requests
//! are logged as warnings; at debug level the most similar expectation and its differences
//! are logged as well.

pub use api::{Error, MockServer, MockServerBuilder, RequestExpectation, ServerOptions};
pub use common::{
    body::{ByteSource, ExpectedBody, ResponseBody},
    data::{ExpectationSnapshot, ExpectationStats, IncomingRequest, Method, Repetition},
};
pub use server::{
    delivery::{Error as DeliveryError, ResponseSink},
    handler::{Error as DispatchError, NOT_FOUND_BODY},
};

/// Re-exported so that filter regexes can be built without a direct dependency.
pub use regex::Regex;

mod api;
mod common;
mod server;

pub mod prelude {
    #[doc(no_inline)]
    pub use crate::{ByteSource, Method, MockServer, Regex, ResponseBody};
}
