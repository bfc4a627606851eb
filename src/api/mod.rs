use thiserror::Error;

pub use builder::{MockServerBuilder, ServerOptions};
pub use expectation::RequestExpectation;
pub use server::MockServer;

mod builder;
mod expectation;
pub(crate) mod output;
mod server;

/// Errors reported by verification and by starting a server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Expectations that were not matched as often as required, as `METHOD url`.
    #[error("Unprocessed Requests in Assertions Queue: \n{}", routes_json(.0))]
    UnprocessedExpectations(Vec<String>),
    /// A request that matched no expectation.
    #[error("No Match For: {method} {url}")]
    UnmatchedRequest { method: String, url: String },
    #[error("cannot spawn mock server thread: {0}")]
    ThreadSpawnError(String),
    #[error("the mock server stopped before it started listening, see the log for details")]
    StartupFailed,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::ThreadSpawnError(err.to_string())
    }
}

fn routes_json(routes: &[String]) -> String {
    serde_json::to_string(routes).unwrap_or_else(|_| format!("{:?}", routes))
}
