use crate::common::{
    body::{ByteSource, ResponseBody},
    data::Error::InvalidMethod,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, io, str::FromStr, time::Duration};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid HTTP method {0}")]
    InvalidMethod(String),
}

// ************************************************************************************************
// Method
// ************************************************************************************************
/// The HTTP methods an expectation can be registered for.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GET,
    HEAD,
    PUT,
    PATCH,
    POST,
    DELETE,
    COPY,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::POST => "POST",
            Method::DELETE => "DELETE",
            Method::COPY => "COPY",
        }
    }

    /// Methods whose request body is never compared.
    pub(crate) fn ignores_body(&self) -> bool {
        matches!(self, Method::GET | Method::DELETE)
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "GET" => Ok(Method::GET),
            "HEAD" => Ok(Method::HEAD),
            "PUT" => Ok(Method::PUT),
            "PATCH" => Ok(Method::PATCH),
            "POST" => Ok(Method::POST),
            "DELETE" => Ok(Method::DELETE),
            "COPY" => Ok(Method::COPY),
            _ => Err(InvalidMethod(input.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ************************************************************************************************
// IncomingRequest
// ************************************************************************************************
/// A fully received HTTP request as seen by the expectation queue.
#[derive(Serialize, Debug, Clone)]
pub struct IncomingRequest {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl IncomingRequest {
    pub fn new<M, U>(method: M, url: U, headers: Vec<(String, String)>, body: Bytes) -> Self
    where
        M: Into<String>,
        U: Into<String>,
    {
        Self {
            method: method.into(),
            url: url.into(),
            headers,
            body,
        }
    }

    /// Drains `body` completely and builds the request from it.
    pub async fn receive<M, U>(
        method: M,
        url: U,
        headers: Vec<(String, String)>,
        body: ByteSource,
    ) -> io::Result<Self>
    where
        M: Into<String>,
        U: Into<String>,
    {
        let body = body.collect().await?;
        Ok(Self::new(method, url, headers, body))
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Path and query of the request, after the path filter has been applied.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &Vec<(String, String)> {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The body decoded as (lossy) UTF-8, which is what body matching compares.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Returns all values of a header joined by `", "`. Header names are compared
    /// case-insensitively.
    pub fn header(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect();

        if values.is_empty() {
            return None;
        }

        Some(values.join(", "))
    }

    pub(crate) fn with_url(mut self, url: String) -> Self {
        self.url = url;
        self
    }
}

/// Header values that are not valid UTF-8 are decoded lossily.
impl From<&http::Request<Bytes>> for IncomingRequest {
    fn from(req: &http::Request<Bytes>) -> Self {
        let url = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());

        let headers = req
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect();

        IncomingRequest::new(req.method().as_str(), url, headers, req.body().clone())
    }
}

// ************************************************************************************************
// RequestRequirements
// ************************************************************************************************
/// The request side of an expectation: what an incoming request must look like.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RequestRequirements {
    pub method: Method,
    pub url: String,
    pub body: String,
    /// Lowercased header names mapped to their expected values. Empty values
    /// are not enforced.
    pub headers: BTreeMap<String, String>,
}

impl RequestRequirements {
    pub fn new<U: Into<String>>(method: Method, url: U) -> Self {
        Self {
            method,
            url: url.into(),
            body: String::new(),
            headers: BTreeMap::new(),
        }
    }

    pub(crate) fn insert_header<K: AsRef<str>, V: Into<String>>(&mut self, name: K, value: V) {
        self.headers.insert(name.as_ref().to_lowercase(), value.into());
    }
}

// ************************************************************************************************
// ExpectationDefinition
// ************************************************************************************************
/// The response side of an expectation as configured by the user.
#[derive(Debug, Default)]
pub struct ReplyDefinition {
    pub status: u16,
    pub body: ResponseBody,
    /// `None` falls back to the server's default reply headers.
    pub headers: Option<Vec<(String, String)>>,
    pub delay: Option<Duration>,
}

/// A complete expectation, ready to be appended to the queue.
#[derive(Debug)]
pub struct ExpectationDefinition {
    pub request: RequestRequirements,
    pub repetition: Repetition,
    pub reply: ReplyDefinition,
}

// ************************************************************************************************
// Repetition
// ************************************************************************************************
/// Bounds on how often an expectation may and must be matched.
///
/// `max == None` means the expectation never becomes exhausted. The invariant
/// `min <= max` is kept by every setter.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repetition {
    pub min: usize,
    pub max: Option<usize>,
}

impl Default for Repetition {
    fn default() -> Self {
        Repetition {
            min: 1,
            max: Some(1),
        }
    }
}

impl Repetition {
    /// Applies optional bounds. `min` is applied first and raises `max` when needed,
    /// then `max` is applied and lowers `min` when needed.
    pub fn configure(&mut self, min: Option<usize>, max: Option<Option<usize>>) {
        if let Some(min) = min {
            self.set_min(min);
        }

        if let Some(max) = max {
            self.set_max(max);
        }
    }

    pub fn set_min(&mut self, min: usize) {
        self.min = min;
        if let Some(max) = self.max {
            if min > max {
                self.max = Some(min);
            }
        }
    }

    pub fn set_max(&mut self, max: Option<usize>) {
        self.max = max;
        if let Some(max) = max {
            if self.min > max {
                self.min = max;
            }
        }
    }

    pub fn is_satisfied(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    pub fn is_exhausted(&self, count: usize) -> bool {
        self.max.map_or(false, |max| count >= max)
    }

    /// True when a matched expectation may be served again afterwards.
    pub fn is_reusable(&self) -> bool {
        self.max.map_or(true, |max| max > 1)
    }
}

// ************************************************************************************************
// ExpectationSnapshot
// ************************************************************************************************
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ExpectationStats {
    pub count: usize,
    pub min: usize,
    /// `None` when unbounded.
    pub max: Option<usize>,
    pub is_satisfied: bool,
    pub is_exhausted: bool,
}

/// A read-only view of a live expectation, used for diagnostics.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ExpectationSnapshot {
    pub id: usize,
    pub method: Method,
    pub url: String,
    pub body: String,
    pub headers: BTreeMap<String, String>,
    pub stats: ExpectationStats,
}

impl ExpectationSnapshot {
    /// `METHOD url`, the form used in verification errors.
    pub fn route(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}
