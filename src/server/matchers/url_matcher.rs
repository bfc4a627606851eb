use crate::{
    common::data::{IncomingRequest, RequestRequirements},
    server::matchers::{distance_for, Matcher, Mismatch},
};

/// Compares the expected url with the (already filtered) path and query of the request.
pub(crate) struct UrlMatcher {}

impl UrlMatcher {
    pub fn new() -> Self {
        Self {}
    }
}

impl Matcher for UrlMatcher {
    fn matches(&self, req: &IncomingRequest, mock: &RequestRequirements) -> bool {
        mock.url == req.url()
    }

    fn distance(&self, req: &IncomingRequest, mock: &RequestRequirements) -> usize {
        distance_for(&mock.url, req.url())
    }

    fn mismatches(&self, req: &IncomingRequest, mock: &RequestRequirements) -> Vec<Mismatch> {
        if self.matches(req, mock) {
            return Vec::new();
        }

        vec![Mismatch {
            title: "URL Mismatch".to_string(),
            expected: mock.url.clone(),
            actual: req.url().to_string(),
            diff: None,
        }]
    }
}
