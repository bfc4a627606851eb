use crate::{
    common::data::{IncomingRequest, RequestRequirements},
    server::matchers::{distance_for, Matcher, Mismatch},
};

/// One-directional header check: every expected header with a non-empty value must be
/// present on the request with exactly that value. Extra request headers are ignored.
pub(crate) struct HeaderMatcher {}

impl HeaderMatcher {
    pub fn new() -> Self {
        Self {}
    }

    fn get_unmatched<'a>(
        &self,
        req: &IncomingRequest,
        mock: &'a RequestRequirements,
    ) -> Vec<(&'a String, &'a String, Option<String>)> {
        mock.headers
            .iter()
            .filter(|(_, expected)| !expected.is_empty())
            .map(|(name, expected)| (name, expected, req.header(name)))
            .filter(|(_, expected, actual)| actual.as_deref() != Some(expected.as_str()))
            .collect()
    }
}

impl Matcher for HeaderMatcher {
    fn matches(&self, req: &IncomingRequest, mock: &RequestRequirements) -> bool {
        self.get_unmatched(req, mock).is_empty()
    }

    fn distance(&self, req: &IncomingRequest, mock: &RequestRequirements) -> usize {
        self.get_unmatched(req, mock)
            .into_iter()
            .map(|(name, expected, actual)| match actual {
                Some(actual) => distance_for(expected, &actual),
                None => name.len() + expected.len(),
            })
            .sum()
    }

    fn mismatches(&self, req: &IncomingRequest, mock: &RequestRequirements) -> Vec<Mismatch> {
        self.get_unmatched(req, mock)
            .into_iter()
            .map(|(name, expected, actual)| Mismatch {
                title: format!("Header Mismatch ({})", name),
                expected: format!("{}: {}", name, expected),
                actual: actual.map_or_else(
                    || "<missing>".to_string(),
                    |value| format!("{}: {}", name, value),
                ),
                diff: None,
            })
            .collect()
    }
}
