use crate::{
    common::data::{IncomingRequest, RequestRequirements},
    server::matchers::{diff_str, distance_for, Matcher, Mismatch},
};
use assert_json_diff::{assert_json_matches_no_panic, CompareMode, Config, NumericMode};
use serde_json::Value;

/// Compares two bodies. When both parse as JSON they are compared structurally, so key
/// order does not matter. Otherwise the raw strings must be equal.
pub(crate) fn bodies_match(expected: &str, actual: &str) -> bool {
    match (
        serde_json::from_str::<Value>(expected),
        serde_json::from_str::<Value>(actual),
    ) {
        (Ok(expected), Ok(actual)) => {
            let config = Config::new(CompareMode::Strict).numeric_mode(NumericMode::AssumeFloat);
            assert_json_matches_no_panic(&actual, &expected, config).is_ok()
        }
        _ => expected == actual,
    }
}

pub(crate) struct BodyMatcher {}

impl BodyMatcher {
    pub fn new() -> Self {
        Self {}
    }
}

impl Matcher for BodyMatcher {
    fn matches(&self, req: &IncomingRequest, mock: &RequestRequirements) -> bool {
        if mock.method.ignores_body() {
            return true;
        }

        bodies_match(&mock.body, &req.body_string())
    }

    fn distance(&self, req: &IncomingRequest, mock: &RequestRequirements) -> usize {
        if self.matches(req, mock) {
            return 0;
        }

        distance_for(&mock.body, &req.body_string())
    }

    fn mismatches(&self, req: &IncomingRequest, mock: &RequestRequirements) -> Vec<Mismatch> {
        if self.matches(req, mock) {
            return Vec::new();
        }

        let actual = req.body_string();
        vec![Mismatch {
            title: "Body Mismatch".to_string(),
            diff: Some(diff_str(&mock.body, &actual)),
            expected: mock.body.clone(),
            actual,
        }]
    }
}
