use crate::{
    common::data::{IncomingRequest, RequestRequirements},
    server::matchers::{distance_for, Matcher, Mismatch},
};

pub(crate) struct MethodMatcher {}

impl MethodMatcher {
    pub fn new() -> Self {
        Self {}
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &IncomingRequest, mock: &RequestRequirements) -> bool {
        mock.method.as_str() == req.method()
    }

    fn distance(&self, req: &IncomingRequest, mock: &RequestRequirements) -> usize {
        distance_for(mock.method.as_str(), req.method())
    }

    fn mismatches(&self, req: &IncomingRequest, mock: &RequestRequirements) -> Vec<Mismatch> {
        if self.matches(req, mock) {
            return Vec::new();
        }

        vec![Mismatch {
            title: "Method Mismatch".to_string(),
            expected: mock.method.to_string(),
            actual: req.method().to_string(),
            diff: None,
        }]
    }
}
