use crate::common::data::{IncomingRequest, RequestRequirements};
use serde::Serialize;
use similar::{ChangeTag, TextDiff};

mod body_matcher;
mod header_matcher;
mod method_matcher;
mod url_matcher;

pub(crate) use body_matcher::BodyMatcher;
pub(crate) use header_matcher::HeaderMatcher;
pub(crate) use method_matcher::MethodMatcher;
pub(crate) use url_matcher::UrlMatcher;

// *************************************************************************************************
// Diff mirrors similar::ChangeTag so that it can be serialized and rendered later.
// *************************************************************************************************
#[derive(PartialEq, Debug, Serialize, Clone)]
pub enum Diff {
    Same(String),
    Add(String),
    Rem(String),
}

#[derive(Debug, Serialize, Clone)]
pub struct Mismatch {
    pub title: String,
    pub expected: String,
    pub actual: String,
    pub diff: Option<Vec<Diff>>,
}

pub(crate) trait Matcher {
    fn matches(&self, req: &IncomingRequest, mock: &RequestRequirements) -> bool;
    fn distance(&self, req: &IncomingRequest, mock: &RequestRequirements) -> usize;
    fn mismatches(&self, req: &IncomingRequest, mock: &RequestRequirements) -> Vec<Mismatch>;
}

/// The matcher chain in evaluation order: method, url, headers, body.
pub(crate) fn all() -> Vec<Box<dyn Matcher + Sync + Send>> {
    vec![
        Box::new(MethodMatcher::new()),
        Box::new(UrlMatcher::new()),
        Box::new(HeaderMatcher::new()),
        Box::new(BodyMatcher::new()),
    ]
}

pub(crate) fn request_matches(
    matchers: &[Box<dyn Matcher + Sync + Send>],
    req: &IncomingRequest,
    mock: &RequestRequirements,
) -> bool {
    matchers.iter().all(|m| m.matches(req, mock))
}

pub(crate) fn request_distance(
    matchers: &[Box<dyn Matcher + Sync + Send>],
    req: &IncomingRequest,
    mock: &RequestRequirements,
) -> usize {
    matchers.iter().map(|m| m.distance(req, mock)).sum()
}

pub(crate) fn request_mismatches(
    matchers: &[Box<dyn Matcher + Sync + Send>],
    req: &IncomingRequest,
    mock: &RequestRequirements,
) -> Vec<Mismatch> {
    matchers
        .iter()
        .flat_map(|m| m.mismatches(req, mock))
        .collect()
}

pub(crate) fn distance_for(expected: &str, actual: &str) -> usize {
    stringmetrics::levenshtein_limit_iter(expected.bytes(), actual.bytes(), u32::MAX) as usize
}

pub(crate) fn diff_str(base: &str, edit: &str) -> Vec<Diff> {
    TextDiff::from_lines(base, edit)
        .iter_all_changes()
        .map(|change| match change.tag() {
            ChangeTag::Equal => Diff::Same(change.to_string()),
            ChangeTag::Delete => Diff::Rem(change.to_string()),
            ChangeTag::Insert => Diff::Add(change.to_string()),
        })
        .collect()
}
