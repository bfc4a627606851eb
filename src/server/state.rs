use crate::{
    common::{
        body::ResponseBody,
        data::{
            ExpectationDefinition, ExpectationSnapshot, ExpectationStats, IncomingRequest,
            Repetition, RequestRequirements,
        },
        util::lock,
    },
    server::{
        delivery::{BodyState, Delivery},
        matchers::{self, request_distance, request_matches, request_mismatches, Matcher, Mismatch},
    },
};
use bytes::Bytes;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

/// A rewrite applied to request bodies or request paths.
pub(crate) type Filter = Arc<dyn Fn(&str) -> String + Send + Sync>;

// ************************************************************************************************
// ActiveExpectation
// ************************************************************************************************
pub(crate) struct ActiveExpectation {
    pub id: usize,
    pub request: RequestRequirements,
    pub repetition: Repetition,
    pub count: usize,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub delay: Option<Duration>,
    pub body: BodyState,
}

impl ActiveExpectation {
    fn new(id: usize, definition: ExpectationDefinition, headers: Vec<(String, String)>) -> Self {
        let body = match definition.reply.body {
            ResponseBody::Text(text) => BodyState::Ready(Bytes::from(text)),
            ResponseBody::Bytes(bytes) => BodyState::Ready(bytes),
            ResponseBody::Json(value) => BodyState::Ready(Bytes::from(value.to_string())),
            ResponseBody::Stream(source) => BodyState::Source(source),
        };

        ActiveExpectation {
            id,
            request: definition.request,
            repetition: definition.repetition,
            count: 0,
            status: definition.reply.status,
            headers,
            delay: definition.reply.delay,
            body,
        }
    }

    /// Counts one match and plans the response for it. The returned flag tells whether
    /// the expectation is exhausted and has to leave the queue.
    fn deliver(&mut self) -> (Delivery, bool) {
        self.count += 1;

        let delivery = Delivery {
            status: self.status,
            headers: self.headers.clone(),
            delay: self.delay,
            body: self.body.next_delivery(self.repetition.is_reusable()),
        };

        (delivery, self.repetition.is_exhausted(self.count))
    }

    pub fn snapshot(&self) -> ExpectationSnapshot {
        ExpectationSnapshot {
            id: self.id,
            method: self.request.method,
            url: self.request.url.clone(),
            body: self.request.body.clone(),
            headers: self.request.headers.clone(),
            stats: ExpectationStats {
                count: self.count,
                min: self.repetition.min,
                max: self.repetition.max,
                is_satisfied: self.repetition.is_satisfied(self.count),
                is_exhausted: self.repetition.is_exhausted(self.count),
            },
        }
    }
}

/// The live expectation that came closest to an unmatched request.
#[derive(Debug, Clone)]
pub struct ClosestMatch {
    pub request: IncomingRequest,
    pub expectation: ExpectationSnapshot,
    pub mismatches: Vec<Mismatch>,
}

// ************************************************************************************************
// QueueState
// ************************************************************************************************
pub(crate) struct QueueState {
    next_expectation_id: usize,
    pub expectations: Vec<ActiveExpectation>,
    pub unmatched: Vec<IncomingRequest>,
    pub matchers: Vec<Box<dyn Matcher + Sync + Send>>,
    pub body_filter: Option<Filter>,
    pub path_filter: Option<Filter>,
    pub default_reply_headers: Vec<(String, String)>,
}

impl QueueState {
    pub fn new() -> Self {
        QueueState {
            next_expectation_id: 0,
            expectations: Vec::new(),
            unmatched: Vec::new(),
            matchers: matchers::all(),
            body_filter: None,
            path_filter: None,
            default_reply_headers: Vec::new(),
        }
    }
}

pub(crate) trait StateManager {
    fn reset(&self);
    fn enqueue(&self, definition: ExpectationDefinition) -> usize;
    fn serve(&self, req: &IncomingRequest) -> Option<Delivery>;
    fn has_route(&self, req: &IncomingRequest) -> bool;
    fn closest_match(&self, req: &IncomingRequest) -> Option<ClosestMatch>;

    fn snapshots(&self) -> Vec<ExpectationSnapshot>;
    fn unsatisfied(&self) -> Vec<ExpectationSnapshot>;
    fn retain_unsatisfied(&self) -> Vec<ExpectationSnapshot>;

    fn record_unmatched(&self, req: &IncomingRequest);
    fn unmatched(&self) -> Vec<IncomingRequest>;

    fn set_body_filter(&self, filter: Option<Filter>);
    fn set_path_filter(&self, filter: Option<Filter>);
    fn path_filter(&self) -> Option<Filter>;
    fn set_default_reply_headers(&self, headers: Vec<(String, String)>);
}

pub struct ExpectationStateManager {
    state: Mutex<QueueState>,
}

impl ExpectationStateManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::new()),
        }
    }
}

impl Default for ExpectationStateManager {
    fn default() -> Self {
        ExpectationStateManager::new()
    }
}

impl StateManager for ExpectationStateManager {
    fn reset(&self) {
        let mut state = lock(&self.state);
        state.expectations.clear();
        state.unmatched.clear();
        state.body_filter = None;
        state.path_filter = None;
        state.default_reply_headers.clear();

        tracing::trace!("Reset expectation queue");
    }

    fn enqueue(&self, mut definition: ExpectationDefinition) -> usize {
        let mut state = lock(&self.state);

        if let Some(filter) = state.body_filter.clone() {
            definition.request.body = filter(&definition.request.body);
        }

        let headers = definition
            .reply
            .headers
            .take()
            .unwrap_or_else(|| state.default_reply_headers.clone());

        let id = state.next_expectation_id;
        state.next_expectation_id += 1;

        tracing::debug!(
            "Adding expectation with ID={} for {} {}",
            id,
            definition.request.method,
            definition.request.url
        );

        state
            .expectations
            .push(ActiveExpectation::new(id, definition, headers));

        id
    }

    fn serve(&self, req: &IncomingRequest) -> Option<Delivery> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;

        let idx = state
            .expectations
            .iter()
            .position(|e| request_matches(&state.matchers, req, &e.request));

        let idx = match idx {
            Some(idx) => idx,
            None => {
                tracing::debug!("Could not match any expectation to {} {}", req.method(), req.url());
                return None;
            }
        };

        let expectation = &mut state.expectations[idx];
        let (delivery, exhausted) = expectation.deliver();

        tracing::debug!(
            "Matched expectation with ID={} to {} {} (match {} of min {}, max {:?})",
            expectation.id,
            req.method(),
            req.url(),
            expectation.count,
            expectation.repetition.min,
            expectation.repetition.max
        );

        if exhausted {
            let removed = state.expectations.remove(idx);
            tracing::trace!("Expectation with ID={} is exhausted", removed.id);
        }

        Some(delivery)
    }

    fn has_route(&self, req: &IncomingRequest) -> bool {
        let state = lock(&self.state);
        state
            .expectations
            .iter()
            .any(|e| request_matches(&state.matchers, req, &e.request))
    }

    fn closest_match(&self, req: &IncomingRequest) -> Option<ClosestMatch> {
        let state = lock(&self.state);

        let closest = state
            .expectations
            .iter()
            .map(|e| (request_distance(&state.matchers, req, &e.request), e))
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, e)| e)?;

        Some(ClosestMatch {
            request: req.clone(),
            expectation: closest.snapshot(),
            mismatches: request_mismatches(&state.matchers, req, &closest.request),
        })
    }

    fn snapshots(&self) -> Vec<ExpectationSnapshot> {
        lock(&self.state)
            .expectations
            .iter()
            .map(ActiveExpectation::snapshot)
            .collect()
    }

    fn unsatisfied(&self) -> Vec<ExpectationSnapshot> {
        lock(&self.state)
            .expectations
            .iter()
            .filter(|e| !e.repetition.is_satisfied(e.count))
            .map(ActiveExpectation::snapshot)
            .collect()
    }

    fn retain_unsatisfied(&self) -> Vec<ExpectationSnapshot> {
        let mut state = lock(&self.state);
        state
            .expectations
            .retain(|e| !e.repetition.is_satisfied(e.count));

        state
            .expectations
            .iter()
            .map(ActiveExpectation::snapshot)
            .collect()
    }

    fn record_unmatched(&self, req: &IncomingRequest) {
        lock(&self.state).unmatched.push(req.clone());
    }

    fn unmatched(&self) -> Vec<IncomingRequest> {
        lock(&self.state).unmatched.clone()
    }

    fn set_body_filter(&self, filter: Option<Filter>) {
        lock(&self.state).body_filter = filter;
    }

    fn set_path_filter(&self, filter: Option<Filter>) {
        lock(&self.state).path_filter = filter;
    }

    fn path_filter(&self) -> Option<Filter> {
        lock(&self.state).path_filter.clone()
    }

    fn set_default_reply_headers(&self, headers: Vec<(String, String)>) {
        lock(&self.state).default_reply_headers = headers;
    }
}
