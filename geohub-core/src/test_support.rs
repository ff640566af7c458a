//! In-memory fakes used by unit, behaviour and doc tests.
//!
//! None of these types touch the network or the clock.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;

use crate::{Feature, HubError, HubRequest, HubResponse, Interrupted, Sleeper, Transport};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl HubResponse {
    /// `200 OK` with a JSON body.
    #[must_use]
    pub fn ok_json(body: &Value) -> Self {
        Self::new(200, body.to_string()).with_header("Content-Type", "application/json")
    }

    /// `429 Too Many Requests`, optionally with a `Retry-After` header.
    #[must_use]
    pub fn rate_limited(retry_after: Option<&str>) -> Self {
        retry_after
            .into_iter()
            .fold(Self::new(429, "Too Many Requests"), |response, value| {
                response.with_header("Retry-After", value)
            })
    }
}

/// A page body as the Hub would send it.
#[must_use]
pub fn page_response(features: &[Feature], handle: Option<Value>) -> HubResponse {
    let mut body = json!({ "type": "FeatureCollection", "features": features });
    if let Some(handle) = handle {
        body["handle"] = handle;
    }
    HubResponse::ok_json(&body)
}

/// `count` point features with ids `f0`, `f1`, ... and an `index` property.
#[must_use]
pub fn sample_features(count: usize) -> Vec<Feature> {
    (0..count)
        .map(|index| {
            let mut properties = Map::new();
            properties.insert("index".to_owned(), Value::from(index));
            let x = f64::from(u32::try_from(index.checked_rem(180).unwrap_or_default()).unwrap_or(0));
            Feature::from_parts(
                Some(format!("f{index}")),
                Some(geojson::Geometry::new(geojson::Value::Point(vec![x, 0.0]))),
                properties,
            )
        })
        .collect()
}

/// Transport replaying a fixed script of outcomes.
///
/// Once the script runs out it repeats the fallback response, or fails with
/// [`HubError::Network`] when none was configured.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HubResponse, HubError>>>,
    fallback: Option<HubResponse>,
    requests: Mutex<Vec<HubRequest>>,
}

impl ScriptedTransport {
    /// Replay `script` in order.
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Result<HubResponse, HubError>>,
    {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Answer every request with `response`.
    #[must_use]
    pub fn repeating(response: HubResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::default()
        }
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<HubRequest> {
        lock(&self.requests).clone()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &HubRequest) -> Result<HubResponse, HubError> {
        lock(&self.requests).push(request.clone());
        if let Some(outcome) = lock(&self.script).pop_front() {
            return outcome;
        }
        self.fallback.clone().ok_or_else(|| HubError::Network {
            url: request.path(),
            message: "script exhausted".to_owned(),
        })
    }
}

/// How a [`PagedHub`] renders the handles it issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandleStyle {
    /// Opaque strings with characters that need URL encoding.
    #[default]
    Text,
    /// Integers, as some Hub deployments send.
    Numeric,
}

#[derive(Debug, Default)]
struct HubState {
    issued: HashMap<String, usize>,
    used: HashSet<String>,
    next_token: u64,
    requests: Vec<HubRequest>,
}

/// Dataset-backed fake Hub that pages with continuation handles.
///
/// Pages are sized by the request's `limit`, or by fixed page sizes when built
/// with [`PagedHub::with_page_sizes`]. A handle the hub never issued, or one
/// presented twice, is answered with `400 Bad Request`. A fault can replace the
/// answer to the n-th request.
#[derive(Debug)]
pub struct PagedHub {
    features: Vec<Feature>,
    boundaries: Option<Vec<usize>>,
    style: HandleStyle,
    faults: HashMap<usize, Result<HubResponse, HubError>>,
    state: Mutex<HubState>,
}

impl PagedHub {
    /// Serve `features`, paging by the requested `limit`.
    #[must_use]
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            features,
            boundaries: None,
            style: HandleStyle::default(),
            faults: HashMap::new(),
            state: Mutex::new(HubState::default()),
        }
    }

    /// Serve pages of exactly `sizes` features, ignoring `limit`.
    #[must_use]
    pub fn with_page_sizes(sizes: &[usize]) -> Self {
        let total = sizes.iter().sum();
        let mut boundaries = Vec::with_capacity(sizes.len());
        let mut offset = 0;
        for size in sizes {
            offset += size;
            boundaries.push(offset);
        }
        Self {
            boundaries: Some(boundaries),
            ..Self::new(sample_features(total))
        }
    }

    /// Issue handles in `style`.
    #[must_use]
    pub fn with_handle_style(mut self, style: HandleStyle) -> Self {
        self.style = style;
        self
    }

    /// Answer the `request_number`-th request (1-based) with `outcome`.
    #[must_use]
    pub fn with_fault(mut self, request_number: usize, outcome: Result<HubResponse, HubError>) -> Self {
        self.faults.insert(request_number, outcome);
        self
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<HubRequest> {
        lock(&self.state).requests.clone()
    }

    /// Handles issued so far, in no particular order.
    #[must_use]
    pub fn issued_handles(&self) -> Vec<String> {
        lock(&self.state).issued.keys().cloned().collect()
    }

    fn page_end(&self, offset: usize, limit: usize) -> usize {
        let end = match &self.boundaries {
            Some(boundaries) => boundaries
                .iter()
                .copied()
                .find(|&boundary| boundary > offset)
                .unwrap_or(self.features.len()),
            None => offset.saturating_add(limit),
        };
        end.min(self.features.len())
    }

    fn issue(&self, state: &mut HubState, offset: usize) -> Value {
        state.next_token += 1;
        let (raw, value) = match self.style {
            HandleStyle::Text => {
                let raw = format!("tok/{}+{}==", state.next_token, offset);
                (raw.clone(), Value::from(raw))
            }
            HandleStyle::Numeric => {
                let number = state.next_token * 1000 + u64::try_from(offset).unwrap_or(u64::MAX);
                (number.to_string(), Value::from(number))
            }
        };
        state.issued.insert(raw, offset);
        value
    }
}

impl Transport for PagedHub {
    fn execute(&self, request: &HubRequest) -> Result<HubResponse, HubError> {
        let mut state = lock(&self.state);
        state.requests.push(request.clone());
        if let Some(outcome) = self.faults.get(&state.requests.len()) {
            return outcome.clone();
        }

        let offset = match request.query_value("handle") {
            None => 0,
            Some(handle) => {
                let Some(&offset) = state.issued.get(handle) else {
                    return Ok(HubResponse::new(400, format!("unknown handle {handle}")));
                };
                if !state.used.insert(handle.to_owned()) {
                    return Ok(HubResponse::new(400, format!("handle {handle} reused")));
                }
                offset
            }
        };
        let limit = request
            .query_value("limit")
            .and_then(|limit| limit.parse::<usize>().ok())
            .unwrap_or(self.features.len());
        let start = offset.min(self.features.len());
        let end = self.page_end(start, limit);
        let handle = (end < self.features.len()).then(|| self.issue(&mut state, end));
        let page = self.features.get(start..end).unwrap_or_default();
        Ok(page_response(page, handle))
    }
}

/// Sleeper that records requested delays instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    recorded: Mutex<Vec<Duration>>,
    cancel_on_sleep: Option<CancellationToken>,
}

impl RecordingSleeper {
    /// Cancel `token` as soon as the first sleep starts.
    #[must_use]
    pub fn cancelling(token: CancellationToken) -> Self {
        Self {
            cancel_on_sleep: Some(token),
            ..Self::default()
        }
    }

    /// Delays requested so far.
    #[must_use]
    pub fn recorded(&self) -> Vec<Duration> {
        lock(&self.recorded).clone()
    }

    /// Sum of the requested delays.
    #[must_use]
    pub fn total(&self) -> Duration {
        lock(&self.recorded).iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Interrupted> {
        if cancel.is_cancelled() {
            return Err(Interrupted);
        }
        lock(&self.recorded).push(duration);
        if let Some(token) = &self.cancel_on_sleep {
            token.cancel();
        }
        if cancel.is_cancelled() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }
}
