//! Mock executor for testing.
//!
//! This module provides a scripted executor that can be used in tests to
//! simulate directory responses and transport failures without a network.
//! It also exposes helpers that build response bodies in the same shape the
//! live endpoint returns.

use crate::core::{encode_global_id, HarvestError, QueryDescriptor, QueryExecutor};
use crate::core::query::TEACHER_TYPE;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One scripted reply.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// A successful response body.
    Payload(Value),
    /// The request timed out.
    Timeout,
    /// The endpoint answered with the given non-200 status.
    Status(u16),
    /// HTTP 429 carrying a `Retry-After` delay.
    RateLimited(Duration),
    /// HTTP 200 with an `errors` envelope.
    Rejected(String),
    /// HTTP 200 whose body could not be interpreted.
    Malformed,
}

impl MockReply {
    fn into_outcome(self, endpoint: &str) -> Result<Value, HarvestError> {
        match self {
            Self::Payload(body) => Ok(body),
            Self::Timeout => Err(HarvestError::timeout(endpoint, Duration::from_secs(30))),
            Self::Status(status) => Err(HarvestError::from_status(endpoint, status)),
            Self::RateLimited(retry_after) => Err(HarvestError::RateLimited {
                endpoint: endpoint.to_string(),
                retry_after: Some(retry_after),
            }),
            Self::Rejected(details) => Err(HarvestError::rejected(endpoint, details)),
            Self::Malformed => Err(HarvestError::malformed(endpoint, "simulated malformed body")),
        }
    }
}

/// A scripted executor for testing purposes.
///
/// Replies are queued per query key: the search text for searches (`""` for
/// the catch-all) and the global id for detail lookups. Each call pops the
/// next reply for its key. Once a key's queue is drained, searches get an
/// empty page and detail lookups get a `null` node.
///
/// # Examples
///
/// ```rust
/// use roster_harvest::backends::mock::{search_page, teacher_node, MockExecutor, MockReply};
///
/// let executor = MockExecutor::new()
///     .with_reply("A", MockReply::Status(503))
///     .with_reply("A", MockReply::Payload(search_page(vec![teacher_node(1, "Ada", "Lovelace")], false, None, 1)));
/// ```
#[derive(Debug)]
pub struct MockExecutor {
    /// Name of this executor instance.
    name: String,
    /// Scripted replies keyed by query key.
    replies: Mutex<HashMap<String, VecDeque<MockReply>>>,
    /// Every query received, in order.
    calls: Mutex<Vec<QueryDescriptor>>,
    /// Simulated latency per call.
    latency: Option<Duration>,
    /// Counter for execute operations.
    call_count: AtomicU64,
}

impl MockExecutor {
    /// Creates a new mock executor with no scripted replies.
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            latency: None,
            call_count: AtomicU64::new(0),
        }
    }

    /// Sets the name of this executor.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the simulated latency per call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queues a reply for a query key.
    pub fn with_reply(self, key: impl Into<String>, reply: MockReply) -> Self {
        self.push_reply(key, reply);
        self
    }

    /// Queues a sequence of search pages for a partition key.
    pub fn with_pages(self, key: impl Into<String>, pages: impl IntoIterator<Item = Value>) -> Self {
        let key = key.into();
        for page in pages {
            self.push_reply(key.clone(), MockReply::Payload(page));
        }
        self
    }

    /// Queues a detail response for a global id.
    pub fn with_detail(self, id: impl Into<String>, node: Value) -> Self {
        self.with_reply(id, MockReply::Payload(detail_response(node)))
    }

    /// Queues a reply for a query key (shared-reference version).
    pub fn push_reply(&self, key: impl Into<String>, reply: MockReply) {
        lock(&self.replies).entry(key.into()).or_default().push_back(reply);
    }

    /// Returns the number of calls performed.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Returns every query received so far.
    pub fn calls(&self) -> Vec<QueryDescriptor> {
        lock(&self.calls).clone()
    }

    /// Returns the number of calls whose key matches.
    pub fn calls_for(&self, key: &str) -> usize {
        lock(&self.calls).iter().filter(|q| query_key(q) == key).count()
    }

    /// Returns the number of replies still queued for a key.
    pub fn pending(&self, key: &str) -> usize {
        lock(&self.replies).get(key).map_or(0, VecDeque::len)
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, query: &QueryDescriptor) -> Result<Value, HarvestError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        lock(&self.calls).push(query.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let key = query_key(query);
        let reply = lock(&self.replies)
            .get_mut(key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| match query {
                QueryDescriptor::Detail { .. } => MockReply::Payload(detail_response(Value::Null)),
                _ => MockReply::Payload(search_page(Vec::new(), false, None, 0)),
            });

        reply.into_outcome(&self.name)
    }
}

fn query_key(query: &QueryDescriptor) -> &str {
    match query {
        QueryDescriptor::Search { text, .. } | QueryDescriptor::OffsetSearch { text, .. } => text,
        QueryDescriptor::Detail { id } => id,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builds a minimal instructor node as the search endpoint returns it.
pub fn teacher_node(numeric_id: u64, first_name: &str, last_name: &str) -> Value {
    json!({
        "id": encode_global_id(TEACHER_TYPE, numeric_id),
        "legacyId": numeric_id,
        "firstName": first_name,
        "lastName": last_name,
        "department": "Mathematics",
        "avgRating": 4.0,
        "numRatings": 10,
        "avgDifficulty": 2.5,
        "wouldTakeAgainPercent": 80.0,
    })
}

/// Builds a search response body.
pub fn search_page(
    nodes: Vec<Value>,
    has_next_page: bool,
    end_cursor: Option<&str>,
    result_count: u64,
) -> Value {
    let edges: Vec<Value> = nodes
        .into_iter()
        .enumerate()
        .map(|(i, node)| json!({ "cursor": format!("c{i}"), "node": node }))
        .collect();

    json!({
        "data": {
            "search": {
                "teachers": {
                    "edges": edges,
                    "pageInfo": { "hasNextPage": has_next_page, "endCursor": end_cursor },
                    "resultCount": result_count,
                }
            }
        }
    })
}

/// Builds a detail response body.
pub fn detail_response(node: Value) -> Value {
    json!({ "data": { "node": node } })
}
