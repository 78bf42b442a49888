//! Pagination cursor.
//!
//! Drives one partition's search to exhaustion. Two pagination styles are
//! supported, chosen by configuration:
//!
//! - **Cursor**: each page carries `pageInfo.endCursor`, which the next
//!   request echoes as `after`. Stops on `hasNextPage == false` or an empty page.
//! - **Offset**: each request advances a numeric offset by the page size.
//!   Stops on an empty page, or once the offset reaches `resultCount`.
//!
//! Both styles also stop at a fixed per-partition page ceiling.

use crate::backoff::BackoffController;
use crate::core::{HarvestError, HarvestResult, QueryDescriptor, QueryExecutor};
use crate::harvest::planner::PartitionDescriptor;
use crate::harvest::report::PartitionEnd;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Default page size for cursor-style pagination.
pub const DEFAULT_CURSOR_PAGE_SIZE: u32 = 100;

/// Default page size for offset-style pagination.
pub const DEFAULT_OFFSET_PAGE_SIZE: u32 = 50;

/// Default ceiling on pages fetched for one partition.
pub const DEFAULT_PAGE_CEILING: u32 = 200;

/// How successive pages are addressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationStyle {
    /// Opaque continuation token.
    #[default]
    Cursor,
    /// Numeric offset.
    Offset,
}

impl PaginationStyle {
    /// Returns the default page size for this style.
    pub fn default_page_size(&self) -> u32 {
        match self {
            Self::Cursor => DEFAULT_CURSOR_PAGE_SIZE,
            Self::Offset => DEFAULT_OFFSET_PAGE_SIZE,
        }
    }
}

impl fmt::Display for PaginationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cursor => f.write_str("cursor"),
            Self::Offset => f.write_str("offset"),
        }
    }
}

impl FromStr for PaginationStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cursor" => Ok(Self::Cursor),
            "offset" => Ok(Self::Offset),
            other => Err(format!("unknown pagination style '{other}' (expected cursor or offset)")),
        }
    }
}

/// Per-partition pagination state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorState {
    /// Key of the partition being paginated.
    pub partition_key: String,
    /// Continuation token for the next page; `None` requests the first page.
    pub continuation: Option<String>,
    /// Offset of the next page (offset style).
    pub offset: u32,
    /// Whether another page should be requested.
    pub has_more: bool,
    /// Pages fetched so far.
    pub pages_fetched: u32,
    /// Why pagination stopped, once it has.
    pub end: Option<PartitionEnd>,
}

impl CursorState {
    /// Creates the state for a partition's first page.
    pub fn start(partition: &PartitionDescriptor) -> Self {
        Self {
            partition_key: partition.key(),
            continuation: None,
            offset: 0,
            has_more: true,
            pages_fetched: 0,
            end: None,
        }
    }

    fn finish(mut self, end: PartitionEnd) -> Self {
        self.has_more = false;
        self.end = Some(end);
        self
    }
}

/// One decoded search page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    /// Raw instructor nodes, in page order.
    pub nodes: Vec<Value>,
    /// `pageInfo.hasNextPage`.
    pub has_next_page: bool,
    /// `pageInfo.endCursor`.
    pub end_cursor: Option<String>,
    /// `resultCount` for the whole filtered query.
    pub result_count: Option<u64>,
}

impl SearchPage {
    /// Decodes `data.search.teachers` from a search response body.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::MalformedResponse`] if the connection object
    /// or its `edges` array is missing.
    pub fn decode(endpoint: &str, payload: &Value) -> HarvestResult<Self> {
        let teachers = payload
            .get("data")
            .and_then(|d| d.get("search"))
            .and_then(|s| s.get("teachers"))
            .filter(|t| t.is_object())
            .ok_or_else(|| HarvestError::malformed(endpoint, "missing data.search.teachers"))?;

        let edges = teachers
            .get("edges")
            .and_then(Value::as_array)
            .ok_or_else(|| HarvestError::malformed(endpoint, "missing teachers.edges"))?;

        let nodes = edges
            .iter()
            .filter_map(|edge| edge.get("node"))
            .filter(|node| !node.is_null())
            .cloned()
            .collect();

        let page_info = teachers.get("pageInfo");

        Ok(Self {
            nodes,
            has_next_page: page_info
                .and_then(|p| p.get("hasNextPage"))
                .and_then(Value::as_bool)
                .unwrap_or(false),
            end_cursor: page_info
                .and_then(|p| p.get("endCursor"))
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            result_count: teachers.get("resultCount").and_then(Value::as_u64),
        })
    }
}

/// Result of advancing a cursor by one page.
#[derive(Debug, Clone)]
pub struct Page {
    /// Raw nodes on this page.
    pub nodes: Vec<Value>,
    /// `resultCount` reported on this page.
    pub result_count: Option<u64>,
    /// State to continue from.
    pub state: CursorState,
}

impl Page {
    /// Returns whether another page should be requested.
    pub fn has_more(&self) -> bool {
        self.state.has_more
    }
}

/// Pages a single partition through the backoff controller.
#[derive(Debug, Clone)]
pub struct PaginationCursor {
    style: PaginationStyle,
    school_id: String,
    page_size: u32,
    page_ceiling: u32,
}

impl PaginationCursor {
    /// Creates a cursor for the given style and encoded school id, using the
    /// style's default page size and the default page ceiling.
    pub fn new(style: PaginationStyle, school_id: impl Into<String>) -> Self {
        Self {
            style,
            school_id: school_id.into(),
            page_size: style.default_page_size(),
            page_ceiling: DEFAULT_PAGE_CEILING,
        }
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sets the per-partition page ceiling.
    pub fn with_page_ceiling(mut self, ceiling: u32) -> Self {
        self.page_ceiling = ceiling.max(1);
        self
    }

    /// Returns the pagination style.
    pub fn style(&self) -> PaginationStyle {
        self.style
    }

    /// Returns the page size.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Builds the query for the page `state` points at.
    pub fn query_for(&self, state: &CursorState) -> QueryDescriptor {
        match self.style {
            PaginationStyle::Cursor => {
                QueryDescriptor::search(&state.partition_key, &self.school_id, self.page_size)
                    .with_after(state.continuation.clone())
            }
            PaginationStyle::Offset => QueryDescriptor::offset_search(
                &state.partition_key,
                &self.school_id,
                state.offset,
                self.page_size,
            ),
        }
    }

    /// Fetches the page `state` points at and computes the next state.
    ///
    /// # Errors
    ///
    /// Propagates the controller's failure (soft after retries, hard, or
    /// session abort) and malformed search payloads.
    pub async fn advance<E: QueryExecutor>(
        &self,
        controller: &BackoffController<E>,
        state: CursorState,
    ) -> HarvestResult<Page> {
        let query = self.query_for(&state);
        let endpoint = controller.name();
        let page = controller
            .run_decoded(&query, |payload| SearchPage::decode(endpoint, &payload))
            .await?;

        tracing::debug!(
            partition = %state.partition_key,
            page = state.pages_fetched + 1,
            nodes = page.nodes.len(),
            has_next_page = page.has_next_page,
            result_count = ?page.result_count,
            "Fetched page"
        );

        let result_count = page.result_count;
        let nodes_on_page = page.nodes.len();
        let state = self.next_state(state, &page);

        Ok(Page {
            nodes: page.nodes,
            result_count,
            state: if nodes_on_page == 0 {
                state.finish(PartitionEnd::EmptyPage)
            } else {
                state
            },
        })
    }

    /// Computes the state after a non-empty page.
    fn next_state(&self, mut state: CursorState, page: &SearchPage) -> CursorState {
        state.pages_fetched += 1;

        let end = match self.style {
            PaginationStyle::Cursor => {
                let next = page.end_cursor.clone();
                if !page.has_next_page {
                    Some(PartitionEnd::Exhausted)
                } else if next.is_none() || next == state.continuation {
                    // No way to move forward.
                    Some(PartitionEnd::Exhausted)
                } else {
                    state.continuation = next;
                    None
                }
            }
            PaginationStyle::Offset => {
                state.offset = state.offset.saturating_add(self.page_size);
                match page.result_count {
                    Some(total) if u64::from(state.offset) >= total => {
                        Some(PartitionEnd::ResultCountReached)
                    }
                    _ => None,
                }
            }
        };

        match end {
            Some(end) => state.finish(end),
            None if state.pages_fetched >= self.page_ceiling => state.finish(PartitionEnd::PageCeiling),
            None => state,
        }
    }
}
