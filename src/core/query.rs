//! Query descriptors.
//!
//! A [`QueryDescriptor`] is a fully formed GraphQL request: one of the three
//! shapes the harvester needs (cursor search, offset search, detail lookup).
//! Executors only ever see descriptors, never ad hoc request bodies.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};

/// Fields requested for every instructor node.
const TEACHER_FIELDS: &str = "
    id
    legacyId
    firstName
    lastName
    department
    avgRating
    numRatings
    avgDifficulty
    wouldTakeAgainPercent";

/// Cursor-paginated search.
pub const SEARCH_DOCUMENT: &str = concat!(
    "query TeacherSearchPaginationQuery($text: String!, $schoolID: ID!, $first: Int!, $after: String) {\n",
    "  search: newSearch {\n",
    "    teachers(query: {text: $text, schoolID: $schoolID}, first: $first, after: $after) {\n",
    "      edges { cursor node { ...TeacherFields } }\n",
    "      pageInfo { hasNextPage endCursor }\n",
    "      resultCount\n",
    "    }\n",
    "  }\n",
    "}\n",
);

/// Offset-paginated search.
pub const OFFSET_SEARCH_DOCUMENT: &str = concat!(
    "query TeacherSearchResultsPageQuery($query: TeacherSearchQuery!) {\n",
    "  search: newSearch {\n",
    "    teachers(query: $query) {\n",
    "      edges {\n",
    "        node {\n",
    "          ...TeacherFields\n",
    "          teacherRatingTags { tagName tagCount }\n",
    "          courseCodes { courseName courseCount }\n",
    "        }\n",
    "      }\n",
    "      pageInfo { hasNextPage endCursor }\n",
    "      resultCount\n",
    "    }\n",
    "  }\n",
    "}\n",
);

/// Per-instructor detail lookup.
pub const DETAIL_DOCUMENT: &str = concat!(
    "query TeacherRatingsPageQuery($id: ID!) {\n",
    "  node(id: $id) {\n",
    "    ... on Teacher {\n",
    "      ...TeacherFields\n",
    "      teacherRatingTags { tagName tagCount }\n",
    "      courseCodes { courseName courseCount }\n",
    "      ratingsDistribution { r1 r2 r3 r4 r5 }\n",
    "    }\n",
    "  }\n",
    "}\n",
);

/// Type name used in instructor global ids.
pub const TEACHER_TYPE: &str = "Teacher";

/// Type name used in school global ids.
pub const SCHOOL_TYPE: &str = "School";

/// A single parameterized query against the directory endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryDescriptor {
    /// Search page addressed by an opaque continuation token.
    Search {
        /// Required substring filter; empty matches everything.
        text: String,
        /// Encoded school global id.
        school_id: String,
        /// Page size.
        first: u32,
        /// Continuation token echoed from the previous page.
        after: Option<String>,
    },

    /// Search page addressed by a numeric offset.
    OffsetSearch {
        /// Required substring filter; empty matches everything.
        text: String,
        /// Encoded school global id.
        school_id: String,
        /// Number of results to skip.
        offset: u32,
        /// Page size.
        limit: u32,
    },

    /// Detail lookup for one instructor.
    Detail {
        /// Opaque global id of the instructor.
        id: String,
    },
}

impl QueryDescriptor {
    /// Creates a first-page cursor search.
    pub fn search(text: impl Into<String>, school_id: impl Into<String>, first: u32) -> Self {
        Self::Search {
            text: text.into(),
            school_id: school_id.into(),
            first,
            after: None,
        }
    }

    /// Creates an offset search.
    pub fn offset_search(
        text: impl Into<String>,
        school_id: impl Into<String>,
        offset: u32,
        limit: u32,
    ) -> Self {
        Self::OffsetSearch {
            text: text.into(),
            school_id: school_id.into(),
            offset,
            limit,
        }
    }

    /// Creates a detail lookup.
    pub fn detail(id: impl Into<String>) -> Self {
        Self::Detail { id: id.into() }
    }

    /// Sets the continuation token of a cursor search. No-op for other shapes.
    pub fn with_after(mut self, token: Option<String>) -> Self {
        if let Self::Search { after, .. } = &mut self {
            *after = token;
        }
        self
    }

    /// Returns the GraphQL operation name.
    pub fn operation_name(&self) -> &'static str {
        match self {
            Self::Search { .. } => "TeacherSearchPaginationQuery",
            Self::OffsetSearch { .. } => "TeacherSearchResultsPageQuery",
            Self::Detail { .. } => "TeacherRatingsPageQuery",
        }
    }

    /// Returns the full query document, fragments included.
    pub fn document(&self) -> String {
        let operation = match self {
            Self::Search { .. } => SEARCH_DOCUMENT,
            Self::OffsetSearch { .. } => OFFSET_SEARCH_DOCUMENT,
            Self::Detail { .. } => DETAIL_DOCUMENT,
        };
        format!("{operation}\nfragment TeacherFields on Teacher {{{TEACHER_FIELDS}\n}}\n")
    }

    /// Returns the query variables.
    pub fn variables(&self) -> Value {
        match self {
            Self::Search {
                text,
                school_id,
                first,
                after,
            } => json!({
                "text": text,
                "schoolID": school_id,
                "first": first,
                "after": after,
            }),
            Self::OffsetSearch {
                text,
                school_id,
                offset,
                limit,
            } => json!({
                "query": {
                    "text": text,
                    "schoolID": school_id,
                    "fallback": true,
                    "offset": offset,
                    "limit": limit,
                }
            }),
            Self::Detail { id } => json!({ "id": id }),
        }
    }

    /// Returns the POST body sent to the endpoint.
    pub fn to_body(&self) -> Value {
        json!({
            "operationName": self.operation_name(),
            "query": self.document(),
            "variables": self.variables(),
        })
    }

    /// Returns the search filter text, if this is a search.
    pub fn search_text(&self) -> Option<&str> {
        match self {
            Self::Search { text, .. } | Self::OffsetSearch { text, .. } => Some(text),
            Self::Detail { .. } => None,
        }
    }

    /// Short human-readable label for logs.
    pub fn label(&self) -> String {
        match self {
            Self::Search { text, after, .. } => {
                format!("search[{text:?}] after={}", after.as_deref().unwrap_or("-"))
            }
            Self::OffsetSearch {
                text,
                offset,
                limit,
                ..
            } => format!("search[{text:?}] offset={offset} limit={limit}"),
            Self::Detail { id } => format!("detail[{id}]"),
        }
    }
}

/// Encodes a global id (`base64("<Type>-<n>")`).
pub fn encode_global_id(type_name: &str, numeric_id: u64) -> String {
    STANDARD.encode(format!("{type_name}-{numeric_id}"))
}

/// Decodes a global id into its type name and numeric id.
///
/// Returns `None` if the id is not valid base64 or not of the form `<Type>-<n>`.
pub fn decode_global_id(id: &str) -> Option<(String, u64)> {
    let raw = STANDARD.decode(id.trim()).ok()?;
    let text = String::from_utf8(raw).ok()?;
    let (type_name, number) = text.rsplit_once('-')?;
    if type_name.is_empty() {
        return None;
    }
    Some((type_name.to_string(), number.parse().ok()?))
}

/// Encodes a school's numeric id into the global id the search expects.
pub fn school_global_id(school_id: u64) -> String {
    encode_global_id(SCHOOL_TYPE, school_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_school_global_id() {
        assert_eq!(school_global_id(758), "U2Nob29sLTc1OA==");
    }

    #[test]
    fn test_global_id_round_trip() {
        let id = encode_global_id(TEACHER_TYPE, 123_456);
        assert_eq!(decode_global_id(&id), Some(("Teacher".to_string(), 123_456)));
        assert_eq!(decode_global_id("not base64!"), None);
        assert_eq!(decode_global_id(&STANDARD.encode("Teacher")), None);
    }

    #[test]
    fn test_offset_search_requests_tags_and_courses() {
        let query = QueryDescriptor::offset_search("A", "U2Nob29sLTc1OA==", 0, 50);
        let document = query.document();

        assert!(document.contains("teacherRatingTags { tagName tagCount }"));
        assert!(document.contains("courseCodes { courseName courseCount }"));
    }

    #[test]
    fn test_search_variables() {
        let query = QueryDescriptor::search("A", "U2Nob29sLTc1OA==", 100)
            .with_after(Some("YXJyYXljb25uZWN0aW9uOjk5".into()));
        let vars = query.variables();

        assert_eq!(vars["text"], "A");
        assert_eq!(vars["first"], 100);
        assert_eq!(vars["after"], "YXJyYXljb25uZWN0aW9uOjk5");
        assert_eq!(query.search_text(), Some("A"));
    }

    #[test]
    fn test_first_page_sends_null_after() {
        let query = QueryDescriptor::search("", "U2Nob29sLTc1OA==", 100);
        assert!(query.variables()["after"].is_null());
    }

    #[test]
    fn test_offset_variables() {
        let query = QueryDescriptor::offset_search("", "U2Nob29sLTc1OA==", 100, 50);
        let vars = query.variables();

        assert_eq!(vars["query"]["offset"], 100);
        assert_eq!(vars["query"]["limit"], 50);
        assert_eq!(vars["query"]["fallback"], true);
    }

    #[test]
    fn test_body_includes_fragment() {
        let body = QueryDescriptor::detail("VGVhY2hlci0x").to_body();
        let document = body["query"].as_str().unwrap();

        assert_eq!(body["operationName"], "TeacherRatingsPageQuery");
        assert!(document.contains("ratingsDistribution"));
        assert!(document.contains("fragment TeacherFields on Teacher"));
        assert_eq!(body["variables"]["id"], "VGVhY2hlci0x");
    }

    #[test]
    fn test_with_after_ignored_for_detail() {
        let query = QueryDescriptor::detail("x").with_after(Some("token".into()));
        assert_eq!(query, QueryDescriptor::detail("x"));
        assert_eq!(query.search_text(), None);
    }
}
