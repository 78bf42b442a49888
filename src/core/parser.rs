//! Record parser.
//!
//! Maps one raw instructor node (a search edge's `node`, or the `node` of a
//! detail response) onto an [`EntityRecord`]. The parser is tolerant: every
//! field except the identity and the name is optional, and absent statistics
//! stay absent rather than defaulting to zero.

use crate::core::error::ParseError;
use crate::core::query::{decode_global_id, encode_global_id, TEACHER_TYPE};
use crate::core::types::{Course, EntityRecord, RatingDistribution, StarBucket, UNKNOWN_DEPARTMENT};

use serde_json::{Map, Value};

/// Default school display name.
pub const DEFAULT_SCHOOL_NAME: &str = "Penn State University";

/// Default prefix for profile URLs; the numeric id is appended.
pub const DEFAULT_PROFILE_BASE_URL: &str = "https://www.ratemyprofessors.com/professor/";

/// Parses raw API nodes into records.
#[derive(Debug, Clone)]
pub struct RecordParser {
    school_name: String,
    profile_base_url: String,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self {
            school_name: DEFAULT_SCHOOL_NAME.to_string(),
            profile_base_url: DEFAULT_PROFILE_BASE_URL.to_string(),
        }
    }
}

impl RecordParser {
    /// Creates a parser with default school and profile URL settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the school display name stamped on every record.
    pub fn with_school_name(mut self, name: impl Into<String>) -> Self {
        self.school_name = name.into();
        self
    }

    /// Sets the profile URL prefix.
    pub fn with_profile_base_url(mut self, url: impl Into<String>) -> Self {
        self.profile_base_url = url.into();
        self
    }

    /// Builds the profile URL for a numeric id.
    pub fn profile_url(&self, numeric_id: u64) -> String {
        format!("{}{}", self.profile_base_url, numeric_id)
    }

    /// Parses one node.
    ///
    /// # Errors
    ///
    /// - [`ParseError::NotAnObject`] if the node is not a JSON object.
    /// - [`ParseError::MissingIdentifier`] if neither `legacyId` nor `id`
    ///   yields a numeric identity.
    /// - [`ParseError::MissingName`] if both name fields are blank.
    pub fn parse(&self, node: &Value) -> Result<EntityRecord, ParseError> {
        let node = node.as_object().ok_or(ParseError::NotAnObject)?;

        let (id, numeric_id) = resolve_identity(node)?;

        let first_name = str_field(node, "firstName").trim().to_string();
        let last_name = str_field(node, "lastName").trim().to_string();
        let full_name = EntityRecord::compose_full_name(&first_name, &last_name);
        if full_name.is_empty() {
            return Err(ParseError::MissingName { numeric_id });
        }

        let department = match str_field(node, "department").trim() {
            "" => UNKNOWN_DEPARTMENT.to_string(),
            dept => dept.to_string(),
        };

        Ok(EntityRecord {
            id,
            numeric_id,
            first_name,
            last_name,
            full_name,
            department,
            school: self.school_name.clone(),
            aggregate_rating: statistic(node, "avgRating"),
            num_ratings: count_field(node, "numRatings"),
            would_take_again_percent: statistic(node, "wouldTakeAgainPercent"),
            difficulty_rating: statistic(node, "avgDifficulty"),
            tags: parse_tags(node),
            courses: parse_courses(node),
            rating_distribution: parse_distribution(node),
            profile_url: self.profile_url(numeric_id),
        })
    }
}

/// Resolves `(id, numeric_id)` from whichever of `id` / `legacyId` is present.
fn resolve_identity(node: &Map<String, Value>) -> Result<(String, u64), ParseError> {
    let global_id = node
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let legacy_id = node.get("legacyId").and_then(|v| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });

    let numeric_id = legacy_id
        .or_else(|| global_id.and_then(decode_global_id).map(|(_, n)| n))
        .filter(|&n| n > 0)
        .ok_or(ParseError::MissingIdentifier)?;

    let id = global_id
        .map(str::to_string)
        .unwrap_or_else(|| encode_global_id(TEACHER_TYPE, numeric_id));

    Ok((id, numeric_id))
}

fn str_field<'a>(node: &'a Map<String, Value>, key: &str) -> &'a str {
    node.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Reads a numeric statistic. The source reports "no data" as `null`, an
/// absent key, or a negative sentinel; all three map to `None`.
fn statistic(node: &Map<String, Value>, key: &str) -> Option<f64> {
    node.get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite() && *v >= 0.0)
}

fn count_field(node: &Map<String, Value>, key: &str) -> Option<u32> {
    node.get(key)
        .and_then(Value::as_u64)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}

fn parse_tags(node: &Map<String, Value>) -> Vec<String> {
    node.get("teacherRatingTags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|tag| tag.get("tagName").and_then(Value::as_str))
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_courses(node: &Map<String, Value>) -> Vec<Course> {
    let Some(courses) = node.get("courseCodes").and_then(Value::as_array) else {
        return Vec::new();
    };

    courses
        .iter()
        .filter_map(|course| {
            let course = course.as_object()?;
            let name = str_field(course, "courseName").trim();
            if name.is_empty() {
                return None;
            }
            Some(Course::new(name, count_field(course, "courseCount").unwrap_or(0)))
        })
        .collect()
}

fn parse_distribution(node: &Map<String, Value>) -> RatingDistribution {
    let Some(dist) = node.get("ratingsDistribution").and_then(Value::as_object) else {
        return RatingDistribution::new();
    };

    let mut distribution = RatingDistribution::new();
    for bucket in StarBucket::ALL {
        let key = format!("r{}", bucket.level());
        distribution.set(bucket, count_field(dist, &key).unwrap_or(0));
    }
    distribution
}
