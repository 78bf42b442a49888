//! Core record types.
//!
//! [`EntityRecord`] is the canonical harvested unit: one instructor profile
//! with its aggregate rating statistics and, after enrichment, its tags,
//! courses and rating distribution.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Department assigned when the source omits one.
pub const UNKNOWN_DEPARTMENT: &str = "Unknown";

/// A course an instructor has been rated for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Course code as reported by the source (e.g. "CMPSC 121").
    pub name: String,
    /// Number of ratings attached to the course.
    pub count: u32,
}

impl Course {
    /// Creates a new course entry.
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

/// One of the five star levels of a rating distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StarBucket {
    /// One star.
    #[serde(rename = "1_star")]
    One,
    /// Two stars.
    #[serde(rename = "2_star")]
    Two,
    /// Three stars.
    #[serde(rename = "3_star")]
    Three,
    /// Four stars.
    #[serde(rename = "4_star")]
    Four,
    /// Five stars.
    #[serde(rename = "5_star")]
    Five,
}

impl StarBucket {
    /// All buckets, lowest first.
    pub const ALL: [StarBucket; 5] = [Self::One, Self::Two, Self::Three, Self::Four, Self::Five];

    /// Returns the bucket's star level (1-5).
    pub fn level(&self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
        }
    }

    /// Returns the bucket for a star level, if it is in range.
    pub fn from_level(level: u8) -> Option<Self> {
        Self::ALL.get(usize::from(level).checked_sub(1)?).copied()
    }
}

impl fmt::Display for StarBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_star", self.level())
    }
}

/// Star-level counts for one instructor. Empty until enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingDistribution(BTreeMap<StarBucket, u32>);

impl RatingDistribution {
    /// Creates an empty distribution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a distribution from counts ordered one star to five stars.
    pub fn from_counts(counts: [u32; 5]) -> Self {
        Self(StarBucket::ALL.into_iter().zip(counts).collect())
    }

    /// Sets the count for a bucket.
    pub fn set(&mut self, bucket: StarBucket, count: u32) {
        self.0.insert(bucket, count);
    }

    /// Returns the count for a bucket.
    pub fn get(&self, bucket: StarBucket) -> Option<u32> {
        self.0.get(&bucket).copied()
    }

    /// Returns `true` if no bucket has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all bucket counts.
    pub fn total(&self) -> u64 {
        self.0.values().map(|&c| u64::from(c)).sum()
    }
}

/// A harvested instructor profile.
///
/// Identity is pinned to `numeric_id`: it is unique within a harvest and is
/// what the deduplicator keys on. `id` is the source's opaque global id and
/// is used to address detail queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Opaque, source-assigned global identifier.
    pub id: String,

    /// Numeric identifier, used for profile URLs and deduplication.
    pub numeric_id: u64,

    /// Given name (may be empty).
    pub first_name: String,

    /// Family name (may be empty).
    pub last_name: String,

    /// Trimmed `first_name + " " + last_name`; never empty.
    pub full_name: String,

    /// Department, or [`UNKNOWN_DEPARTMENT`].
    pub department: String,

    /// School display name.
    pub school: String,

    /// Average overall rating.
    pub aggregate_rating: Option<f64>,

    /// Number of ratings.
    pub num_ratings: Option<u32>,

    /// Share of students who would take the instructor again, in percent.
    pub would_take_again_percent: Option<f64>,

    /// Average difficulty rating.
    pub difficulty_rating: Option<f64>,

    /// Rating tags, most frequent first as reported by the source.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Courses rated for this instructor.
    #[serde(default)]
    pub courses: Vec<Course>,

    /// Rating counts per star level.
    #[serde(default)]
    pub rating_distribution: RatingDistribution,

    /// Public profile page.
    pub profile_url: String,
}

impl EntityRecord {
    /// Joins name parts the way the source displays them.
    pub fn compose_full_name(first: &str, last: &str) -> String {
        format!("{} {}", first.trim(), last.trim()).trim().to_string()
    }

    /// Returns `true` if the department was not reported by the source.
    pub fn has_unknown_department(&self) -> bool {
        self.department == UNKNOWN_DEPARTMENT
    }

    /// Returns `true` if enrichment has populated any detail collection.
    pub fn is_enriched(&self) -> bool {
        !self.tags.is_empty() || !self.courses.is_empty() || !self.rating_distribution.is_empty()
    }
}
