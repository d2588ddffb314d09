// Validated value types - strongly-typed wrappers enforcing the invariants
// of spec section 3 at construction time, in the style of the teacher's
// `ValidatedPath`/`ValidatedTitle` family: these types cannot be built with
// invalid data, so downstream code never re-checks the invariant.

use anyhow::{ensure, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-empty, trimmed entity name. Entity names are the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityName(String);

impl EntityName {
    pub const MAX_LEN: usize = 500;

    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let trimmed = name.trim();
        ensure!(!trimmed.is_empty(), "entity name cannot be empty");
        ensure!(
            trimmed.len() <= Self::MAX_LEN,
            "entity name exceeds {} characters",
            Self::MAX_LEN
        );
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EntityName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A non-empty entity type label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityType(String);

impl EntityType {
    pub fn new(entity_type: impl Into<String>) -> Result<Self> {
        let entity_type = entity_type.into();
        let trimmed = entity_type.trim();
        ensure!(!trimmed.is_empty(), "entity type cannot be empty");
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-empty observation string, bounded in length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation(String);

impl Observation {
    pub const MAX_LEN: usize = 5000;

    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let trimmed = text.trim();
        ensure!(!trimmed.is_empty(), "observation cannot be empty");
        ensure!(
            trimmed.len() <= Self::MAX_LEN,
            "observation exceeds {} characters",
            Self::MAX_LEN
        );
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A normalized (lowercased, trimmed), length-bounded tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag(String);

impl Tag {
    pub const MAX_LEN: usize = 100;
    pub const MAX_TAGS: usize = 50;

    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        let normalized = tag.trim().to_lowercase();
        ensure!(!normalized.is_empty(), "tag cannot be empty");
        ensure!(
            normalized.len() <= Self::MAX_LEN,
            "tag exceeds {} characters",
            Self::MAX_LEN
        );
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deduplicate (case-insensitively) and cap a tag set.
pub fn normalize_tags(tags: impl IntoIterator<Item = impl Into<String>>) -> Result<Vec<Tag>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for raw in tags {
        let tag = Tag::new(raw)?;
        if seen.insert(tag.as_str().to_string()) {
            out.push(tag);
        }
    }
    ensure!(
        out.len() <= Tag::MAX_TAGS,
        "tag set exceeds {} tags",
        Tag::MAX_TAGS
    );
    Ok(out)
}

/// Importance score in `[0, 10]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Importance(u8);

impl Importance {
    pub fn new(value: u8) -> Result<Self> {
        ensure!(value <= 10, "importance must be in [0, 10], got {}", value);
        Ok(Self(value))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

/// A directed relation's type label (non-empty).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationType(String);

impl RelationType {
    pub fn new(relation_type: impl Into<String>) -> Result<Self> {
        let relation_type = relation_type.into();
        let trimmed = relation_type.trim();
        ensure!(!trimmed.is_empty(), "relation type cannot be empty");
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered pair of UTC timestamps (created, last-modified), enforcing
/// `lastModified >= createdAt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampPair {
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

impl TimestampPair {
    pub fn new(created_at: DateTime<Utc>, last_modified: DateTime<Utc>) -> Result<Self> {
        ensure!(
            last_modified >= created_at,
            "lastModified must be >= createdAt"
        );
        Ok(Self {
            created_at,
            last_modified,
        })
    }

    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            last_modified: now,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Bump `lastModified` to now, preserving `createdAt`.
    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_name_trims_and_rejects_empty() {
        assert_eq!(EntityName::new("  Alice  ").unwrap().as_str(), "Alice");
        assert!(EntityName::new("   ").is_err());
        assert!(EntityName::new("x".repeat(501)).is_err());
    }

    #[test]
    fn tags_dedupe_case_insensitively_and_cap() {
        let tags = normalize_tags(["Python", "python", "AI"]).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].as_str(), "python");

        let too_many: Vec<String> = (0..51).map(|i| format!("tag{i}")).collect();
        assert!(normalize_tags(too_many).is_err());
    }

    #[test]
    fn importance_bounds() {
        assert!(Importance::new(0).is_ok());
        assert!(Importance::new(10).is_ok());
        assert!(Importance::new(11).is_err());
    }

    #[test]
    fn timestamp_pair_orders() {
        let now = Utc::now();
        let earlier = now - chrono::Duration::seconds(10);
        assert!(TimestampPair::new(now, earlier).is_err());
        assert!(TimestampPair::new(earlier, now).is_ok());
    }
}
