// Filter chain and pagination (spec 4.6): tag AND/OR matching, type,
// importance range, date range, and parent-scope filters, applied as a
// single predicate so every search surface (lexical, boolean, vector,
// hybrid) filters identically.

use chrono::{DateTime, Utc};

use crate::model::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFilterMode {
    /// Entity must carry every listed tag.
    All,
    /// Entity must carry at least one listed tag.
    Any,
}

#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub entity_type: Option<String>,
    pub tags: Vec<String>,
    pub tag_mode: Option<TagFilterMode>,
    pub importance_min: Option<u8>,
    pub importance_max: Option<u8>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub parent_id: Option<String>,
}

impl EntityFilter {
    pub fn matches(&self, entity: &Entity) -> bool {
        if let Some(entity_type) = &self.entity_type {
            if entity.entity_type.as_str() != entity_type {
                return false;
            }
        }

        if !self.tags.is_empty() {
            let mode = self.tag_mode.unwrap_or(TagFilterMode::All);
            let matched = match mode {
                TagFilterMode::All => self.tags.iter().all(|t| entity.has_tag(t)),
                TagFilterMode::Any => self.tags.iter().any(|t| entity.has_tag(t)),
            };
            if !matched {
                return false;
            }
        }

        let importance = entity.importance.map(|i| i.get());
        if let Some(min) = self.importance_min {
            if importance.map(|i| i < min).unwrap_or(true) {
                return false;
            }
        }
        if let Some(max) = self.importance_max {
            if importance.map(|i| i > max).unwrap_or(false) {
                return false;
            }
        }

        if let Some(after) = self.created_after {
            if entity.timestamps.created_at() < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if entity.timestamps.created_at() > before {
                return false;
            }
        }

        if let Some(parent_id) = &self.parent_id {
            if entity.parent_id.as_ref().map(|p| p.as_str()) != Some(parent_id.as_str()) {
                return false;
            }
        }

        true
    }

    pub fn apply<'a>(&self, entities: impl IntoIterator<Item = &'a Entity>) -> Vec<&'a Entity> {
        entities.into_iter().filter(|e| self.matches(e)).collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { offset: 0, limit: 50 }
    }
}

pub fn paginate<T>(items: Vec<T>, pagination: Pagination) -> Vec<T> {
    items.into_iter().skip(pagination.offset).take(pagination.limit).collect()
}

/// Tag histogram over a set of entities, used by the analytics manager's
/// faceting view.
pub fn tag_counts<'a>(entities: impl IntoIterator<Item = &'a Entity>) -> std::collections::HashMap<String, usize> {
    let mut counts = std::collections::HashMap::new();
    for entity in entities {
        for tag in &entity.tags {
            *counts.entry(tag.as_str().to_string()).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str, tags: &[&str], importance: u8) -> Entity {
        Entity::new(name, "person", Vec::<String>::new(), tags.to_vec(), Some(importance), None).unwrap()
    }

    #[test]
    fn tag_all_requires_every_tag() {
        let filter = EntityFilter {
            tags: vec!["rust".into(), "senior".into()],
            tag_mode: Some(TagFilterMode::All),
            ..Default::default()
        };
        assert!(filter.matches(&entity("Alice", &["rust", "senior"], 5)));
        assert!(!filter.matches(&entity("Bob", &["rust"], 5)));
    }

    #[test]
    fn tag_any_requires_at_least_one() {
        let filter = EntityFilter {
            tags: vec!["rust".into(), "go".into()],
            tag_mode: Some(TagFilterMode::Any),
            ..Default::default()
        };
        assert!(filter.matches(&entity("Bob", &["go"], 5)));
    }

    #[test]
    fn importance_range_is_inclusive() {
        let filter = EntityFilter {
            importance_min: Some(3),
            importance_max: Some(7),
            ..Default::default()
        };
        assert!(filter.matches(&entity("Alice", &[], 3)));
        assert!(filter.matches(&entity("Alice", &[], 7)));
        assert!(!filter.matches(&entity("Alice", &[], 8)));
    }

    #[test]
    fn pagination_slices_in_order() {
        let items: Vec<i32> = (0..10).collect();
        let page = paginate(items, Pagination { offset: 3, limit: 4 });
        assert_eq!(page, vec![3, 4, 5, 6]);
    }

    #[test]
    fn tag_counts_histograms_across_entities() {
        let entities = vec![
            entity("Alice", &["rust", "senior"], 5),
            entity("Bob", &["rust"], 3),
        ];
        let counts = tag_counts(&entities);
        assert_eq!(counts.get("rust"), Some(&2));
        assert_eq!(counts.get("senior"), Some(&1));
    }
}
