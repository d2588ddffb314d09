// Core data model - Entity, Relation, and the KnowledgeGraph aggregate.
// Grounded on the teacher's `Document`/`graph_storage::GraphNode` shape:
// plain data structs with a validating constructor, serde derives for
// on-disk and wire representation.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    normalize_tags, EntityName, EntityType, Importance, Observation, RelationType, Tag,
    TimestampPair,
};

/// A typed, named node in the knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: EntityName,
    pub entity_type: EntityType,
    pub observations: Vec<Observation>,
    pub tags: Vec<Tag>,
    pub importance: Option<Importance>,
    /// Name of another entity this one is nested under. May dangle - see
    /// spec 3: legitimate in append-log mode, checked lazily elsewhere.
    pub parent_id: Option<EntityName>,
    pub timestamps: TimestampPair,
}

impl Entity {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        entity_type: impl Into<String>,
        observations: impl IntoIterator<Item = impl Into<String>>,
        tags: impl IntoIterator<Item = impl Into<String>>,
        importance: Option<u8>,
        parent_id: Option<String>,
    ) -> Result<Self> {
        let name = EntityName::new(name)?;
        let entity_type = EntityType::new(entity_type)?;
        let observations = observations
            .into_iter()
            .map(Observation::new)
            .collect::<Result<Vec<_>>>()?;
        let tags = normalize_tags(tags)?;
        let importance = importance.map(Importance::new).transpose()?;
        let parent_id = parent_id.map(EntityName::new).transpose()?;

        Ok(Self {
            name,
            entity_type,
            observations,
            tags,
            importance,
            parent_id,
            timestamps: TimestampPair::now(),
        })
    }

    /// Concatenation of name, type, and observations - the document text
    /// the lexical rankers tokenize (spec 4.4).
    pub fn document_text(&self) -> String {
        let mut text = String::with_capacity(64);
        text.push_str(self.name.as_str());
        text.push(' ');
        text.push_str(self.entity_type.as_str());
        for obs in &self.observations {
            text.push(' ');
            text.push_str(obs.as_str());
        }
        text
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let normalized = tag.trim().to_lowercase();
        self.tags.iter().any(|t| t.as_str() == normalized)
    }

    pub fn touch(&mut self) {
        self.timestamps.touch();
    }
}

/// A directed `(from, to, relationType)` edge between two entity names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub from: EntityName,
    pub to: EntityName,
    pub relation_type: RelationType,
    pub timestamps: TimestampPair,
}

impl Relation {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            from: EntityName::new(from)?,
            to: EntityName::new(to)?,
            relation_type: RelationType::new(relation_type)?,
            timestamps: TimestampPair::now(),
        })
    }
}

/// A deep-copyable in-memory aggregate of entities and relations, as
/// returned by `getGraphForMutation` (spec 4.1). Iteration order over
/// `entities`/`relations` is insertion order (stable within one snapshot)
/// via the caller's choice of collection - callers that need this use
/// `IndexMap` upstream (see `storage::secondary_index::NameIndex`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name.as_str() == name)
    }
}

/// Partial update applied via `updateEntity` (spec 4.1). `None` fields are
/// left unchanged.
#[derive(Debug, Clone, Default)]
pub struct EntityUpdate {
    pub entity_type: Option<EntityType>,
    pub importance: Option<Option<Importance>>,
    pub parent_id: Option<Option<EntityName>>,
}

/// A snapshot timestamp/version marker, used to invalidate the search
/// cache whenever the underlying snapshot changes (spec 4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotVersion(pub u64);

impl SnapshotVersion {
    pub fn initial() -> Self {
        Self(0)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[allow(dead_code)]
pub(crate) fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_document_text_concatenates_fields() {
        let e = Entity::new(
            "Alice",
            "person",
            ["Engineer"],
            ["python", "ai"],
            Some(5),
            None,
        )
        .unwrap();
        assert_eq!(e.document_text(), "Alice person Engineer");
        assert!(e.has_tag("Python"));
    }

    #[test]
    fn snapshot_version_increments() {
        let v0 = SnapshotVersion::initial();
        let v1 = v0.next();
        assert!(v1 > v0);
    }
}
