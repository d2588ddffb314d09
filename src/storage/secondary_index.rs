// Derived secondary indices, rebuilt from the truth store and kept in sync
// incrementally via the same mutation calls the storage backends expose.
// Grounded on the teacher's `PrimaryIndex`/`TrigramIndex` split
// (primary_index.rs): one structure per access pattern rather than one
// do-everything map.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::model::{Entity, KnowledgeGraph, Relation};
use crate::storage::LowercaseView;

/// `name -> Entity`, insertion-ordered so iteration is deterministic.
#[derive(Debug, Default)]
pub struct NameIndex {
    entries: IndexMap<String, Entity>,
}

impl NameIndex {
    pub fn build(graph: &KnowledgeGraph) -> Self {
        let mut entries = IndexMap::with_capacity(graph.entities.len());
        for entity in &graph.entities {
            entries.insert(entity.name.as_str().to_string(), entity.clone());
        }
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn insert(&mut self, entity: Entity) {
        self.entries.insert(entity.name.as_str().to_string(), entity);
    }

    pub fn remove(&mut self, name: &str) -> Option<Entity> {
        self.entries.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &Entity> {
        self.entries.values()
    }
}

/// `entity_type -> [name]`.
#[derive(Debug, Default)]
pub struct TypeIndex {
    by_type: HashMap<String, Vec<String>>,
}

impl TypeIndex {
    pub fn build(graph: &KnowledgeGraph) -> Self {
        let mut by_type: HashMap<String, Vec<String>> = HashMap::new();
        for entity in &graph.entities {
            by_type
                .entry(entity.entity_type.as_str().to_string())
                .or_default()
                .push(entity.name.as_str().to_string());
        }
        Self { by_type }
    }

    pub fn names_for(&self, entity_type: &str) -> &[String] {
        self.by_type
            .get(entity_type)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn types(&self) -> Vec<String> {
        self.by_type.keys().cloned().collect()
    }

    pub fn insert(&mut self, entity_type: &str, name: &str) {
        let list = self.by_type.entry(entity_type.to_string()).or_default();
        if !list.iter().any(|n| n == name) {
            list.push(name.to_string());
        }
    }

    pub fn remove(&mut self, entity_type: &str, name: &str) {
        if let Some(list) = self.by_type.get_mut(entity_type) {
            list.retain(|n| n != name);
            if list.is_empty() {
                self.by_type.remove(entity_type);
            }
        }
    }
}

/// Lazily-computed, memoized lowercase view per entity. Invalidated by
/// removing the cached entry on update (spec 3: "recomputed on update").
#[derive(Debug, Default)]
pub struct LowercaseCache {
    cache: HashMap<String, LowercaseView>,
}

impl LowercaseCache {
    pub fn get_or_compute(&mut self, entity: &Entity) -> LowercaseView {
        self.cache
            .entry(entity.name.as_str().to_string())
            .or_insert_with(|| Self::compute(entity))
            .clone()
    }

    pub fn invalidate(&mut self, name: &str) {
        self.cache.remove(name);
    }

    fn compute(entity: &Entity) -> LowercaseView {
        LowercaseView {
            name: entity.name.as_str().to_lowercase(),
            entity_type: entity.entity_type.as_str().to_lowercase(),
            observations: entity
                .observations
                .iter()
                .map(|o| o.as_str().to_lowercase())
                .collect(),
            tags: entity.tags.iter().map(|t| t.as_str().to_string()).collect(),
        }
    }
}

/// `name -> (outgoing, incoming)` relation lists.
#[derive(Debug, Default)]
pub struct RelationIndex {
    outgoing: HashMap<String, Vec<Relation>>,
    incoming: HashMap<String, Vec<Relation>>,
}

impl RelationIndex {
    pub fn build(graph: &KnowledgeGraph) -> Self {
        let mut index = Self::default();
        for relation in &graph.relations {
            index.insert(relation.clone());
        }
        index
    }

    pub fn insert(&mut self, relation: Relation) {
        self.outgoing
            .entry(relation.from.as_str().to_string())
            .or_default()
            .push(relation.clone());
        self.incoming
            .entry(relation.to.as_str().to_string())
            .or_default()
            .push(relation);
    }

    pub fn remove(&mut self, from: &str, to: &str, relation_type: &str) -> bool {
        let removed_out = remove_matching(self.outgoing.get_mut(from), to, relation_type);
        let removed_in = remove_matching(self.incoming.get_mut(to), from, relation_type);
        removed_out || removed_in
    }

    /// Drops every relation touching `name`, e.g. on entity deletion.
    pub fn remove_all_for(&mut self, name: &str) -> Vec<Relation> {
        let mut removed = self.outgoing.remove(name).unwrap_or_default();
        for relation in &removed {
            if let Some(list) = self.incoming.get_mut(relation.to.as_str()) {
                list.retain(|r| !(r.from.as_str() == name && r.relation_type == relation.relation_type));
            }
        }
        if let Some(incoming) = self.incoming.remove(name) {
            for relation in &incoming {
                if let Some(list) = self.outgoing.get_mut(relation.from.as_str()) {
                    list.retain(|r| !(r.to.as_str() == name && r.relation_type == relation.relation_type));
                }
            }
            removed.extend(incoming);
        }
        removed
    }

    pub fn from(&self, name: &str) -> &[Relation] {
        self.outgoing.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn to(&self, name: &str) -> &[Relation] {
        self.incoming.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn has_any(&self, name: &str) -> bool {
        self.outgoing.get(name).is_some_and(|v| !v.is_empty())
            || self.incoming.get(name).is_some_and(|v| !v.is_empty())
    }
}

fn remove_matching(list: Option<&mut Vec<Relation>>, other: &str, relation_type: &str) -> bool {
    match list {
        Some(list) => {
            let before = list.len();
            list.retain(|r| {
                let matches_out = r.to.as_str() == other && r.relation_type.as_str() == relation_type;
                let matches_in = r.from.as_str() == other && r.relation_type.as_str() == relation_type;
                !(matches_out || matches_in)
            });
            list.len() != before
        }
        None => false,
    }
}

/// `entity name -> observation count`, used for the tag/observation
/// histograms in analytics (spec supplement, grounded on original_source
/// stats helpers).
#[derive(Debug, Default)]
pub struct ObservationIndex {
    counts: HashMap<String, usize>,
}

impl ObservationIndex {
    pub fn build(graph: &KnowledgeGraph) -> Self {
        let mut counts = HashMap::new();
        for entity in &graph.entities {
            counts.insert(entity.name.as_str().to_string(), entity.observations.len());
        }
        Self { counts }
    }

    pub fn count(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn set(&mut self, name: &str, count: usize) {
        self.counts.insert(name.to_string(), count);
    }

    pub fn remove(&mut self, name: &str) {
        self.counts.remove(name);
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Bundles the four derived structures a `GraphStorage` backend owns.
#[derive(Default)]
pub struct SecondaryIndices {
    pub names: NameIndex,
    pub types: TypeIndex,
    pub lowercase: LowercaseCache,
    pub relations: RelationIndex,
    pub observations: ObservationIndex,
}

impl SecondaryIndices {
    pub fn build(graph: &KnowledgeGraph) -> Self {
        Self {
            names: NameIndex::build(graph),
            types: TypeIndex::build(graph),
            lowercase: LowercaseCache::default(),
            relations: RelationIndex::build(graph),
            observations: ObservationIndex::build(graph),
        }
    }

    pub fn on_entity_created(&mut self, entity: &Entity) {
        self.types.insert(entity.entity_type.as_str(), entity.name.as_str());
        self.observations
            .set(entity.name.as_str(), entity.observations.len());
        self.names.insert(entity.clone());
    }

    pub fn on_entity_updated(&mut self, old: &Entity, new: &Entity) {
        if old.entity_type != new.entity_type {
            self.types.remove(old.entity_type.as_str(), old.name.as_str());
            self.types.insert(new.entity_type.as_str(), new.name.as_str());
        }
        self.observations
            .set(new.name.as_str(), new.observations.len());
        self.lowercase.invalidate(new.name.as_str());
        self.names.insert(new.clone());
    }

    pub fn on_entity_deleted(&mut self, entity: &Entity) {
        self.names.remove(entity.name.as_str());
        self.types.remove(entity.entity_type.as_str(), entity.name.as_str());
        self.observations.remove(entity.name.as_str());
        self.lowercase.invalidate(entity.name.as_str());
        self.relations.remove_all_for(entity.name.as_str());
    }

    pub fn on_relation_created(&mut self, relation: Relation) {
        self.relations.insert(relation);
    }

    pub fn on_relation_deleted(&mut self, from: &str, to: &str, relation_type: &str) -> bool {
        self.relations.remove(from, to, relation_type)
    }
}
