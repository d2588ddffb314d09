// Validation manager (spec 4.13): a full pass over the graph that
// categorizes errors (orphaned relations, duplicate entity names, invalid
// data) and warnings (isolated entities, empty observations, missing
// timestamps), grounded on the same `get_graph_for_mutation` snapshot style
// as `AnalyticsManager::graph_stats`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::GraphStorage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationIssue {
    OrphanedRelation { from: String, to: String, relation_type: String },
    DuplicateEntityName { name: String },
    InvalidData { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationWarning {
    IsolatedEntity { name: String },
    EmptyObservations { name: String },
    MissingTimestamps { name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub issues: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationWarning>,
    pub summary: String,
}

pub struct ValidationManager {
    storage: Arc<dyn GraphStorage>,
}

impl ValidationManager {
    pub fn new(storage: Arc<dyn GraphStorage>) -> Self {
        Self { storage }
    }

    pub async fn validate(&self) -> Result<ValidationReport> {
        let graph = self.storage.get_graph_for_mutation().await?;

        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        let mut seen_names: HashMap<&str, usize> = HashMap::new();
        for entity in &graph.entities {
            *seen_names.entry(entity.name.as_str()).or_insert(0) += 1;
        }
        for (name, count) in &seen_names {
            if *count > 1 {
                issues.push(ValidationIssue::DuplicateEntityName { name: name.to_string() });
            }
        }

        for entity in &graph.entities {
            let name = entity.name.as_str();

            if name.trim().is_empty() || entity.entity_type.as_str().trim().is_empty() {
                issues.push(ValidationIssue::InvalidData {
                    name: name.to_string(),
                    reason: "empty name or type".to_string(),
                });
            }

            if !self.storage.has_relations(name) {
                warnings.push(ValidationWarning::IsolatedEntity { name: name.to_string() });
            }

            if entity.observations.is_empty() {
                warnings.push(ValidationWarning::EmptyObservations { name: name.to_string() });
            }

            if is_missing(entity.timestamps.created_at()) || is_missing(entity.timestamps.last_modified()) {
                warnings.push(ValidationWarning::MissingTimestamps { name: name.to_string() });
            }
        }

        for relation in &graph.relations {
            let from_exists = graph.entity(relation.from.as_str()).is_some();
            let to_exists = graph.entity(relation.to.as_str()).is_some();
            if !from_exists || !to_exists {
                issues.push(ValidationIssue::OrphanedRelation {
                    from: relation.from.as_str().to_string(),
                    to: relation.to.as_str().to_string(),
                    relation_type: relation.relation_type.as_str().to_string(),
                });
            }
        }

        let is_valid = issues.is_empty();
        let summary = format!(
            "{} entities, {} relations: {} issue(s), {} warning(s)",
            graph.entities.len(),
            graph.relations.len(),
            issues.len(),
            warnings.len(),
        );

        Ok(ValidationReport { is_valid, issues, warnings, summary })
    }
}

/// A timestamp at or before the Unix epoch is treated as "never properly
/// set" - legitimate data always comes from `TimestampPair::now()`, so an
/// epoch-or-earlier value can only arrive via a hand-written or migrated
/// snapshot that skipped normal construction.
fn is_missing(ts: DateTime<Utc>) -> bool {
    ts.timestamp() <= 0
}
