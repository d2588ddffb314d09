// Analytics manager: a cheap graph-statistics snapshot (supplemented
// feature, SPEC_FULL.md section C.3), grounded on the teacher's
// `GraphStats` struct in `graph_storage.rs` - same fields (node/edge
// counts, per-type histograms, average degree, connected-component
// count), adapted to entity/relation terms and extended with the tag
// histogram from `search::filter::tag_counts`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::traversal::{connected_components, Adjacency};
use crate::search::filter::tag_counts;
use crate::storage::GraphStorage;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub entity_count: usize,
    pub relation_count: usize,
    pub entities_by_type: HashMap<String, usize>,
    pub tag_counts: HashMap<String, usize>,
    pub average_degree: f64,
    pub connected_components: usize,
    /// Entities whose `parentId` does not resolve to a known entity.
    /// Tolerated, not rejected - see SPEC_FULL.md section C.4.
    pub dangling_parents: Vec<String>,
}

pub struct AnalyticsManager {
    storage: Arc<dyn GraphStorage>,
}

impl AnalyticsManager {
    pub fn new(storage: Arc<dyn GraphStorage>) -> Self {
        Self { storage }
    }

    pub async fn graph_stats(&self) -> Result<GraphStats> {
        let graph = self.storage.get_graph_for_mutation().await?;

        let mut entities_by_type = HashMap::new();
        for entity in &graph.entities {
            *entities_by_type
                .entry(entity.entity_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        let dangling_parents = graph
            .entities
            .iter()
            .filter_map(|e| {
                let parent = e.parent_id.as_ref()?;
                if graph.entity(parent.as_str()).is_none() {
                    Some(e.name.as_str().to_string())
                } else {
                    None
                }
            })
            .collect();

        let adjacency = Adjacency::from_graph(&graph);
        let average_degree = if adjacency.len() == 0 {
            0.0
        } else {
            (2 * graph.relations.len()) as f64 / adjacency.len() as f64
        };
        let components = connected_components(&adjacency);

        Ok(GraphStats {
            entity_count: graph.entities.len(),
            relation_count: graph.relations.len(),
            entities_by_type,
            tag_counts: tag_counts(&graph.entities),
            average_degree,
            connected_components: components.len(),
            dangling_parents,
        })
    }
}
