// Centrality measures: degree, Brandes' betweenness, and iterative
// PageRank (damping 0.85), over the same `Adjacency` traversal uses (spec
// 4.7). Hand-implemented rather than reached for from `petgraph::algo`
// (which doesn't ship betweenness or PageRank), consistent with the
// teacher's own preference for hand-rolled graph algorithms over pulling
// in a graph-algorithms crate.

use std::collections::HashMap;

use crate::cancellation::{CancellationToken, ProgressReporter};
use crate::error::Result;
use crate::graph::traversal::Adjacency;

const PROGRESS_BATCH: usize = 64;
const PAGERANK_DAMPING: f64 = 0.85;
const PAGERANK_MAX_ITERATIONS: usize = 100;
const PAGERANK_CONVERGENCE: f64 = 1e-6;

pub fn degree_centrality(adjacency: &Adjacency) -> HashMap<String, usize> {
    adjacency
        .nodes()
        .map(|name| (name.clone(), adjacency.neighbors(name).len()))
        .collect()
}

/// Brandes' algorithm: O(V*E) exact betweenness centrality on an
/// unweighted graph.
pub fn betweenness_centrality(
    adjacency: &Adjacency,
    cancellation: &CancellationToken,
    progress: &dyn ProgressReporter,
) -> Result<HashMap<String, f64>> {
    let nodes: Vec<&String> = adjacency.nodes().collect();
    let mut scores: HashMap<String, f64> = nodes.iter().map(|n| ((*n).clone(), 0.0)).collect();

    for (processed, source) in nodes.iter().enumerate() {
        cancellation.check()?;
        if processed % PROGRESS_BATCH == 0 {
            progress.report(processed, Some(nodes.len()));
        }

        let mut stack = Vec::new();
        let mut predecessors: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut sigma: HashMap<&str, f64> = nodes.iter().map(|n| (n.as_str(), 0.0)).collect();
        let mut distance: HashMap<&str, i64> = nodes.iter().map(|n| (n.as_str(), -1)).collect();

        sigma.insert(source.as_str(), 1.0);
        distance.insert(source.as_str(), 0);

        let mut queue = std::collections::VecDeque::new();
        queue.push_back(source.as_str());

        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for w in adjacency.neighbors(v) {
                let w = w.as_str();
                if distance[w] < 0 {
                    distance.insert(w, distance[v] + 1);
                    queue.push_back(w);
                }
                if distance[w] == distance[v] + 1 {
                    sigma.insert(w, sigma[w] + sigma[v]);
                    predecessors.entry(w).or_default().push(v);
                }
            }
        }

        let mut delta: HashMap<&str, f64> = nodes.iter().map(|n| (n.as_str(), 0.0)).collect();
        while let Some(w) = stack.pop() {
            if let Some(preds) = predecessors.get(w) {
                for &v in preds {
                    delta.insert(v, delta[v] + (sigma[v] / sigma[w]) * (1.0 + delta[w]));
                }
            }
            if w != source.as_str() {
                *scores.get_mut(w).unwrap() += delta[w];
            }
        }
    }

    progress.report(nodes.len(), Some(nodes.len()));

    // Undirected graph: every shortest path counted from both endpoints.
    for score in scores.values_mut() {
        *score /= 2.0;
    }

    Ok(scores)
}

/// Iterative PageRank with damping factor 0.85, converging when the total
/// absolute change between iterations drops below `PAGERANK_CONVERGENCE`
/// or after `PAGERANK_MAX_ITERATIONS`.
pub fn pagerank(
    adjacency: &Adjacency,
    cancellation: &CancellationToken,
    progress: &dyn ProgressReporter,
) -> Result<HashMap<String, f64>> {
    let nodes: Vec<&String> = adjacency.nodes().collect();
    let n = nodes.len();
    if n == 0 {
        return Ok(HashMap::new());
    }

    let mut rank: HashMap<&str, f64> = nodes.iter().map(|n| (n.as_str(), 1.0 / n as f64)).collect();
    let base = (1.0 - PAGERANK_DAMPING) / n as f64;

    for iteration in 0..PAGERANK_MAX_ITERATIONS {
        cancellation.check()?;
        progress.report(iteration, Some(PAGERANK_MAX_ITERATIONS));

        let mut next: HashMap<&str, f64> = nodes.iter().map(|n| (n.as_str(), base)).collect();
        for node in &nodes {
            let out_degree = adjacency.neighbors(node).len();
            if out_degree == 0 {
                // Dangling node: redistribute its rank evenly.
                let share = PAGERANK_DAMPING * rank[node.as_str()] / n as f64;
                for value in next.values_mut() {
                    *value += share;
                }
                continue;
            }
            let share = PAGERANK_DAMPING * rank[node.as_str()] / out_degree as f64;
            for neighbor in adjacency.neighbors(node) {
                *next.get_mut(neighbor.as_str()).unwrap() += share;
            }
        }

        let delta: f64 = nodes.iter().map(|n| (next[n.as_str()] - rank[n.as_str()]).abs()).sum();
        rank = next;
        if delta < PAGERANK_CONVERGENCE {
            break;
        }
    }

    Ok(rank.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::NoopProgress;
    use crate::model::{Entity, KnowledgeGraph, Relation};

    fn star_graph() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        for name in ["Center", "A", "B", "C"] {
            graph
                .entities
                .push(Entity::new(name, "node", Vec::<String>::new(), Vec::<String>::new(), None, None).unwrap());
        }
        for leaf in ["A", "B", "C"] {
            graph.relations.push(Relation::new("Center", leaf, "links").unwrap());
        }
        graph
    }

    #[test]
    fn degree_centrality_counts_neighbors() {
        let adjacency = Adjacency::from_graph(&star_graph());
        let degrees = degree_centrality(&adjacency);
        assert_eq!(degrees["Center"], 3);
        assert_eq!(degrees["A"], 1);
    }

    #[test]
    fn center_of_a_star_has_the_highest_betweenness() {
        let adjacency = Adjacency::from_graph(&star_graph());
        let scores = betweenness_centrality(&adjacency, &CancellationToken::new(), &NoopProgress).unwrap();
        let center = scores["Center"];
        assert!(center > scores["A"]);
        assert!(center > 0.0);
    }

    #[test]
    fn pagerank_sums_to_roughly_one() {
        let adjacency = Adjacency::from_graph(&star_graph());
        let ranks = pagerank(&adjacency, &CancellationToken::new(), &NoopProgress).unwrap();
        let total: f64 = ranks.values().sum();
        assert!((total - 1.0).abs() < 1e-3);
        assert!(ranks["Center"] > ranks["A"]);
    }
}
