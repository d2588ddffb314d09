// Graph traversal: BFS shortest path, depth-bounded DFS all-paths, and
// weakly-connected components (spec 4.7). Built over a plain adjacency
// map rather than `petgraph`'s graph type, matching the teacher's own
// preference for hand-rolled adjacency (`native_graph_storage.rs` keeps a
// `BTreeMap`-based node/edge store rather than building a `petgraph`
// graph), with cooperative cancellation and batched progress reporting
// threaded through every loop (spec 4.12).

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::cancellation::{CancellationToken, ProgressReporter};
use crate::error::Result;
use crate::model::KnowledgeGraph;

const PROGRESS_BATCH: usize = 256;

/// `name -> [neighbor names]`, undirected (both directions of every
/// relation are present) - traversal and centrality operate on the
/// underlying connectivity, not directionality.
pub struct Adjacency {
    edges: HashMap<String, Vec<String>>,
}

impl Adjacency {
    pub fn from_graph(graph: &KnowledgeGraph) -> Self {
        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        for entity in &graph.entities {
            edges.entry(entity.name.as_str().to_string()).or_default();
        }
        for relation in &graph.relations {
            edges
                .entry(relation.from.as_str().to_string())
                .or_default()
                .push(relation.to.as_str().to_string());
            edges
                .entry(relation.to.as_str().to_string())
                .or_default()
                .push(relation.from.as_str().to_string());
        }
        Self { edges }
    }

    pub fn neighbors(&self, name: &str) -> &[String] {
        self.edges.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &String> {
        self.edges.keys()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Breadth-first shortest path between `from` and `to`. `None` if no path
/// exists (or either endpoint is absent).
pub fn shortest_path(
    adjacency: &Adjacency,
    from: &str,
    to: &str,
    cancellation: &CancellationToken,
    progress: &dyn ProgressReporter,
) -> Result<Option<Vec<String>>> {
    if !adjacency.edges.contains_key(from) || !adjacency.edges.contains_key(to) {
        return Ok(None);
    }
    if from == to {
        return Ok(Some(vec![from.to_string()]));
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    let mut parent: HashMap<&str, &str> = HashMap::new();

    visited.insert(from);
    queue.push_back(from);
    let mut visited_count = 0usize;

    while let Some(current) = queue.pop_front() {
        cancellation.check()?;
        visited_count += 1;
        if visited_count % PROGRESS_BATCH == 0 {
            progress.report(visited_count, None);
        }

        if current == to {
            break;
        }

        for neighbor in adjacency.neighbors(current) {
            if visited.insert(neighbor.as_str()) {
                parent.insert(neighbor.as_str(), current);
                queue.push_back(neighbor.as_str());
            }
        }
    }

    progress.report(visited_count, None);

    if !visited.contains(to) {
        return Ok(None);
    }

    let mut path = vec![to.to_string()];
    let mut current = to;
    while current != from {
        let prev = parent[current];
        path.push(prev.to_string());
        current = prev;
    }
    path.reverse();
    Ok(Some(path))
}

/// Depth-bounded DFS enumeration of every simple path between `from` and
/// `to`, up to `max_depth` edges. Bounded both in depth and in total path
/// count (`max_paths`) so a densely connected graph can't produce a
/// combinatorial blowup.
#[allow(clippy::too_many_arguments)]
pub fn all_paths(
    adjacency: &Adjacency,
    from: &str,
    to: &str,
    max_depth: usize,
    max_paths: usize,
    cancellation: &CancellationToken,
    progress: &dyn ProgressReporter,
) -> Result<Vec<Vec<String>>> {
    let mut results = Vec::new();
    let mut visiting = HashSet::new();
    let mut path = vec![from.to_string()];
    let mut visited_count = 0usize;

    if adjacency.edges.contains_key(from) && adjacency.edges.contains_key(to) {
        visiting.insert(from.to_string());
        dfs(
            adjacency,
            from,
            to,
            max_depth,
            max_paths,
            cancellation,
            progress,
            &mut visiting,
            &mut path,
            &mut results,
            &mut visited_count,
        )?;
    }

    progress.report(visited_count, None);
    Ok(results)
}

#[allow(clippy::too_many_arguments)]
fn dfs(
    adjacency: &Adjacency,
    current: &str,
    target: &str,
    remaining_depth: usize,
    max_paths: usize,
    cancellation: &CancellationToken,
    progress: &dyn ProgressReporter,
    visiting: &mut HashSet<String>,
    path: &mut Vec<String>,
    results: &mut Vec<Vec<String>>,
    visited_count: &mut usize,
) -> Result<()> {
    cancellation.check()?;
    *visited_count += 1;
    if *visited_count % PROGRESS_BATCH == 0 {
        progress.report(*visited_count, None);
    }

    if results.len() >= max_paths {
        return Ok(());
    }

    if current == target {
        results.push(path.clone());
        return Ok(());
    }

    if remaining_depth == 0 {
        return Ok(());
    }

    for neighbor in adjacency.neighbors(current) {
        if results.len() >= max_paths {
            break;
        }
        if visiting.contains(neighbor) {
            continue;
        }
        visiting.insert(neighbor.clone());
        path.push(neighbor.clone());
        dfs(
            adjacency,
            neighbor,
            target,
            remaining_depth - 1,
            max_paths,
            cancellation,
            progress,
            visiting,
            path,
            results,
            visited_count,
        )?;
        path.pop();
        visiting.remove(neighbor);
    }

    Ok(())
}

/// Weakly-connected components, returned as sorted name lists for
/// deterministic output.
pub fn connected_components(adjacency: &Adjacency) -> Vec<Vec<String>> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut components = Vec::new();

    let mut nodes: Vec<&str> = adjacency.edges.keys().map(|s| s.as_str()).collect();
    nodes.sort_unstable();

    for &node in &nodes {
        if seen.contains(node) {
            continue;
        }
        let mut component = BTreeMap::new();
        let mut queue = VecDeque::from([node]);
        seen.insert(node);
        while let Some(current) = queue.pop_front() {
            component.insert(current.to_string(), ());
            for neighbor in adjacency.neighbors(current) {
                if seen.insert(neighbor.as_str()) {
                    queue.push_back(neighbor.as_str());
                }
            }
        }
        components.push(component.into_keys().collect());
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::NoopProgress;
    use crate::model::{Entity, Relation};

    fn graph() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        for name in ["A", "B", "C", "D", "Isolated"] {
            graph
                .entities
                .push(Entity::new(name, "node", Vec::<String>::new(), Vec::<String>::new(), None, None).unwrap());
        }
        for (from, to) in [("A", "B"), ("B", "C"), ("C", "D")] {
            graph.relations.push(Relation::new(from, to, "links").unwrap());
        }
        graph
    }

    #[test]
    fn shortest_path_finds_the_minimal_hop_route() {
        let adjacency = Adjacency::from_graph(&graph());
        let path = shortest_path(&adjacency, "A", "D", &CancellationToken::new(), &NoopProgress)
            .unwrap()
            .unwrap();
        assert_eq!(path, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn shortest_path_is_none_when_disconnected() {
        let adjacency = Adjacency::from_graph(&graph());
        let path = shortest_path(&adjacency, "A", "Isolated", &CancellationToken::new(), &NoopProgress).unwrap();
        assert!(path.is_none());
    }

    #[test]
    fn all_paths_respects_depth_bound() {
        let adjacency = Adjacency::from_graph(&graph());
        let paths = all_paths(&adjacency, "A", "D", 2, 10, &CancellationToken::new(), &NoopProgress).unwrap();
        assert!(paths.is_empty(), "A-D is 3 hops, should exceed depth 2");

        let paths = all_paths(&adjacency, "A", "D", 3, 10, &CancellationToken::new(), &NoopProgress).unwrap();
        assert_eq!(paths.len(), 1);
    }

    #[test]
    fn connected_components_separate_the_isolated_node() {
        let adjacency = Adjacency::from_graph(&graph());
        let components = connected_components(&adjacency);
        assert_eq!(components.len(), 2);
        assert!(components.iter().any(|c| c == &vec!["Isolated".to_string()]));
    }

    #[test]
    fn cancellation_is_observed_mid_traversal() {
        let adjacency = Adjacency::from_graph(&graph());
        let token = CancellationToken::new();
        token.cancel();
        let result = shortest_path(&adjacency, "A", "D", &token, &NoopProgress);
        assert!(result.is_err());
    }
}
