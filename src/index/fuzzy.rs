// Fuzzy string matching: full Levenshtein distance, sharded across a
// rayon thread pool for CPU-bound parallelism over large candidate sets
// (spec 4.4.4). The pool is injected rather than owned here so callers can
// route this work through the named pool registry in `workers` (spec
// section 5's worker-pool manager).

use rayon::prelude::*;
use rayon::ThreadPool;

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub name: String,
    pub distance: usize,
}

/// Classic full-matrix Levenshtein distance between two strings, compared
/// case-insensitively.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let (n, m) = (a.len(), b.len());

    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }

    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];

    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[m]
}

/// Returns every candidate whose distance to `query` is `<= max_distance`,
/// sorted by ascending distance then name. `pool` shards the comparison
/// across worker threads when `candidates` is large.
pub fn search(pool: &ThreadPool, query: &str, candidates: &[String], max_distance: usize) -> Vec<FuzzyMatch> {
    let mut matches = pool.install(|| {
        candidates
            .par_iter()
            .filter_map(|candidate| {
                let distance = levenshtein(query, candidate);
                (distance <= max_distance).then_some(FuzzyMatch {
                    name: candidate.clone(),
                    distance,
                })
            })
            .collect::<Vec<_>>()
    });

    matches.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.name.cmp(&b.name)));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_matches_known_distances() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("Alice", "alice"), 0);
    }

    #[test]
    fn search_filters_and_sorts_by_distance() {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let candidates = vec!["Alice".to_string(), "Alicia".to_string(), "Bob".to_string()];
        let results = search(&pool, "Alice", &candidates, 2);
        assert_eq!(results[0].name, "Alice");
        assert_eq!(results[0].distance, 0);
        assert!(results.iter().all(|m| m.name != "Bob"));
    }
}
