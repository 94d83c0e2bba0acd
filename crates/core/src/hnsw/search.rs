//! HNSW search: single-layer search and multi-layer KNN.
//!
//! Supports an optional predicate `Fn(u32) -> bool` applied during layer-0
//! traversal. Nodes failing the predicate are still used for navigation but
//! excluded from results, so a sparse predicate can return fewer than `k`
//! hits even when more matches exist farther from the query.

use crate::hnsw::graph::HnswGraph;
use crate::hnsw::visited::VisitedSet;
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

/// A traversal candidate: (negative distance, node id).
/// BinaryHeap is a max-heap; negated distance yields min-heap behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    neg_distance: OrderedFloat<f32>,
    id: u32,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.neg_distance.cmp(&other.neg_distance)
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A result entry: (distance, node id). Max-heap by distance for pruning.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResultEntry {
    distance: OrderedFloat<f32>,
    id: u32,
}

impl Ord for ResultEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance.cmp(&other.distance)
    }
}

impl PartialOrd for ResultEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Search a single layer of the graph: the `ef` closest nodes to the query
/// that pass `filter_fn`. `visited` is reused across calls and cleared here.
pub fn search_layer<F: Fn(u32) -> bool>(
    graph: &HnswGraph,
    query: &[f32],
    entry_points: &[u32],
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
    filter_fn: &F,
) -> Vec<(f32, u32)> {
    visited.clear();
    let mut candidates: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef * 2);
    let mut results: BinaryHeap<ResultEntry> = BinaryHeap::with_capacity(ef + 1);
    let mut worst_dist = f32::MAX;

    for &ep in entry_points {
        if visited.insert(ep) {
            let dist = graph.distance_to(query, ep);
            candidates.push(Candidate {
                neg_distance: OrderedFloat(-dist),
                id: ep,
            });
            if filter_fn(ep) {
                results.push(ResultEntry {
                    distance: OrderedFloat(dist),
                    id: ep,
                });
                if results.len() >= ef {
                    worst_dist = results.peek().map_or(f32::MAX, |r| r.distance.0);
                }
            }
        }
    }

    while let Some(candidate) = candidates.pop() {
        let c_dist = -candidate.neg_distance.0;
        if results.len() >= ef && c_dist > worst_dist {
            break;
        }

        let node_id = candidate.id as usize;
        if layer >= graph.neighbors[node_id].len() {
            continue;
        }

        for &neighbor_id in &graph.neighbors[node_id][layer] {
            if !visited.insert(neighbor_id) {
                continue;
            }

            let dist = graph.distance_to(query, neighbor_id);
            if results.len() < ef || dist < worst_dist {
                candidates.push(Candidate {
                    neg_distance: OrderedFloat(-dist),
                    id: neighbor_id,
                });
                if filter_fn(neighbor_id) {
                    results.push(ResultEntry {
                        distance: OrderedFloat(dist),
                        id: neighbor_id,
                    });
                    if results.len() > ef {
                        results.pop();
                    }
                    worst_dist = results.peek().map_or(f32::MAX, |r| r.distance.0);
                }
            }
        }
    }

    results
        .into_sorted_vec()
        .into_iter()
        .map(|r| (r.distance.0, r.id))
        .collect()
}

/// Multi-layer KNN search.
pub fn knn_search(graph: &HnswGraph, query: &[f32], k: usize) -> Vec<(f32, u32)> {
    knn_search_filtered(graph, query, k, &|_: u32| true)
}

/// Multi-layer KNN search with a predicate applied during layer-0 traversal.
pub fn knn_search_filtered<F: Fn(u32) -> bool>(
    graph: &HnswGraph,
    query: &[f32],
    k: usize,
    filter_fn: &F,
) -> Vec<(f32, u32)> {
    let entry_point = match graph.entry_point {
        Some(ep) => ep,
        None => return Vec::new(),
    };

    let mut visited = VisitedSet::new(graph.node_count as usize);
    let mut current_ep = entry_point;

    // Greedy descent with ef=1 from the top layer down to layer 1.
    // Filtering only matters at layer 0.
    let no_filter = |_: u32| true;
    for layer in (1..=graph.max_layer).rev() {
        let results = search_layer(
            graph,
            query,
            std::slice::from_ref(&current_ep),
            1,
            layer,
            &mut visited,
            &no_filter,
        );
        if let Some(&(_, nearest)) = results.first() {
            current_ep = nearest;
        }
    }

    let ef = graph.config.ef_search.max(k);
    let mut results = search_layer(
        graph,
        query,
        std::slice::from_ref(&current_ep),
        ef,
        0,
        &mut visited,
        filter_fn,
    );
    results.truncate(k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::graph::HnswConfig;

    fn build_graph(vectors: &[Vec<f32>]) -> HnswGraph {
        let mut g = HnswGraph::new(vectors[0].len(), HnswConfig::default());
        for (i, v) in vectors.iter().enumerate() {
            g.insert(i as u32, v);
        }
        g
    }

    #[test]
    fn test_knn_search_empty_graph() {
        let g = HnswGraph::new(3, HnswConfig::default());
        assert!(knn_search(&g, &[1.0, 0.0, 0.0], 5).is_empty());
    }

    #[test]
    fn test_knn_search_finds_exact_match() {
        let g = build_graph(&[
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.5, 0.5, 0.0],
        ]);
        let results = knn_search(&g, &[0.0, 1.0, 0.0], 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].1, 1);
        assert!(results[0].0 < 1e-6);
    }

    #[test]
    fn test_filtered_search_excludes_nodes() {
        let g = build_graph(&[
            vec![1.0, 0.0],
            vec![0.9, 0.1],
            vec![0.0, 1.0],
            vec![0.1, 0.9],
        ]);
        let allow = |id: u32| id % 2 == 0;
        let results = knn_search_filtered(&g, &[1.0, 0.0], 4, &allow);
        assert!(!results.is_empty());
        for &(_, id) in &results {
            assert_eq!(id % 2, 0, "filtered-out node {id} surfaced");
        }
    }

    #[test]
    fn test_knn_recall_on_clustered_data() {
        // Two tight clusters; every query should resolve inside its own.
        let mut vectors = Vec::new();
        for i in 0..50 {
            vectors.push(vec![10.0 + (i as f32) * 0.01, 10.0]);
        }
        for i in 0..50 {
            vectors.push(vec![-10.0 - (i as f32) * 0.01, -10.0]);
        }
        let g = build_graph(&vectors);
        let results = knn_search(&g, &[10.0, 10.0], 10);
        assert_eq!(results.len(), 10);
        for &(_, id) in &results {
            assert!(id < 50, "query near cluster A returned node {id} from cluster B");
        }
    }
}
