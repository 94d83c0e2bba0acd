//! HNSW insertion.
//!
//! Inserts a vector with bidirectional connections and heuristic neighbor
//! pruning (Algorithm 4 from the HNSW paper). Nodes are append-only;
//! `internal_id` must equal `node_count` at the time of the call.

use crate::hnsw::graph::HnswGraph;
use crate::hnsw::search::search_layer;
use crate::hnsw::visited::VisitedSet;
use std::cell::RefCell;

thread_local! {
    // Reused across inserts to avoid a per-insert allocation.
    static INSERT_VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::new(0));
}

impl HnswGraph {
    /// Insert a new vector into the graph.
    pub fn insert(&mut self, internal_id: u32, vector: &[f32]) {
        debug_assert_eq!(internal_id, self.node_count);
        debug_assert_eq!(vector.len(), self.dimension);
        let level = self.random_level();

        // First node: no edges to build.
        if self.entry_point.is_none() {
            self.vectors.extend_from_slice(vector);
            self.neighbors.push(vec![Vec::new(); level + 1]);
            self.layers.push(level as u8);
            self.node_count += 1;
            self.entry_point = Some(internal_id);
            self.max_layer = level;
            return;
        }

        let entry_point = self.entry_point.expect("checked above");
        let top = level.min(self.max_layer);

        let node_neighbors = INSERT_VISITED.with(|cell| {
            let mut visited = cell.borrow_mut();
            visited.ensure_capacity(self.node_count as usize);

            let no_filter = |_: u32| true;
            let mut current_ep = entry_point;

            // Phase 1: greedy descent from the top layer to level + 1.
            for layer in (level + 1..=self.max_layer).rev() {
                let results = search_layer(
                    self,
                    vector,
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

            // Phase 2: collect neighbors for the new node on each layer.
            let mut node_neighbors: Vec<Vec<u32>> = vec![Vec::new(); level + 1];
            let mut layer_eps: Vec<u32> = vec![current_ep];
            for layer in (0..=top).rev() {
                let candidates = search_layer(
                    self,
                    vector,
                    &layer_eps,
                    self.config.ef_construction,
                    layer,
                    &mut visited,
                    &no_filter,
                );

                let m_max = if layer == 0 {
                    self.config.m_max0
                } else {
                    self.config.m
                };
                let selected = select_neighbors_heuristic(self, &candidates, m_max);
                node_neighbors[layer] = selected.iter().map(|&(_, id)| id).collect();

                layer_eps.clear();
                layer_eps.extend(candidates.iter().map(|&(_, id)| id));
                if layer_eps.is_empty() {
                    layer_eps.push(entry_point);
                }
            }

            node_neighbors
        });

        self.vectors.extend_from_slice(vector);
        self.neighbors.push(node_neighbors);
        self.layers.push(level as u8);
        self.node_count += 1;

        // Phase 3: backlinks, pruning over-capacity neighbor lists.
        for layer in 0..=top {
            let m_max = if layer == 0 {
                self.config.m_max0
            } else {
                self.config.m
            };

            let my_neighbors: Vec<u32> = self.neighbors[internal_id as usize][layer].clone();
            for &neighbor_id in &my_neighbors {
                let nid = neighbor_id as usize;
                while self.neighbors[nid].len() <= layer {
                    self.neighbors[nid].push(Vec::new());
                }
                self.neighbors[nid][layer].push(internal_id);

                if self.neighbors[nid][layer].len() > m_max {
                    let base = self.vector(neighbor_id).to_vec();
                    let candidates: Vec<(f32, u32)> = self.neighbors[nid][layer]
                        .iter()
                        .map(|&cid| (self.config.metric.distance(&base, self.vector(cid)), cid))
                        .collect();
                    let pruned = select_neighbors_heuristic(self, &candidates, m_max);
                    self.neighbors[nid][layer] = pruned.iter().map(|&(_, id)| id).collect();
                }
            }
        }

        if level > self.max_layer {
            self.max_layer = level;
            self.entry_point = Some(internal_id);
        }
    }
}

/// Heuristic neighbor selection (HNSW paper Algorithm 4).
///
/// A candidate is selected only if it is closer to the base point than to
/// any already-selected neighbor, which keeps the neighbor set diverse.
/// Remaining slots are filled with the closest unused candidates.
fn select_neighbors_heuristic(
    graph: &HnswGraph,
    candidates: &[(f32, u32)],
    m: usize,
) -> Vec<(f32, u32)> {
    let mut sorted = candidates.to_vec();
    sorted.sort_unstable_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let metric = graph.config.metric;
    let mut selected: Vec<(f32, u32)> = Vec::with_capacity(m);
    for &(dist_to_base, cid) in &sorted {
        if selected.len() >= m {
            break;
        }
        let is_diverse = selected.iter().all(|&(_, sid)| {
            let dist_to_selected = metric.distance(graph.vector(cid), graph.vector(sid));
            dist_to_base <= dist_to_selected
        });
        if is_diverse {
            selected.push((dist_to_base, cid));
        }
    }

    if selected.len() < m {
        let selected_ids: std::collections::HashSet<u32> =
            selected.iter().map(|&(_, id)| id).collect();
        for &(dist, cid) in &sorted {
            if selected.len() >= m {
                break;
            }
            if !selected_ids.contains(&cid) {
                selected.push((dist, cid));
            }
        }
    }

    selected
}
