//! The context-search pipeline: per-term scoring, entry selection, a
//! centrality-weighted Dijkstra, and the pairwise Steiner-tree approximation
//! that connects the entry set (SPEC_FULL.md §4.5-§4.9). This is the
//! centerpiece of the engine.

use crate::config::{Config, RECENCY_HALF_LIFE_MS};
use crate::graph::GraphState;
use crate::indexer;
use crate::model::GraphView;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// `score(e, t)` from SPEC_FULL.md §4.5: sublinear term frequency times a
/// content/connectedness importance factor times temporal recency decay.
fn score_for_term(
    state: &GraphState,
    degree: &HashMap<&str, usize>,
    now_ms: i64,
    term: &str,
    candidate: &str,
) -> f64 {
    let entity = match state.entity(candidate) {
        Some(e) => e,
        None => return 0.0,
    };
    let haystack = indexer::indexed_text(entity).to_lowercase();
    // Substring match, not token match: a deliberate asymmetry with the
    // token-boundary inverted index (see SPEC_FULL.md §9).
    let occurrences = haystack.matches(term).count();
    let tf = 1.0 + ((1 + occurrences) as f64).ln();

    let obs = entity.observations.len() as f64;
    let deg = *degree.get(candidate).unwrap_or(&0) as f64;
    let importance = (obs + 1.0).ln() * (1.0 + (1.0 + deg).ln());

    let recency = match entity.updated_at {
        Some(updated_at) => {
            let age_ms = (now_ms - updated_at) as f64;
            (-age_ms / RECENCY_HALF_LIFE_MS as f64).exp()
        }
        None => 1.0,
    };

    tf * importance * recency
}

/// Per-term entry selection (SPEC_FULL.md §4.6): rank each term's
/// candidates, keep those within `MIN_RELATIVE_SCORE` of the top score,
/// then walk the ranking picking up to `TOP_PER_TOKEN` names not already
/// claimed by an earlier term. Terms are processed in query order, and a
/// name claimed by one term is never reconsidered by a later one.
pub fn select_entries(state: &GraphState, config: &Config, query: &str) -> Vec<String> {
    let terms = indexer::tokenize(query);
    let degree = state.degree_map();
    let now_ms = chrono::Utc::now().timestamp_millis();

    let mut claimed: HashSet<String> = HashSet::new();
    let mut entries = Vec::new();

    for term in terms {
        let candidates = match state.names_matching(&term) {
            Some(names) if !names.is_empty() => names,
            _ => continue,
        };

        let mut scored: Vec<(String, f64)> = candidates
            .iter()
            .map(|name| (name.clone(), score_for_term(state, &degree, now_ms, &term, name)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let best_score = scored[0].1;
        let threshold = best_score * config.search_min_relative_score;

        let mut picked_for_term = 0;
        for (name, score) in &scored {
            if *score < threshold {
                break;
            }
            if picked_for_term >= config.search_top_per_token {
                break;
            }
            if claimed.contains(name) {
                continue;
            }
            claimed.insert(name.clone());
            entries.push(name.clone());
            picked_for_term += 1;
        }
    }

    entries
}

/// A min-heap entry for Dijkstra: lower cost pops first.
struct HeapEntry {
    cost: f64,
    hops: usize,
    node: NodeIndex,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) behaves as a min-heap.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
    }
}

/// Builds the undirected adjacency graph used for routing: one node per
/// entity name, one edge per relation (direction dropped, since relations
/// are traversed in either direction for reachability).
fn build_adjacency(state: &GraphState) -> (UnGraph<String, ()>, HashMap<String, NodeIndex>) {
    let mut graph = UnGraph::new_undirected();
    let mut index_of = HashMap::new();

    for entity in &state.entities {
        let idx = graph.add_node(entity.name.clone());
        index_of.insert(entity.name.clone(), idx);
    }
    for relation in &state.relations {
        // A relation may reference a name with no entity record (no
        // referential check on insert); such an endpoint has no node to
        // route through, so the edge is skipped rather than fabricated.
        if let (Some(&from), Some(&to)) = (index_of.get(&relation.from), index_of.get(&relation.to))
        {
            graph.add_edge(from, to, ());
        }
    }

    (graph, index_of)
}

fn node_entry_cost(degree: &HashMap<&str, usize>, name: &str) -> f64 {
    let deg = *degree.get(name).unwrap_or(&0) as f64;
    1.0 + (1.0 + deg).ln()
}

/// Weighted shortest path (SPEC_FULL.md §4.7): Dijkstra with the
/// centrality-aware edge cost `cost(v) = 1 + ln(1 + deg(v))` charged on
/// entering `v`, subject to a hop cap on the reconstructed path.
pub fn shortest_path(
    graph: &UnGraph<String, ()>,
    index_of: &HashMap<String, NodeIndex>,
    degree: &HashMap<&str, usize>,
    source: &str,
    target: &str,
    max_hops: usize,
) -> Option<Vec<String>> {
    if source == target {
        return Some(vec![source.to_string()]);
    }
    let &src_idx = index_of.get(source)?;
    let &dst_idx = index_of.get(target)?;

    let mut best_cost: HashMap<NodeIndex, f64> = HashMap::new();
    let mut best_hops: HashMap<NodeIndex, usize> = HashMap::new();
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut heap = BinaryHeap::new();

    best_cost.insert(src_idx, 0.0);
    best_hops.insert(src_idx, 0);
    heap.push(HeapEntry {
        cost: 0.0,
        hops: 0,
        node: src_idx,
    });

    while let Some(HeapEntry { cost, hops, node }) = heap.pop() {
        if node == dst_idx {
            break;
        }
        if cost > *best_cost.get(&node).unwrap_or(&f64::INFINITY) {
            continue; // stale heap entry, already improved on
        }
        if hops >= max_hops {
            continue; // no further hop budget to expand from here
        }

        for edge in graph.edges(node) {
            let neighbor = edge.target();
            let neighbor_name = graph[neighbor].as_str();
            let edge_cost = node_entry_cost(degree, neighbor_name);
            let candidate_cost = cost + edge_cost;
            let candidate_hops = hops + 1;

            let improves = match best_cost.get(&neighbor) {
                Some(&known) => candidate_cost < known,
                None => true,
            };
            if improves {
                best_cost.insert(neighbor, candidate_cost);
                best_hops.insert(neighbor, candidate_hops);
                parent.insert(neighbor, node);
                heap.push(HeapEntry {
                    cost: candidate_cost,
                    hops: candidate_hops,
                    node: neighbor,
                });
            }
        }
    }

    if !best_cost.contains_key(&dst_idx) {
        return None;
    }

    let mut path_indices = vec![dst_idx];
    let mut cursor = dst_idx;
    while cursor != src_idx {
        cursor = *parent.get(&cursor)?;
        path_indices.push(cursor);
    }
    path_indices.reverse();

    if path_indices.len() - 1 > max_hops {
        return None;
    }

    Some(
        path_indices
            .into_iter()
            .map(|idx| graph[idx].clone())
            .collect(),
    )
}

/// Pairwise Steiner-tree approximation (SPEC_FULL.md §4.8): the entry set
/// plus every node on a shortest path between any two entries, for every
/// pair reachable within the hop cap.
pub fn connect_entries(state: &GraphState, entries: &[String], max_hops: usize) -> Vec<String> {
    let mut connected = Vec::new();
    let mut seen = HashSet::new();
    for name in entries {
        if seen.insert(name.clone()) {
            connected.push(name.clone());
        }
    }

    if entries.len() <= 1 {
        return connected;
    }

    let degree = state.degree_map();
    let (graph, index_of) = build_adjacency(state);

    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            if let Some(path) = shortest_path(
                &graph,
                &index_of,
                &degree,
                &entries[i],
                &entries[j],
                max_hops,
            ) {
                for node in path {
                    if seen.insert(node.clone()) {
                        connected.push(node);
                    }
                }
            }
        }
    }

    connected
}

/// Final node selection (SPEC_FULL.md §4.9): cap the connected set at
/// `MAX_TOTAL_NODES`, always keeping every entry and truncating only
/// intermediates. If the entry set alone already meets or exceeds the cap,
/// no intermediates are included.
pub fn finalize_selection(entries: &[String], connected: Vec<String>, max_total: usize) -> Vec<String> {
    if connected.len() <= max_total {
        return connected;
    }
    if entries.len() >= max_total {
        return entries.to_vec();
    }

    let entry_set: HashSet<&str> = entries.iter().map(|s| s.as_str()).collect();
    let mut result = entries.to_vec();
    let budget = max_total - entries.len();
    let mut added = 0;

    for node in connected {
        if added >= budget {
            break;
        }
        if entry_set.contains(node.as_str()) {
            continue;
        }
        result.push(node);
        added += 1;
    }

    result
}

/// Builds the result `GraphView` for `search_nodes`: entities named in
/// `node_names` (in that order) and only the relations with BOTH endpoints
/// among them.
pub fn filter_to_closed_subgraph(state: &GraphState, node_names: &[String]) -> GraphView {
    let name_set: HashSet<&str> = node_names.iter().map(|s| s.as_str()).collect();
    let entities = node_names
        .iter()
        .filter_map(|name| state.entity(name).cloned())
        .collect();
    let relations = state
        .relations
        .iter()
        .filter(|r| name_set.contains(r.from.as_str()) && name_set.contains(r.to.as_str()))
        .cloned()
        .collect();
    GraphView { entities, relations }
}

/// Builds the result `GraphView` for `open_nodes` (SPEC_FULL.md §4.10): the
/// entities that exist among `names`, plus every relation with EITHER
/// endpoint in the full provided name set (including names with no entity
/// record, since a relation may dangle).
pub fn open_nodes_view(state: &GraphState, names: &[String]) -> GraphView {
    let name_set: HashSet<&str> = names.iter().map(|s| s.as_str()).collect();
    let entities = names
        .iter()
        .filter_map(|name| state.entity(name).cloned())
        .collect();
    let relations = state
        .relations
        .iter()
        .filter(|r| name_set.contains(r.from.as_str()) || name_set.contains(r.to.as_str()))
        .cloned()
        .collect();
    GraphView { entities, relations }
}

/// Runs the full context-search pipeline: entry selection, Steiner-tree
/// connection, final selection, and relation filtering.
pub fn search(state: &GraphState, config: &Config, query: &str) -> GraphView {
    let entries = select_entries(state, config, query);
    if entries.is_empty() {
        return GraphView::default();
    }

    let connected = connect_entries(state, &entries, config.search_max_path_length);
    let selected = finalize_selection(&entries, connected, config.search_max_total_nodes);
    filter_to_closed_subgraph(state, &selected)
}
