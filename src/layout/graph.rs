use std::collections::{HashMap, VecDeque};

use log::warn;

use crate::model::Diagram;

/// Directed graph over shape ids, rebuilt from the connector list for every
/// resolve call and dropped afterwards.
#[derive(Debug, Default)]
pub struct FlowGraph {
    pub nodes: Vec<String>,
    pub edges: Vec<(String, String)>,
    pub outgoing: HashMap<String, Vec<String>>,
    pub incoming: HashMap<String, Vec<String>>,
}

impl FlowGraph {
    pub fn is_connected(&self, id: &str) -> bool {
        self.outgoing.contains_key(id) || self.incoming.contains_key(id)
    }

    pub fn predecessors(&self, id: &str) -> &[String] {
        self.incoming.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn successors(&self, id: &str) -> &[String] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Build the flow graph: one node per shape, one edge per flow connector
/// whose both endpoints exist. Connectors pointing at unknown shapes are
/// skipped, never fatal.
pub fn build_flow_graph(model: &Diagram) -> FlowGraph {
    let mut graph = FlowGraph {
        nodes: model.shapes.keys().cloned().collect(),
        ..FlowGraph::default()
    };

    for connector in &model.connectors {
        if !connector.kind.is_flow() {
            continue;
        }
        if !model.shapes.contains_key(&connector.source)
            || !model.shapes.contains_key(&connector.target)
        {
            warn!(
                "dropping connector {}: endpoint {} or {} not in model",
                connector.id, connector.source, connector.target
            );
            continue;
        }
        graph
            .outgoing
            .entry(connector.source.clone())
            .or_default()
            .push(connector.target.clone());
        graph
            .incoming
            .entry(connector.target.clone())
            .or_default()
            .push(connector.source.clone());
        graph
            .edges
            .push((connector.source.clone(), connector.target.clone()));
    }

    graph
}

/// Assign each node its longest-path-from-a-source rank.
///
/// Bounded fixpoint over a mutable rank map driven by a FIFO queue of
/// (node, candidate rank) pairs. Candidate ranks are capped at
/// `node_count - 1` so cycles cannot grow them without bound, and the whole
/// propagation stops after `node_count²` iterations. Hitting the cap is not
/// fatal: the best ranks found so far are still a usable layering.
pub fn assign_ranks(graph: &FlowGraph) -> HashMap<String, usize> {
    let node_count = graph.nodes.len();
    let mut ranks: HashMap<String, usize> = HashMap::new();
    if node_count == 0 {
        return ranks;
    }
    let rank_cap = node_count.saturating_sub(1);
    let iteration_cap = node_count * node_count;

    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    for id in &graph.nodes {
        if !graph.is_connected(id) {
            continue;
        }
        if graph.predecessors(id).is_empty() {
            queue.push_back((id.clone(), 0));
        }
    }
    if queue.is_empty() {
        // Fully cyclic graph: every connected node is a candidate source.
        for id in &graph.nodes {
            if graph.is_connected(id) {
                queue.push_back((id.clone(), 0));
            }
        }
    }

    let mut iterations = 0usize;
    while let Some((id, candidate)) = queue.pop_front() {
        iterations += 1;
        if iterations > iteration_cap {
            warn!(
                "rank propagation stopped after {} iterations, graph is heavily cyclic",
                iteration_cap
            );
            break;
        }
        let improved = match ranks.get(&id) {
            Some(current) => candidate > *current,
            None => true,
        };
        if !improved {
            continue;
        }
        ranks.insert(id.clone(), candidate);
        let next = (candidate + 1).min(rank_cap);
        for succ in graph.successors(&id) {
            queue.push_back((succ.clone(), next));
        }
    }

    // Anything untouched by propagation sits at rank 0.
    for id in &graph.nodes {
        ranks.entry(id.clone()).or_insert(0);
    }

    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Connector, ConnectorKind, Shape, ShapeKind};

    fn chain_model(ids: &[&str]) -> Diagram {
        let mut model = Diagram::new();
        for id in ids {
            model.add_shape(Shape::new(id, ShapeKind::Task));
        }
        for pair in ids.windows(2) {
            model.add_connector(Connector::new(
                &format!("{}_{}", pair[0], pair[1]),
                ConnectorKind::SequenceFlow,
                pair[0],
                pair[1],
            ));
        }
        model
    }

    #[test]
    fn connectors_with_unknown_endpoints_are_dropped() {
        let mut model = chain_model(&["a", "b"]);
        model.add_connector(Connector::new(
            "bad",
            ConnectorKind::SequenceFlow,
            "a",
            "missing",
        ));
        let graph = build_flow_graph(&model);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.successors("a"), ["b".to_string()]);
    }

    #[test]
    fn associations_do_not_become_edges() {
        let mut model = chain_model(&["a", "b"]);
        model.add_shape(Shape::new("note", ShapeKind::TextAnnotation));
        model.add_connector(Connector::new(
            "assoc",
            ConnectorKind::Association,
            "a",
            "note",
        ));
        let graph = build_flow_graph(&model);
        assert_eq!(graph.edges.len(), 1);
        assert!(!graph.is_connected("note"));
    }

    #[test]
    fn sources_get_rank_zero() {
        let model = chain_model(&["start", "mid", "end"]);
        let graph = build_flow_graph(&model);
        let ranks = assign_ranks(&graph);
        assert_eq!(ranks["start"], 0);
        assert_eq!(ranks["mid"], 1);
        assert_eq!(ranks["end"], 2);
    }

    #[test]
    fn rejoin_rank_is_max_branch_rank_plus_one() {
        let mut model = Diagram::new();
        for id in ["split", "short", "long_a", "long_b", "join"] {
            model.add_shape(Shape::new(id, ShapeKind::Task));
        }
        for (id, from, to) in [
            ("e1", "split", "short"),
            ("e2", "split", "long_a"),
            ("e3", "long_a", "long_b"),
            ("e4", "short", "join"),
            ("e5", "long_b", "join"),
        ] {
            model.add_connector(Connector::new(id, ConnectorKind::SequenceFlow, from, to));
        }
        let graph = build_flow_graph(&model);
        let ranks = assign_ranks(&graph);
        assert_eq!(ranks["join"], ranks["long_b"].max(ranks["short"]) + 1);
    }

    #[test]
    fn cyclic_graph_still_yields_ranks() {
        let mut model = chain_model(&["a", "b", "c"]);
        model.add_connector(Connector::new("back", ConnectorKind::SequenceFlow, "c", "a"));
        let graph = build_flow_graph(&model);
        let ranks = assign_ranks(&graph);
        assert_eq!(ranks.len(), 3);
        for rank in ranks.values() {
            assert!(*rank <= 2);
        }
    }

    #[test]
    fn disconnected_nodes_default_to_rank_zero() {
        let mut model = chain_model(&["a", "b"]);
        model.add_shape(Shape::new("island", ShapeKind::DataObject));
        let graph = build_flow_graph(&model);
        let ranks = assign_ranks(&graph);
        assert_eq!(ranks["island"], 0);
    }
}
