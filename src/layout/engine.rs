use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};

use dagre_rust::{
    GraphConfig as DagreConfig, GraphEdge as DagreEdge, GraphNode as DagreNode,
    layout as dagre_layout,
};
use graphlib_rust::{Graph as DagreGraph, GraphOption};
use log::debug;
use thiserror::Error;

use crate::config::{Direction, LayoutConfig};
use crate::layout::graph::FlowGraph;
use crate::layout::normalize::RawLayout;
use crate::model::Diagram;

/// Failure classes of the external layout tool. None of these ever reach
/// the caller of `resolve()`; the orchestrator substitutes the fallback
/// layout and logs the substitution.
#[derive(Debug, Error)]
pub enum ExternalLayoutError {
    #[error("external layout tool failed: {0}")]
    Failed(String),
    #[error("external layout tool produced no positions")]
    NoOutput,
}

fn rankdir(direction: Direction) -> &'static str {
    match direction {
        Direction::TopDown => "tb",
        Direction::BottomTop => "bt",
        Direction::LeftRight => "lr",
        Direction::RightLeft => "rl",
    }
}

/// Run the external hierarchical layout tool over the given shapes and
/// return its raw, unnormalized positions.
///
/// Node sizes are converted into the tool's units, the flow direction is
/// mapped onto its rank-direction convention, and the configured node and
/// rank separation constants are passed through. Shapes the tool leaves
/// unpositioned get a deterministic continuation placement past the tool's
/// own bounding box.
pub fn external_layout(
    model: &Diagram,
    graph: &FlowGraph,
    layout_ids: &[String],
    direction: Direction,
    config: &LayoutConfig,
) -> Result<RawLayout, ExternalLayoutError> {
    if layout_ids.is_empty() {
        return Err(ExternalLayoutError::NoOutput);
    }

    let scaled_units = config.external_scale_x != 1.0 || config.external_scale_y != 1.0;
    let (unit_x, unit_y) = if scaled_units {
        (config.external_scale_x, config.external_scale_y)
    } else {
        (1.0, 1.0)
    };

    let mut dagre_graph: DagreGraph<DagreConfig, DagreNode, DagreEdge> =
        DagreGraph::new(Some(GraphOption {
            directed: Some(true),
            multigraph: Some(false),
            compound: Some(false),
        }));

    let mut graph_config = DagreConfig::default();
    graph_config.rankdir = Some(rankdir(direction).to_string());
    graph_config.nodesep = Some(config.node_spacing / unit_x);
    graph_config.ranksep = Some(config.rank_spacing / unit_y);
    graph_config.marginx = Some(8.0);
    graph_config.marginy = Some(8.0);
    dagre_graph.set_graph(graph_config);

    for id in layout_ids {
        let Some(shape) = model.shapes.get(id) else {
            continue;
        };
        let mut node = DagreNode::default();
        node.width = shape.width.unwrap_or(config.defaults.fallback_width) / unit_x;
        node.height = shape.height.unwrap_or(config.defaults.fallback_height) / unit_y;
        if let Some(order) = model.shape_order.get(id) {
            node.order = Some(*order);
        }
        dagre_graph.set_node(id.clone(), Some(node));
    }

    let layout_set: HashSet<&String> = layout_ids.iter().collect();
    let mut edge_set: HashSet<(String, String)> = HashSet::new();
    for (from, to) in &graph.edges {
        if !layout_set.contains(from) || !layout_set.contains(to) {
            continue;
        }
        if !edge_set.insert((from.clone(), to.clone())) {
            continue;
        }
        let edge_label = DagreEdge::default();
        let _ = dagre_graph.set_edge(from, to, Some(edge_label), None);
    }

    // The port panics on some degenerate graphs; treat that as one more
    // failure class of the tool, not of this crate.
    let run = catch_unwind(AssertUnwindSafe(|| {
        dagre_layout::run_layout(&mut dagre_graph);
    }));
    if let Err(payload) = run {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic".to_string());
        return Err(ExternalLayoutError::Failed(message));
    }

    let mut positions: HashMap<String, (f32, f32)> = HashMap::new();
    let mut missing: Vec<&String> = Vec::new();
    for id in layout_ids {
        let Some(shape) = model.shapes.get(id) else {
            continue;
        };
        match dagre_graph.node(id) {
            Some(node) => {
                // Tool positions are center-anchored.
                let width = shape.width.unwrap_or(config.defaults.fallback_width) / unit_x;
                let height = shape.height.unwrap_or(config.defaults.fallback_height) / unit_y;
                positions.insert(id.clone(), (node.x - width / 2.0, node.y - height / 2.0));
            }
            None => missing.push(id),
        }
    }

    if positions.is_empty() {
        return Err(ExternalLayoutError::NoOutput);
    }

    if !missing.is_empty() {
        debug!(
            "external layout left {} shape(s) unpositioned, continuing past its bounding box",
            missing.len()
        );
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        for &(x, y) in positions.values() {
            max_x = max_x.max(x);
            max_y = max_y.max(y);
            min_x = min_x.min(x);
            min_y = min_y.min(y);
        }
        let mut cursor = 0.0f32;
        for id in missing {
            let Some(shape) = model.shapes.get(id) else {
                continue;
            };
            let width = shape.width.unwrap_or(config.defaults.fallback_width) / unit_x;
            let height = shape.height.unwrap_or(config.defaults.fallback_height) / unit_y;
            if direction.is_horizontal() {
                positions.insert(
                    id.clone(),
                    (max_x + config.rank_spacing / unit_x, min_y + cursor),
                );
                cursor += height + config.node_spacing / unit_y;
            } else {
                positions.insert(
                    id.clone(),
                    (min_x + cursor, max_y + config.rank_spacing / unit_y),
                );
                cursor += width + config.node_spacing / unit_x;
            }
        }
    }

    Ok(RawLayout {
        positions,
        y_axis_up: false,
        scaled_units,
    })
}
