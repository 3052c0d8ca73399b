use std::collections::HashMap;

use crate::config::{Direction, LayoutConfig};
use crate::layout::graph::FlowGraph;
use crate::layout::normalize::RawLayout;
use crate::model::Diagram;

fn shape_size(model: &Diagram, id: &str, config: &LayoutConfig) -> (f32, f32) {
    match model.shapes.get(id) {
        Some(shape) => (
            shape.width.unwrap_or(config.defaults.fallback_width),
            shape.height.unwrap_or(config.defaults.fallback_height),
        ),
        None => (config.defaults.fallback_width, config.defaults.fallback_height),
    }
}

/// Pure in-process layout used when the external tool is unavailable or
/// fails. Ranked shapes are grouped into rank buckets and stacked along the
/// flow direction; shapes without flow edges drop into a row-wrapping grid
/// beneath the ranked area.
pub fn fallback_flow_layout(
    model: &Diagram,
    layout_ids: &[String],
    ranks: &HashMap<String, usize>,
    graph: &FlowGraph,
    direction: Direction,
    config: &LayoutConfig,
) -> RawLayout {
    let mut positions: HashMap<String, (f32, f32)> = HashMap::new();

    let mut ranked: Vec<&String> = layout_ids
        .iter()
        .filter(|id| graph.is_connected(id))
        .collect();
    ranked.sort_by_key(|id| {
        (
            ranks.get(id.as_str()).copied().unwrap_or(0),
            model.order_of(id),
        )
    });

    let max_rank = ranked
        .iter()
        .map(|id| ranks.get(id.as_str()).copied().unwrap_or(0))
        .max()
        .unwrap_or(0);
    let mut buckets: Vec<Vec<&String>> = vec![Vec::new(); max_rank + 1];
    for &id in &ranked {
        let rank = ranks.get(id.as_str()).copied().unwrap_or(0);
        buckets[rank].push(id);
    }

    let bucket_walk: Vec<usize> = if direction.is_reversed() {
        (0..buckets.len()).rev().collect()
    } else {
        (0..buckets.len()).collect()
    };

    let mut primary_cursor = if direction.is_horizontal() {
        config.margin_x
    } else {
        config.margin_y
    };
    for bucket_idx in bucket_walk {
        let bucket = &buckets[bucket_idx];
        if bucket.is_empty() {
            continue;
        }
        let mut secondary_cursor = if direction.is_horizontal() {
            config.margin_y
        } else {
            config.margin_x
        };
        let mut max_extent: f32 = 0.0;
        for id in bucket {
            let (width, height) = shape_size(model, id, config);
            if direction.is_horizontal() {
                positions.insert((*id).clone(), (primary_cursor, secondary_cursor));
                secondary_cursor += height + config.node_spacing;
                max_extent = max_extent.max(width);
            } else {
                positions.insert((*id).clone(), (secondary_cursor, primary_cursor));
                secondary_cursor += width + config.node_spacing;
                max_extent = max_extent.max(height);
            }
        }
        primary_cursor += max_extent + config.rank_spacing;
    }

    // Whatever never made it into the graph wraps into a grid below the
    // ranked area.
    let mut leftover: Vec<&String> = layout_ids
        .iter()
        .filter(|id| !graph.is_connected(id))
        .collect();
    leftover.sort_by_key(|id| model.order_of(id));
    if !leftover.is_empty() {
        let below = positions
            .iter()
            .map(|(id, &(_, y))| y + shape_size(model, id, config).1)
            .fold(config.margin_y, f32::max);
        let grid = grid_positions(
            model,
            &leftover,
            (config.margin_x, below + config.rank_spacing),
            config,
        );
        positions.extend(grid);
    }

    RawLayout {
        positions,
        y_axis_up: false,
        scaled_units: false,
    }
}

/// Deterministic row-wrapping placement: fixed column count, each row as
/// tall as its tallest member.
pub fn grid_positions(
    model: &Diagram,
    ids: &[&String],
    origin: (f32, f32),
    config: &LayoutConfig,
) -> HashMap<String, (f32, f32)> {
    let mut positions = HashMap::new();
    let columns = config.grid_columns.max(1);
    let mut x = origin.0;
    let mut y = origin.1;
    let mut row_height: f32 = 0.0;
    for (idx, id) in ids.iter().enumerate() {
        let (width, height) = shape_size(model, id, config);
        if idx > 0 && idx % columns == 0 {
            x = origin.0;
            y += row_height + config.node_spacing;
            row_height = 0.0;
        }
        positions.insert((*id).clone(), (x, y));
        x += width + config.node_spacing;
        row_height = row_height.max(height);
    }
    positions
}
