pub mod containment;
pub mod engine;
pub mod flow;
pub mod graph;
pub mod normalize;
pub mod swimlane;

use log::debug;

use crate::config::{LayoutConfig, LayoutMode, LayoutOptions};
use crate::model::{Diagram, Lane};

/// Resolve a complete, non-overlapping, container-relative position for
/// every shape in the model.
///
/// The caller's model is never touched: resolution clones on entry and all
/// mutation happens on the working copy, so repeated calls over the same
/// input are side-effect-free and deterministic. No failure of the external
/// layout tool, no malformed connector, and no cyclic flow ever surfaces as
/// an error; each has a fallback that keeps the result well-formed.
pub fn resolve(model: &Diagram, options: &LayoutOptions, config: &LayoutConfig) -> Diagram {
    let mut work = model.clone();

    resolve_pool_positions(&mut work, config);
    apply_default_dimensions(&mut work);

    let parents = containment::classify_parents(&work);

    // Preserve mode with a fully-positioned lane set skips computed layout
    // entirely: only the coordinate spaces change.
    if options.mode == LayoutMode::Preserve
        && !work.lanes.is_empty()
        && work.lanes.iter().all(Lane::has_position)
    {
        place_final_fallback(&mut work, config);
        // Lane rectangles may still lack sizes; share the pool height
        // across the lanes that declare none.
        let pool_ids: Vec<String> = work.pools.iter().map(|pool| pool.id.clone()).collect();
        for pool_id in &pool_ids {
            swimlane::distribute_lane_heights(&mut work, pool_id, config);
        }
        containment::preserve_mode_conversion(&mut work, &parents);
        return work;
    }

    let flow_graph = graph::build_flow_graph(&work);

    if work.has_explicit_positions {
        place_by_neighbors(&mut work, &flow_graph, config);
    } else {
        place_whole_model(&mut work, &flow_graph, options, config);
    }

    place_disconnected(&mut work, &flow_graph, config);
    place_final_fallback(&mut work, config);

    containment::resolve_containment(&mut work, &parents, config);

    work
}

/// Pools carrying a position keep it; the rest stack vertically beneath
/// the lowest positioned pool, or from the top margin when none is.
fn resolve_pool_positions(model: &mut Diagram, config: &LayoutConfig) {
    let mut bottom = model
        .pools
        .iter()
        .filter(|pool| pool.has_position())
        .map(|pool| pool.y.unwrap_or(0.0) + pool.height.unwrap_or(config.pool_min_height))
        .fold(f32::NEG_INFINITY, f32::max);
    if bottom == f32::NEG_INFINITY {
        bottom = config.margin_y - config.pool_spacing;
    }

    for pool in &mut model.pools {
        if pool.has_position() {
            continue;
        }
        let height = pool.height.unwrap_or(config.pool_min_height);
        pool.x = Some(config.margin_x);
        pool.y = Some(bottom + config.pool_spacing);
        if pool.width.is_none() {
            pool.width = Some(config.pool_min_width);
        }
        if pool.height.is_none() {
            pool.height = Some(height);
        }
        bottom += config.pool_spacing + height;
    }
}

fn apply_default_dimensions(model: &mut Diagram) {
    for shape in model.shapes.values_mut() {
        let (width, height) = shape.kind.default_size();
        if shape.width.is_none() {
            shape.width = Some(width);
        }
        if shape.height.is_none() {
            shape.height = Some(height);
        }
    }
}

/// Nothing in the model carries a position: lay the full shape set out in
/// one pass, external tool first, rank-based fallback on any failure.
fn place_whole_model(
    model: &mut Diagram,
    flow_graph: &graph::FlowGraph,
    options: &LayoutOptions,
    config: &LayoutConfig,
) {
    let mut ids: Vec<String> = model
        .shapes
        .values()
        .filter(|shape| !shape.has_position() && flow_graph.is_connected(&shape.id))
        .map(|shape| shape.id.clone())
        .collect();
    if ids.is_empty() {
        // No flow edges anywhere: hand the whole set to the fallback, which
        // degrades to its row-wrapping grid.
        ids = model
            .shapes
            .values()
            .filter(|shape| !shape.has_position())
            .map(|shape| shape.id.clone())
            .collect();
    }
    ids.sort_by_key(|id| model.order_of(id));
    if ids.is_empty() {
        return;
    }

    let ranks = graph::assign_ranks(flow_graph);
    let mut raw = match options.mode {
        LayoutMode::UseExternalTool => {
            match engine::external_layout(model, flow_graph, &ids, options.direction, config) {
                Ok(raw) => raw,
                Err(err) => {
                    debug!("external layout substituted with fallback: {err}");
                    flow::fallback_flow_layout(
                        model,
                        &ids,
                        &ranks,
                        flow_graph,
                        options.direction,
                        config,
                    )
                }
            }
        }
        LayoutMode::Preserve => {
            flow::fallback_flow_layout(model, &ids, &ranks, flow_graph, options.direction, config)
        }
    };
    normalize::normalize_positions(&mut raw, config);

    for (id, (x, y)) in raw.positions {
        let Some(shape) = model.shapes.get_mut(&id) else {
            continue;
        };
        if shape.x.is_none() {
            shape.x = Some(x);
        }
        if shape.y.is_none() {
            shape.y = Some(y);
        }
    }
}

/// Incremental placement for models that mix explicit and missing
/// positions: every unpositioned flow-connected shape is seated next to a
/// positioned neighbor, and each placement may unlock further neighbors,
/// so the scan repeats until a full pass places nothing.
fn place_by_neighbors(model: &mut Diagram, flow_graph: &graph::FlowGraph, config: &LayoutConfig) {
    let passes = model.shapes.len() * 2;
    for _ in 0..passes {
        let mut placed_any = false;
        let ids: Vec<String> = model.shapes.keys().cloned().collect();
        for id in &ids {
            let Some(shape) = model.shapes.get(id) else {
                continue;
            };
            if shape.has_position() || !flow_graph.is_connected(id) {
                continue;
            }
            let width = shape.width.unwrap_or(config.defaults.fallback_width);
            let height = shape.height.unwrap_or(config.defaults.fallback_height);

            let after_neighbor = flow_graph.predecessors(id).iter().find_map(|pred| {
                model
                    .shapes
                    .get(pred)
                    .filter(|s| s.has_position())
                    .map(|s| s.bounds())
            });
            let before_neighbor = || {
                flow_graph.successors(id).iter().find_map(|succ| {
                    model
                        .shapes
                        .get(succ)
                        .filter(|s| s.has_position())
                        .map(|s| s.bounds())
                })
            };

            let candidate = if let Some((nx, ny, nw, nh)) = after_neighbor {
                let mut x = nx + nw + config.node_spacing;
                let mut y = ny;
                if x + width > config.wrap_width {
                    x = config.margin_x;
                    y = ny + nh + config.node_spacing;
                }
                Some((x, y))
            } else if let Some((nx, ny, _, _)) = before_neighbor() {
                let mut x = nx - config.node_spacing - width;
                let mut y = ny;
                if x < config.margin_x {
                    x = nx;
                    y = (ny - height - config.node_spacing).max(config.margin_y);
                }
                Some((x, y))
            } else {
                None
            };
            let Some((x, y)) = candidate else {
                continue;
            };

            let (x, y) = avoid_overlap(model, id, x, y, width, height, config);
            let Some(shape) = model.shapes.get_mut(id) else {
                continue;
            };
            shape.x = Some(x);
            shape.y = Some(y);
            placed_any = true;
        }
        if !placed_any {
            break;
        }
    }
}

/// Best-effort collision avoidance: step down on every intersection with a
/// placed shape, move one column right when the vertical budget is spent,
/// and accept the last candidate when the attempt budget runs out.
fn avoid_overlap(
    model: &Diagram,
    id: &str,
    start_x: f32,
    start_y: f32,
    width: f32,
    height: f32,
    config: &LayoutConfig,
) -> (f32, f32) {
    let mut x = start_x;
    let mut y = start_y;
    let mut rows = 0usize;
    for _ in 0..config.overlap_max_attempts {
        if !collides(model, id, x, y, width, height) {
            return (x, y);
        }
        rows += 1;
        if rows >= config.overlap_rows {
            rows = 0;
            x += width + config.node_spacing;
            y = start_y;
        } else {
            y += config.overlap_step;
        }
    }
    (x, y)
}

fn collides(model: &Diagram, id: &str, x: f32, y: f32, width: f32, height: f32) -> bool {
    for other in model.shapes.values() {
        if other.id == id || !other.has_position() {
            continue;
        }
        let (ox, oy, ow, oh) = other.bounds();
        if x < ox + ow && x + width > ox && y < oy + oh && y + height > oy {
            return true;
        }
    }
    false
}

fn positioned_bounds(model: &Diagram) -> Option<(f32, f32, f32, f32)> {
    swimlane::content_bounds(model.shapes.values().filter(|shape| shape.has_position()))
}

/// Shapes with no flow edges at all: data-like shapes stack in a sidebar
/// left of the main bounding box, everything else wraps into a row beneath
/// the diagram.
fn place_disconnected(model: &mut Diagram, flow_graph: &graph::FlowGraph, config: &LayoutConfig) {
    let bounds = positioned_bounds(model);
    let (min_x, min_y, _, max_y) = bounds.unwrap_or((
        config.margin_x,
        config.margin_y,
        config.margin_x,
        config.margin_y,
    ));

    let mut pending: Vec<String> = model
        .shapes
        .values()
        .filter(|shape| !shape.has_position() && !flow_graph.is_connected(&shape.id))
        .map(|shape| shape.id.clone())
        .collect();
    pending.sort_by_key(|id| model.order_of(id));

    let mut sidebar_cursor = min_y;
    let mut row: Vec<String> = Vec::new();
    for id in pending {
        let Some(shape) = model.shapes.get(&id) else {
            continue;
        };
        if shape.kind.is_data() {
            let width = shape.width.unwrap_or(config.defaults.fallback_width);
            let height = shape.height.unwrap_or(config.defaults.fallback_height);
            let Some(shape) = model.shapes.get_mut(&id) else {
                continue;
            };
            shape.x = Some(min_x - config.node_spacing - width);
            shape.y = Some(sidebar_cursor);
            sidebar_cursor += height + config.node_spacing;
        } else {
            row.push(id);
        }
    }

    if !row.is_empty() {
        let refs: Vec<&String> = row.iter().collect();
        let grid = flow::grid_positions(
            model,
            &refs,
            (config.margin_x, max_y + config.rank_spacing),
            config,
        );
        for (id, (x, y)) in grid {
            let Some(shape) = model.shapes.get_mut(&id) else {
                continue;
            };
            shape.x = Some(x);
            shape.y = Some(y);
        }
    }
}

/// Defensive last stop: anything still unpositioned wraps into a grid
/// beneath the current diagram bounds.
fn place_final_fallback(model: &mut Diagram, config: &LayoutConfig) {
    let mut pending: Vec<String> = model
        .shapes
        .values()
        .filter(|shape| !shape.has_position())
        .map(|shape| shape.id.clone())
        .collect();
    if pending.is_empty() {
        return;
    }
    pending.sort_by_key(|id| model.order_of(id));

    let below = positioned_bounds(model)
        .map(|(_, _, _, max_y)| max_y + config.rank_spacing)
        .unwrap_or(config.margin_y);
    let refs: Vec<&String> = pending.iter().collect();
    let grid = flow::grid_positions(model, &refs, (config.margin_x, below), config);
    for (id, (x, y)) in grid {
        let Some(shape) = model.shapes.get_mut(&id) else {
            continue;
        };
        if shape.x.is_none() {
            shape.x = Some(x);
        }
        if shape.y.is_none() {
            shape.y = Some(y);
        }
    }
}
