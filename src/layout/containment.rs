use std::collections::{HashMap, HashSet};

use crate::config::LayoutConfig;
use crate::layout::swimlane;
use crate::model::Diagram;

/// Resolved parentage of a shape, computed once per resolve call and
/// matched exhaustively wherever a parent-relative offset is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
    None,
    Lane(String),
    Pool(String),
    SubContainer(String),
}

/// Classify every shape's immediate container. An explicit sub-container
/// reference wins over lane membership, which wins over probing the
/// declared parent id against lanes, pools, and sub-container shapes.
pub fn classify_parents(model: &Diagram) -> HashMap<String, ParentRef> {
    let lane_ids: HashSet<&str> = model.lanes.iter().map(|lane| lane.id.as_str()).collect();
    let pool_ids: HashSet<&str> = model.pools.iter().map(|pool| pool.id.as_str()).collect();
    let container_ids: HashSet<&str> = model
        .shapes
        .values()
        .filter(|shape| shape.kind.is_attachable_host())
        .map(|shape| shape.id.as_str())
        .collect();

    let mut lane_of: HashMap<&str, &str> = HashMap::new();
    for lane in &model.lanes {
        for member in &lane.shapes {
            lane_of.entry(member.as_str()).or_insert(lane.id.as_str());
        }
    }

    let mut parents = HashMap::new();
    for shape in model.shapes.values() {
        let parent = if let Some(container) = shape
            .container
            .as_deref()
            .filter(|id| container_ids.contains(id))
        {
            ParentRef::SubContainer(container.to_string())
        } else if let Some(lane) = lane_of.get(shape.id.as_str()) {
            ParentRef::Lane(lane.to_string())
        } else if let Some(declared) = shape.parent.as_deref() {
            if lane_ids.contains(declared) {
                ParentRef::Lane(declared.to_string())
            } else if pool_ids.contains(declared) {
                ParentRef::Pool(declared.to_string())
            } else if container_ids.contains(declared) {
                ParentRef::SubContainer(declared.to_string())
            } else {
                ParentRef::None
            }
        } else {
            ParentRef::None
        };
        parents.insert(shape.id.clone(), parent);
    }
    parents
}

/// Convert the fully-positioned absolute model into parent-relative form:
/// sub-container children first (while container origins are still
/// absolute), then lane and pool organization, then boundary attachment,
/// then a defensive pass separating coincident siblings.
pub fn resolve_containment(
    model: &mut Diagram,
    parents: &HashMap<String, ParentRef>,
    config: &LayoutConfig,
) {
    convert_container_children(model, parents, config);

    let pool_ids: Vec<String> = model.pools.iter().map(|pool| pool.id.clone()).collect();
    for pool_id in pool_ids {
        let has_lanes = model.lanes.iter().any(|lane| lane.pool == pool_id);
        if has_lanes {
            organize_lanes(model, &pool_id, parents, config);
        } else {
            organize_laneless_pool(model, &pool_id, parents, config);
        }
    }

    position_boundary_shapes(model, config);
    separate_coincident_siblings(model, parents, config);
}

fn convert_container_children(
    model: &mut Diagram,
    parents: &HashMap<String, ParentRef>,
    config: &LayoutConfig,
) {
    // Container origins must be read before any coordinate-space change.
    let mut origins: HashMap<String, (f32, f32, f32, f32)> = HashMap::new();
    for shape in model.shapes.values() {
        if shape.kind.is_attachable_host() {
            origins.insert(shape.id.clone(), shape.bounds());
        }
    }

    for (id, parent) in parents {
        let ParentRef::SubContainer(container_id) = parent else {
            continue;
        };
        let Some(&(cx, cy, cw, ch)) = origins.get(container_id) else {
            continue;
        };
        let Some(shape) = model.shapes.get_mut(id) else {
            continue;
        };
        let (x, y, width, height) = shape.bounds();
        let inner_width = (cw - config.container_padding * 2.0).max(width);
        let inner_height =
            (ch - config.container_header_height - config.container_padding * 2.0).max(height);
        let rel_x = (x - cx).clamp(0.0, inner_width - width);
        let rel_y = (y - cy - config.container_header_height).clamp(0.0, inner_height - height);
        shape.x = Some(rel_x);
        shape.y = Some(rel_y);
    }
}

fn lane_members(
    model: &Diagram,
    lane_id: &str,
    parents: &HashMap<String, ParentRef>,
) -> Vec<String> {
    let lane_parent = ParentRef::Lane(lane_id.to_string());
    let mut members: Vec<String> = Vec::new();
    if let Some(lane) = model.lanes.iter().find(|lane| lane.id == lane_id) {
        for id in &lane.shapes {
            if parents.get(id) == Some(&lane_parent) {
                members.push(id.clone());
            }
        }
    }
    // Shapes classified into the lane without appearing in its member list.
    let mut extras: Vec<String> = model
        .shapes
        .keys()
        .filter(|id| parents.get(*id) == Some(&lane_parent) && !members.contains(id))
        .cloned()
        .collect();
    extras.sort_by_key(|id| model.order_of(id));
    members.extend(extras);
    members
}

fn organize_lanes(
    model: &mut Diagram,
    pool_id: &str,
    parents: &HashMap<String, ParentRef>,
    config: &LayoutConfig,
) {
    let lane_indices: Vec<usize> = model
        .lanes
        .iter()
        .enumerate()
        .filter(|(_, lane)| lane.pool == pool_id)
        .map(|(idx, _)| idx)
        .collect();

    let members_per_lane: Vec<Vec<String>> = lane_indices
        .iter()
        .map(|&idx| lane_members(model, &model.lanes[idx].id.clone(), parents))
        .collect();

    // Lanes in one pool share a common width spanning every member shape.
    let all_members = members_per_lane
        .iter()
        .flatten()
        .filter_map(|id| model.shapes.get(id));
    let pool_extent = swimlane::content_bounds(all_members);
    let (global_min_x, global_max_x) = match pool_extent {
        Some((min_x, _, max_x, _)) => (min_x, max_x),
        None => (0.0, 0.0),
    };
    let lane_width = ((global_max_x - global_min_x) + config.lane_padding * 2.0)
        .max(config.pool_min_width - config.lane_header_width);

    let mut y_cursor = 0.0f32;
    for (slot, &lane_idx) in lane_indices.iter().enumerate() {
        let members = &members_per_lane[slot];

        let mut max_height = 0.0f32;
        let mut min_y = f32::MAX;
        let mut max_y = f32::MIN;
        for id in members {
            let Some(shape) = model.shapes.get(id) else {
                continue;
            };
            max_height = max_height.max(shape.height.unwrap_or(0.0));
            let y = shape.y.unwrap_or(0.0);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        let lane_height =
            (max_height + config.lane_padding * 3.0).max(config.lane_min_height);

        // Members become lane-relative: X translated against the pool-wide
        // minimum, Y remapped into the lane's usable vertical band so the
        // original vertical order survives.
        let usable = (lane_height - config.lane_padding * 2.0 - max_height).max(0.0);
        let spread = max_y - min_y;
        for id in members {
            let Some(shape) = model.shapes.get_mut(id) else {
                continue;
            };
            let (x, y, _, height) = shape.bounds();
            shape.x = Some(x - global_min_x + config.lane_padding);
            if spread > f32::EPSILON {
                shape.y = Some(config.lane_padding + (y - min_y) / spread * usable);
            } else {
                shape.y = Some(((lane_height - height) / 2.0).max(0.0));
            }
        }

        let lane = &mut model.lanes[lane_idx];
        lane.x = Some(config.lane_header_width);
        lane.y = Some(y_cursor);
        lane.width = Some(lane_width);
        lane.height = Some(lane_height);
        y_cursor += lane_height;
    }

    if let Some(pool) = model.pools.iter_mut().find(|pool| pool.id == pool_id) {
        pool.width = Some(lane_width + config.lane_header_width);
        pool.height = Some(y_cursor);
    }
}

fn organize_laneless_pool(
    model: &mut Diagram,
    pool_id: &str,
    parents: &HashMap<String, ParentRef>,
    config: &LayoutConfig,
) {
    let pool_parent = ParentRef::Pool(pool_id.to_string());
    let mut members: Vec<String> = model
        .shapes
        .keys()
        .filter(|id| parents.get(*id) == Some(&pool_parent))
        .cloned()
        .collect();
    members.sort_by_key(|id| model.order_of(id));
    if members.is_empty() {
        return;
    }

    let (width, height) = swimlane::pool_size_from_content(model, &members, config);
    let mut pool_height = height;
    if let Some(pool) = model.pools.iter_mut().find(|pool| pool.id == pool_id) {
        if pool.width.is_none() {
            pool.width = Some(width);
        }
        if pool.height.is_none() {
            pool.height = Some(height);
        }
        pool_height = pool.height.unwrap_or(height);
    }

    let bounds = swimlane::content_bounds(members.iter().filter_map(|id| model.shapes.get(id)));
    let Some((min_x, _, _, _)) = bounds else {
        return;
    };
    for id in &members {
        let Some(shape) = model.shapes.get_mut(id) else {
            continue;
        };
        let (x, _, _, height) = shape.bounds();
        shape.x = Some(x - min_x + config.lane_header_width + config.lane_padding);
        shape.y = Some(((pool_height - height) / 2.0).max(0.0));
    }
}

/// Seat boundary-attached shapes on their host's bottom edge. The host
/// comes from the `attached_to` property when present, otherwise from
/// id-substring matching against attachable shapes. Multiple shapes on one
/// host fan out laterally by the configured spacing.
fn position_boundary_shapes(model: &mut Diagram, config: &LayoutConfig) {
    let mut attached: Vec<String> = model
        .shapes
        .values()
        .filter(|shape| shape.kind.is_attached())
        .map(|shape| shape.id.clone())
        .collect();
    attached.sort_by_key(|id| model.order_of(id));

    let hosts: Vec<String> = model
        .shapes
        .values()
        .filter(|shape| shape.kind.is_attachable_host())
        .map(|shape| shape.id.clone())
        .collect();

    let mut per_host: HashMap<String, usize> = HashMap::new();
    for id in attached {
        let declared = model
            .shapes
            .get(&id)
            .and_then(|shape| shape.properties.get("attached_to"))
            .and_then(|value| value.as_str())
            .map(str::to_string);
        let host_id = declared
            .filter(|host| hosts.iter().any(|candidate| candidate == host))
            .or_else(|| hosts.iter().find(|host| id.contains(host.as_str())).cloned());
        let Some(host_id) = host_id else {
            continue;
        };
        let Some((hx, hy, _, hh)) = model.shapes.get(&host_id).map(|host| host.bounds()) else {
            continue;
        };
        let index = per_host.entry(host_id).or_insert(0);
        let Some(shape) = model.shapes.get_mut(&id) else {
            continue;
        };
        let height = shape.height.unwrap_or(0.0);
        shape.x = Some(hx + *index as f32 * config.boundary_spacing);
        shape.y = Some(hy + hh - height / 2.0);
        *index += 1;
    }
}

/// No two siblings may end on an identical bounding box. Exact coincidence
/// can survive the earlier passes when upstream coordinates collide, so
/// nudge duplicates sideways until unique.
fn separate_coincident_siblings(
    model: &mut Diagram,
    parents: &HashMap<String, ParentRef>,
    config: &LayoutConfig,
) {
    let mut seen: HashSet<(u64, u32, u32, u32, u32)> = HashSet::new();
    let mut parent_slot: HashMap<String, u64> = HashMap::new();
    let mut next_slot = 0u64;
    let ids: Vec<String> = model.shapes.keys().cloned().collect();
    for id in ids {
        let parent_key = match parents.get(&id) {
            Some(ParentRef::Lane(p)) | Some(ParentRef::Pool(p)) | Some(ParentRef::SubContainer(p)) => {
                p.clone()
            }
            _ => String::new(),
        };
        let slot = *parent_slot.entry(parent_key).or_insert_with(|| {
            next_slot += 1;
            next_slot
        });
        let Some(shape) = model.shapes.get_mut(&id) else {
            continue;
        };
        let (mut x, y, width, height) = shape.bounds();
        let mut key = (
            slot,
            x.to_bits(),
            y.to_bits(),
            width.to_bits(),
            height.to_bits(),
        );
        while !seen.insert(key) {
            x += config.overlap_step;
            key = (
                slot,
                x.to_bits(),
                y.to_bits(),
                width.to_bits(),
                height.to_bits(),
            );
        }
        shape.x = Some(x);
    }
}

/// Preserve-mode coordinate-space conversion: no positions are computed,
/// lane origins become pool-relative and member positions lane-relative.
pub fn preserve_mode_conversion(model: &mut Diagram, parents: &HashMap<String, ParentRef>) {
    let pool_origin: HashMap<String, (f32, f32)> = model
        .pools
        .iter()
        .map(|pool| {
            (
                pool.id.clone(),
                (pool.x.unwrap_or(0.0), pool.y.unwrap_or(0.0)),
            )
        })
        .collect();
    let lane_origin: HashMap<String, (f32, f32)> = model
        .lanes
        .iter()
        .map(|lane| {
            (
                lane.id.clone(),
                (lane.x.unwrap_or(0.0), lane.y.unwrap_or(0.0)),
            )
        })
        .collect();

    for lane in &mut model.lanes {
        let Some(&(px, py)) = pool_origin.get(&lane.pool) else {
            continue;
        };
        lane.x = Some(lane.x.unwrap_or(0.0) - px);
        lane.y = Some(lane.y.unwrap_or(0.0) - py);
    }

    let ids: Vec<String> = model.shapes.keys().cloned().collect();
    for id in ids {
        let origin = match parents.get(&id) {
            Some(ParentRef::Lane(lane_id)) => lane_origin.get(lane_id).copied(),
            Some(ParentRef::Pool(pool_id)) => pool_origin.get(pool_id).copied(),
            _ => None,
        };
        let Some((ox, oy)) = origin else {
            continue;
        };
        let Some(shape) = model.shapes.get_mut(&id) else {
            continue;
        };
        shape.x = Some(shape.x.unwrap_or(0.0) - ox);
        shape.y = Some(shape.y.unwrap_or(0.0) - oy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Lane, Pool, Shape, ShapeKind};
    use serde_json::json;

    fn laned_model() -> (Diagram, LayoutConfig) {
        let mut model = Diagram::new();
        model.add_pool(Pool::new("pool"));
        let mut lane = Lane::new("lane1", "pool");
        lane.shapes = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        model.add_lane(lane);
        model.add_lane(Lane::new("lane2", "pool"));
        model.add_shape(Shape::new("a", ShapeKind::Task).at(100.0, 50.0).sized(120.0, 80.0));
        model.add_shape(Shape::new("b", ShapeKind::Task).at(300.0, 150.0).sized(120.0, 80.0));
        model.add_shape(Shape::new("c", ShapeKind::Task).at(500.0, 250.0).sized(120.0, 80.0));
        (model, LayoutConfig::default())
    }

    #[test]
    fn lane_membership_wins_parent_classification() {
        let (model, _) = laned_model();
        let parents = classify_parents(&model);
        assert_eq!(parents["a"], ParentRef::Lane("lane1".to_string()));
    }

    #[test]
    fn empty_lane_gets_minimum_height_and_pool_sums_lanes() {
        let (mut model, config) = laned_model();
        let parents = classify_parents(&model);
        resolve_containment(&mut model, &parents, &config);
        let lane1_height = model.lanes[0].height.unwrap();
        let lane2_height = model.lanes[1].height.unwrap();
        assert_eq!(lane1_height, 80.0 + config.lane_padding * 3.0);
        assert_eq!(lane2_height, config.lane_min_height);
        let pool = &model.pools[0];
        assert_eq!(pool.height.unwrap(), lane1_height + lane2_height);
    }

    #[test]
    fn lanes_share_a_common_width() {
        let (mut model, config) = laned_model();
        let parents = classify_parents(&model);
        resolve_containment(&mut model, &parents, &config);
        assert_eq!(model.lanes[0].width, model.lanes[1].width);
        let expected = (500.0 + 120.0 - 100.0) + config.lane_padding * 2.0;
        assert_eq!(model.lanes[0].width.unwrap(), expected);
    }

    #[test]
    fn lane_members_keep_vertical_order() {
        let (mut model, config) = laned_model();
        let parents = classify_parents(&model);
        resolve_containment(&mut model, &parents, &config);
        let ya = model.shapes["a"].y.unwrap();
        let yb = model.shapes["b"].y.unwrap();
        let yc = model.shapes["c"].y.unwrap();
        assert!(ya <= yb && yb <= yc);
        assert!(ya >= 0.0);
        let lane_height = model.lanes[0].height.unwrap();
        assert!(yc + 80.0 <= lane_height + config.lane_padding);
    }

    #[test]
    fn equal_member_ys_are_centered() {
        let mut model = Diagram::new();
        model.add_pool(Pool::new("pool"));
        let mut lane = Lane::new("lane", "pool");
        lane.shapes = vec!["a".to_string(), "b".to_string()];
        model.add_lane(lane);
        model.add_shape(Shape::new("a", ShapeKind::Task).at(100.0, 80.0).sized(120.0, 80.0));
        model.add_shape(Shape::new("b", ShapeKind::Task).at(300.0, 80.0).sized(120.0, 80.0));
        let config = LayoutConfig::default();
        let parents = classify_parents(&model);
        resolve_containment(&mut model, &parents, &config);
        let lane_height = model.lanes[0].height.unwrap();
        assert_eq!(model.shapes["a"].y.unwrap(), (lane_height - 80.0) / 2.0);
        assert_eq!(model.shapes["a"].y, model.shapes["b"].y);
    }

    #[test]
    fn laneless_pool_members_are_centered_pool_relative() {
        let mut model = Diagram::new();
        model.add_pool(Pool::new("pool"));
        let mut shape = Shape::new("a", ShapeKind::Task).at(400.0, 300.0).sized(120.0, 80.0);
        shape.parent = Some("pool".to_string());
        model.add_shape(shape);
        let config = LayoutConfig::default();
        let parents = classify_parents(&model);
        resolve_containment(&mut model, &parents, &config);
        let shape = &model.shapes["a"];
        assert_eq!(
            shape.x.unwrap(),
            config.lane_header_width + config.lane_padding
        );
        let pool_height = model.pools[0].height.unwrap();
        assert_eq!(shape.y.unwrap(), (pool_height - 80.0) / 2.0);
    }

    #[test]
    fn container_children_are_clamped_inside() {
        let mut model = Diagram::new();
        model.add_shape(
            Shape::new("wrapper", ShapeKind::SubContainer)
                .at(100.0, 100.0)
                .sized(300.0, 200.0),
        );
        let mut child = Shape::new("inner", ShapeKind::Task).at(900.0, 900.0).sized(120.0, 80.0);
        child.container = Some("wrapper".to_string());
        model.add_shape(child);
        let config = LayoutConfig::default();
        let parents = classify_parents(&model);
        resolve_containment(&mut model, &parents, &config);
        let child = &model.shapes["inner"];
        let (x, y) = (child.x.unwrap(), child.y.unwrap());
        assert!(x >= 0.0 && x + 120.0 <= 300.0);
        assert!(y >= 0.0 && y + 80.0 <= 200.0);
    }

    #[test]
    fn boundary_shapes_fan_out_on_one_host() {
        let mut model = Diagram::new();
        model.add_shape(Shape::new("work", ShapeKind::Task).at(200.0, 200.0).sized(120.0, 80.0));
        let mut first = Shape::new("alarm1", ShapeKind::BoundaryEvent).sized(36.0, 36.0);
        first
            .properties
            .insert("attached_to".to_string(), json!("work"));
        model.add_shape(first);
        let mut second = Shape::new("alarm2", ShapeKind::BoundaryEvent).sized(36.0, 36.0);
        second
            .properties
            .insert("attached_to".to_string(), json!("work"));
        model.add_shape(second);
        let config = LayoutConfig::default();
        let parents = classify_parents(&model);
        resolve_containment(&mut model, &parents, &config);
        let x1 = model.shapes["alarm1"].x.unwrap();
        let x2 = model.shapes["alarm2"].x.unwrap();
        assert_ne!(x1, x2);
        assert_eq!((x1 - x2).abs(), config.boundary_spacing);
        assert_eq!(model.shapes["alarm1"].y.unwrap(), 200.0 + 80.0 - 18.0);
    }

    #[test]
    fn boundary_host_falls_back_to_id_substring() {
        let mut model = Diagram::new();
        model.add_shape(Shape::new("approve", ShapeKind::Task).at(50.0, 50.0).sized(120.0, 80.0));
        model.add_shape(Shape::new("approve_timeout", ShapeKind::BoundaryEvent).sized(36.0, 36.0));
        let config = LayoutConfig::default();
        let parents = classify_parents(&model);
        resolve_containment(&mut model, &parents, &config);
        let boundary = &model.shapes["approve_timeout"];
        assert_eq!(boundary.x.unwrap(), 50.0);
        assert_eq!(boundary.y.unwrap(), 50.0 + 80.0 - 18.0);
    }

    #[test]
    fn coincident_siblings_are_separated() {
        let mut model = Diagram::new();
        model.add_pool(Pool::new("pool"));
        let mut lane = Lane::new("lane", "pool");
        lane.shapes = vec!["a".to_string(), "b".to_string()];
        model.add_lane(lane);
        model.add_shape(Shape::new("a", ShapeKind::Task).at(100.0, 100.0).sized(120.0, 80.0));
        model.add_shape(Shape::new("b", ShapeKind::Task).at(100.0, 100.0).sized(120.0, 80.0));
        let config = LayoutConfig::default();
        let parents = classify_parents(&model);
        resolve_containment(&mut model, &parents, &config);
        let a = model.shapes["a"].bounds();
        let b = model.shapes["b"].bounds();
        assert_ne!(a, b);
    }

    #[test]
    fn preserve_conversion_subtracts_origins_only() {
        let mut model = Diagram::new();
        let mut pool = Pool::new("pool");
        pool.x = Some(100.0);
        pool.y = Some(40.0);
        pool.width = Some(800.0);
        pool.height = Some(300.0);
        model.add_pool(pool);
        let mut lane = Lane::new("lane", "pool");
        lane.x = Some(130.0);
        lane.y = Some(40.0);
        lane.width = Some(770.0);
        lane.height = Some(300.0);
        lane.shapes = vec!["a".to_string()];
        model.add_lane(lane);
        model.add_shape(Shape::new("a", ShapeKind::Task).at(250.0, 150.0).sized(120.0, 80.0));
        let parents = classify_parents(&model);
        preserve_mode_conversion(&mut model, &parents);
        assert_eq!(model.lanes[0].x, Some(30.0));
        assert_eq!(model.lanes[0].y, Some(0.0));
        assert_eq!(model.shapes["a"].x, Some(120.0));
        assert_eq!(model.shapes["a"].y, Some(110.0));
    }
}
