use crate::config::LayoutConfig;
use crate::model::{Diagram, Shape};

/// Bounding box over a set of shapes, `None` when the set is empty or none
/// of the members carries a position yet.
pub fn content_bounds<'a, I>(shapes: I) -> Option<(f32, f32, f32, f32)>
where
    I: IntoIterator<Item = &'a Shape>,
{
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    let mut any = false;
    for shape in shapes {
        let (Some(x), Some(y)) = (shape.x, shape.y) else {
            continue;
        };
        let (width, height) = (shape.width.unwrap_or(0.0), shape.height.unwrap_or(0.0));
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x + width);
        max_y = max_y.max(y + height);
        any = true;
    }
    any.then_some((min_x, min_y, max_x, max_y))
}

/// Pool rectangle derived from its content: bounding box plus padding and
/// the header band, floored at the configured minimums.
pub fn pool_size_from_content(
    model: &Diagram,
    member_ids: &[String],
    config: &LayoutConfig,
) -> (f32, f32) {
    let members = member_ids.iter().filter_map(|id| model.shapes.get(id));
    let Some((min_x, min_y, max_x, max_y)) = content_bounds(members) else {
        return (config.pool_min_width, config.pool_min_height);
    };
    let width = (max_x - min_x) + config.lane_padding * 2.0 + config.lane_header_width;
    let height = (max_y - min_y) + config.lane_padding * 2.0;
    (
        width.max(config.pool_min_width),
        height.max(config.pool_min_height),
    )
}

/// Distribute a pool's height evenly across the lanes that do not declare
/// explicit dimensions. Lanes with their own height keep it.
pub fn distribute_lane_heights(model: &mut Diagram, pool_id: &str, config: &LayoutConfig) {
    let pool_height = model
        .pools
        .iter()
        .find(|pool| pool.id == pool_id)
        .and_then(|pool| pool.height)
        .unwrap_or(config.pool_min_height);

    let lane_indices: Vec<usize> = model
        .lanes
        .iter()
        .enumerate()
        .filter(|(_, lane)| lane.pool == pool_id)
        .map(|(idx, _)| idx)
        .collect();
    if lane_indices.is_empty() {
        return;
    }

    let declared: f32 = lane_indices
        .iter()
        .filter_map(|&idx| model.lanes[idx].height)
        .sum();
    let undeclared: Vec<usize> = lane_indices
        .iter()
        .copied()
        .filter(|&idx| model.lanes[idx].height.is_none())
        .collect();
    if !undeclared.is_empty() {
        let remaining = (pool_height - declared).max(0.0);
        let share = (remaining / undeclared.len() as f32).max(config.lane_min_height);
        for idx in undeclared {
            model.lanes[idx].height = Some(share);
        }
    }

    let mut y_cursor = 0.0;
    for idx in lane_indices {
        let lane = &mut model.lanes[idx];
        if lane.y.is_none() {
            lane.y = Some(y_cursor);
        }
        if lane.x.is_none() {
            lane.x = Some(config.lane_header_width);
        }
        y_cursor += lane.height.unwrap_or(config.lane_min_height);
    }
}
