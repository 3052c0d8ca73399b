use std::collections::HashMap;

use crate::config::LayoutConfig;

/// Raw positions as emitted by a layout pass, top-left anchored, together
/// with the flags describing the emitting convention. The fallback layout
/// already speaks the target convention (Y down, pixel units), so it leaves
/// both flags off; an external engine with an upward axis or foreign units
/// sets them accordingly.
#[derive(Debug, Default)]
pub struct RawLayout {
    pub positions: HashMap<String, (f32, f32)>,
    pub y_axis_up: bool,
    pub scaled_units: bool,
}

/// Rescale/translate/optionally Y-flip raw positions into the target
/// convention: origin at the configured margin, Y increasing downward.
pub fn normalize_positions(raw: &mut RawLayout, config: &LayoutConfig) {
    if raw.positions.is_empty() {
        return;
    }

    if raw.y_axis_up {
        let max_y = raw
            .positions
            .values()
            .map(|&(_, y)| y)
            .fold(f32::MIN, f32::max);
        for (_, y) in raw.positions.values_mut() {
            *y = max_y - *y;
        }
        raw.y_axis_up = false;
    }

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    for &(x, y) in raw.positions.values() {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
    }

    let (scale_x, scale_y) = if raw.scaled_units {
        (config.external_scale_x, config.external_scale_y)
    } else {
        (1.0, 1.0)
    };
    raw.scaled_units = false;

    for (x, y) in raw.positions.values_mut() {
        *x = (*x - min_x) * scale_x + config.margin_x;
        *y = (*y - min_y) * scale_y + config.margin_y;
    }
}
