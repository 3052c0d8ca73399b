use serde::{Deserialize, Serialize};

/// Flow direction of the diagram. Determines which axis ranks advance
/// along and maps onto the external tool's rank direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    LeftRight,
    TopDown,
    RightLeft,
    BottomTop,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "LR" | "left-to-right" => Some(Self::LeftRight),
            "TD" | "TB" | "top-to-bottom" => Some(Self::TopDown),
            "RL" | "right-to-left" => Some(Self::RightLeft),
            "BT" | "bottom-to-top" => Some(Self::BottomTop),
            _ => None,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::LeftRight | Self::RightLeft)
    }

    /// Ranks are walked back-to-front for the reversed directions.
    pub fn is_reversed(self) -> bool {
        matches!(self, Self::RightLeft | Self::BottomTop)
    }
}

impl Default for Direction {
    fn default() -> Self {
        Self::LeftRight
    }
}

/// Layout mode requested by the caller.
///
/// `UseExternalTool` lets the external hierarchical layout engine position
/// connected shapes, falling back to the internal rank-based layout on any
/// engine failure. `Preserve` keeps upstream coordinates wherever they are
/// complete and only converts coordinate spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutMode {
    UseExternalTool,
    Preserve,
}

impl Default for LayoutMode {
    fn default() -> Self {
        Self::UseExternalTool
    }
}

/// The option surface supplied by the external CLI/config layer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LayoutOptions {
    pub mode: LayoutMode,
    pub direction: Direction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeDefaults {
    pub fallback_width: f32,
    pub fallback_height: f32,
}

impl Default for ShapeDefaults {
    fn default() -> Self {
        Self {
            fallback_width: 100.0,
            fallback_height: 80.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Gap between shapes within one rank.
    pub node_spacing: f32,
    /// Gap between consecutive ranks.
    pub rank_spacing: f32,
    /// Margin the normalized layout starts at, both axes.
    pub margin_x: f32,
    pub margin_y: f32,
    /// Per-axis multipliers applied when the external tool works in a
    /// different unit system. 1.0 means the tool already speaks pixels.
    pub external_scale_x: f32,
    pub external_scale_y: f32,
    /// Right bound for neighbor placement and row wrapping.
    pub wrap_width: f32,
    /// Column count for the row-wrapping grid used by shapes that never
    /// made it into the flow graph.
    pub grid_columns: usize,
    /// Vertical step taken on each overlap-avoidance collision.
    pub overlap_step: f32,
    /// Downward shifts tried before moving one column right.
    pub overlap_rows: usize,
    /// Total candidate positions tried before accepting the last one.
    pub overlap_max_attempts: usize,
    pub lane_padding: f32,
    pub lane_min_height: f32,
    /// Width of the rotated label band at the left edge of a pool.
    pub lane_header_width: f32,
    pub pool_spacing: f32,
    pub pool_min_width: f32,
    pub pool_min_height: f32,
    /// Vertical offset reserved for a sub-container's header band.
    pub container_header_height: f32,
    pub container_padding: f32,
    /// Lateral distance between shapes attached to the same host border.
    pub boundary_spacing: f32,
    pub defaults: ShapeDefaults,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_spacing: 50.0,
            rank_spacing: 50.0,
            margin_x: 20.0,
            margin_y: 20.0,
            external_scale_x: 1.0,
            external_scale_y: 1.0,
            wrap_width: 1200.0,
            grid_columns: 5,
            overlap_step: 30.0,
            overlap_rows: 8,
            overlap_max_attempts: 24,
            lane_padding: 10.0,
            lane_min_height: 100.0,
            lane_header_width: 30.0,
            pool_spacing: 40.0,
            pool_min_width: 300.0,
            pool_min_height: 120.0,
            container_header_height: 20.0,
            container_padding: 10.0,
            boundary_spacing: 40.0,
            defaults: ShapeDefaults::default(),
        }
    }
}
