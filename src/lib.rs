//! Auto-layout and coordinate resolution for swimlane flow diagrams.
//!
//! The input is a typed model of shapes, connectors, pools, and lanes in
//! which any coordinate may be missing; [`resolve`] returns the same model
//! with every shape carrying a complete, non-overlapping position expressed
//! relative to its immediate container. Connected shapes are placed by an
//! external hierarchical layout tool (falling back to an internal
//! rank-based layout on any failure), partially-positioned models grow
//! incrementally from their positioned neighbors, and containment is
//! resolved last: lanes stack inside pools, nested shapes are clamped into
//! their sub-containers, boundary shapes seat on their host's edge.
//!
//! Parsing the source format and serializing the resolved model are the
//! caller's concern; this crate performs no I/O.

pub mod config;
pub mod layout;
pub mod model;

pub use config::{Direction, LayoutConfig, LayoutMode, LayoutOptions};
pub use layout::resolve;
pub use model::{Connector, ConnectorKind, Diagram, Lane, Pool, Shape, ShapeKind};
