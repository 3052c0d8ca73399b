use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    StartEvent,
    EndEvent,
    IntermediateEvent,
    BoundaryEvent,
    Task,
    UserTask,
    ServiceTask,
    ScriptTask,
    ManualTask,
    CallActivity,
    SubContainer,
    ExclusiveGateway,
    ParallelGateway,
    InclusiveGateway,
    EventGateway,
    DataObject,
    DataStore,
    TextAnnotation,
}

impl ShapeKind {
    /// Default width/height used when the source format carries no size.
    pub fn default_size(self) -> (f32, f32) {
        match self {
            Self::StartEvent | Self::EndEvent | Self::IntermediateEvent | Self::BoundaryEvent => {
                (36.0, 36.0)
            }
            Self::Task | Self::UserTask | Self::ServiceTask | Self::ScriptTask
            | Self::ManualTask | Self::CallActivity => (120.0, 80.0),
            Self::SubContainer => (300.0, 200.0),
            Self::ExclusiveGateway
            | Self::ParallelGateway
            | Self::InclusiveGateway
            | Self::EventGateway => (50.0, 50.0),
            Self::DataObject => (36.0, 50.0),
            Self::DataStore => (60.0, 60.0),
            Self::TextAnnotation => (100.0, 30.0),
        }
    }

    /// Data-like shapes are kept out of the main flow area and stacked in a
    /// sidebar when they have no flow edges.
    pub fn is_data(self) -> bool {
        matches!(self, Self::DataObject | Self::DataStore)
    }

    /// Shapes that attach to the border of a host rather than occupying
    /// their own slot in the flow.
    pub fn is_attached(self) -> bool {
        matches!(self, Self::BoundaryEvent)
    }

    /// Shapes a boundary shape may attach to.
    pub fn is_attachable_host(self) -> bool {
        matches!(
            self,
            Self::Task
                | Self::UserTask
                | Self::ServiceTask
                | Self::ScriptTask
                | Self::ManualTask
                | Self::CallActivity
                | Self::SubContainer
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorKind {
    SequenceFlow,
    MessageFlow,
    Association,
}

impl ConnectorKind {
    /// Flow connectors contribute edges to the layout graph; associations
    /// are annotation links and do not.
    pub fn is_flow(self) -> bool {
        matches!(self, Self::SequenceFlow | Self::MessageFlow)
    }
}

#[derive(Debug, Clone)]
pub struct Shape {
    pub id: String,
    pub kind: ShapeKind,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    /// Identifier of the lane, pool, or sub-container this shape belongs
    /// to, as declared by the source format. Classified once per resolve.
    pub parent: Option<String>,
    /// Identifier of the enclosing sub-container shape, when nested.
    pub container: Option<String>,
    pub properties: HashMap<String, Value>,
}

impl Shape {
    pub fn new(id: &str, kind: ShapeKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            x: None,
            y: None,
            width: None,
            height: None,
            parent: None,
            container: None,
            properties: HashMap::new(),
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn sized(mut self, width: f32, height: f32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn has_position(&self) -> bool {
        self.x.is_some() && self.y.is_some()
    }

    /// Bounding box with zero substituted for unset fields. Only meaningful
    /// once resolution has filled the coordinates in.
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        (
            self.x.unwrap_or(0.0),
            self.y.unwrap_or(0.0),
            self.width.unwrap_or(0.0),
            self.height.unwrap_or(0.0),
        )
    }
}

#[derive(Debug, Clone)]
pub struct Connector {
    pub id: String,
    pub kind: ConnectorKind,
    pub source: String,
    pub target: String,
    pub waypoints: Vec<(f32, f32)>,
}

impl Connector {
    pub fn new(id: &str, kind: ConnectorKind, source: &str, target: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            source: source.to_string(),
            target: target.to_string(),
            waypoints: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pool {
    pub id: String,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    /// Identifier of the contained sub-model, when the source format splits
    /// pool content into a separate process.
    pub sub_model: Option<String>,
}

impl Pool {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            x: None,
            y: None,
            width: None,
            height: None,
            sub_model: None,
        }
    }

    pub fn has_position(&self) -> bool {
        self.x.is_some() && self.y.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Lane {
    pub id: String,
    pub pool: String,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    /// Member shape ids in declared order.
    pub shapes: Vec<String>,
}

impl Lane {
    pub fn new(id: &str, pool: &str) -> Self {
        Self {
            id: id.to_string(),
            pool: pool.to_string(),
            x: None,
            y: None,
            width: None,
            height: None,
            shapes: Vec::new(),
        }
    }

    pub fn has_position(&self) -> bool {
        self.x.is_some() && self.y.is_some()
    }
}

/// The typed diagram model handed over by the upstream parser and consumed
/// by [`crate::layout::resolve`]. Shapes live in a `BTreeMap` so every walk
/// over them is deterministic; `shape_order` remembers declaration order for
/// the places where source order matters (rank buckets, grid placement).
#[derive(Debug, Clone, Default)]
pub struct Diagram {
    pub shapes: BTreeMap<String, Shape>,
    pub shape_order: HashMap<String, usize>,
    pub connectors: Vec<Connector>,
    pub pools: Vec<Pool>,
    pub lanes: Vec<Lane>,
    /// Whether any shape carried coordinates in the source format. Drives
    /// the whole-model layout vs. neighbor placement decision.
    pub has_explicit_positions: bool,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_shape(&mut self, shape: Shape) {
        if shape.has_position() {
            self.has_explicit_positions = true;
        }
        let order = self.shape_order.len();
        self.shape_order.entry(shape.id.clone()).or_insert(order);
        self.shapes.insert(shape.id.clone(), shape);
    }

    pub fn add_connector(&mut self, connector: Connector) {
        self.connectors.push(connector);
    }

    pub fn add_pool(&mut self, pool: Pool) {
        self.pools.push(pool);
    }

    pub fn add_lane(&mut self, lane: Lane) {
        self.lanes.push(lane);
    }

    pub fn order_of(&self, id: &str) -> usize {
        self.shape_order.get(id).copied().unwrap_or(usize::MAX)
    }
}
