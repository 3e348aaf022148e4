pub mod birds_eye;
pub mod camera;
pub mod coordinator;
pub mod data;
pub mod edges;
pub mod fit;
pub mod graph;
pub mod input;
pub mod picking;
pub mod procedures;
pub mod renderer;
pub mod selection;
pub mod shapes;

pub use birds_eye::{BirdsEyeFrame, BirdsEyeSync, CoordinationStep};
pub use camera::{CameraPose, OrbitCamera};
pub use coordinator::{CoordinatorRegistry, CoordinatorState, MainProjection, ViewingCoordinator};
pub use data::{DrawCommand, DrawSink, FrameCollector, FrameOutput, GraphicsData, NullSink, RendererKind, Viewport};
pub use edges::{EdgeAnalyzer, EdgeRenderRecord, PairKey, pair_key};
pub use graph::{
    EdgeView, GraphDocument, GraphSnapshot, GraphViewProvider, LineStyle, NodeLabel, NodeShape, NodeView, Rgba,
    StaticGraph,
};
pub use input::{InputEvent, Modifiers, PointerButton};
pub use picking::{PickKind, PickRequest, PickingState, SelectionPass, ShapePickingProcessor, combine_id, split_id};
pub use procedures::{GraphicsConfiguration, RenderProcedure};
pub use renderer::{Renderer, RendererCommand, RendererHandle};
pub use selection::SoftwareSelectionPass;
pub use shapes::{DetailLevel, ShapeCache, ShapeKind};
