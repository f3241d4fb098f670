//! Interactive force-directed layout for knowledge graphs.
//!
//! Load a [`GraphSnapshot`] into a [`SimulationEngine`], tick it directly or
//! through a [`SimulationDriver`], route pointer input through an
//! [`InteractionController`] and hand [`build_frame`] output to a renderer.

pub mod config;
pub mod error;
pub mod filter;
pub mod graph;
pub mod interaction;
mod layout;
pub mod physics;
pub mod render;
pub mod simulation;

pub use config::LayoutConfig;
pub use error::{LayoutError, LayoutResult};
pub use filter::{Emphasis, FilterState, SearchMode, TypeFilter};
pub use graph::{EdgeRecord, GraphSnapshot, GraphStats, NodeId, NodeRecord, NodeType};
pub use interaction::{GraphEvents, InteractionController, NodeDetails, ViewTransform};
pub use physics::{ForceKind, ForceParameter, ForceParams};
pub use render::{Frame, build_frame};
pub use simulation::{SimulationDriver, SimulationEngine, SimulationPhase};
