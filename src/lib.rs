//! Model loading and scene lifecycle for a 3D character select stage.
//!
//! The crate covers everything between "the user picked a character" and
//! "a normalized, lit model is on the platform": asynchronous asset loading,
//! placeholder fallback, normalization, animation playback, theme tinting
//! and GPU resource disposal. Window and camera handling are intentionally
//! kept outside of the crate so that the code remains testable and easy to
//! embed in headless tools.

pub mod animation;
pub mod assets;
pub mod config;
pub mod disposal;
pub mod indicator;
pub mod normalize;
pub mod orchestrator;
pub mod particles;
pub mod placeholder;
pub mod primitives;
pub mod render;
pub mod roster;
pub mod scene_graph;
pub mod selection;
pub mod stage;
pub mod theme;

pub use animation::{AnimationClip, AnimationController};
pub use assets::{AssetLoadError, AssetSource, FileAssetSource, LoadFailure, LoadProgress};
pub use config::{ParticleConfig, StageConfig};
pub use disposal::{dispose, DisposalReport};
pub use indicator::{IndicatorState, LoadIndicator};
pub use normalize::{normalize, NormalizeReport, CANONICAL_HEIGHT};
pub use orchestrator::{
    DisplayState, LoadObserver, LoadOrchestrator, LoadPhase, NullObserver, OrchestratorError,
};
pub use placeholder::generate_placeholder;
pub use render::{GpuBackend, ResourceCounts, TrackingBackend, WgpuBackend};
pub use roster::{EntityDescriptor, EntityProfile, Roster};
pub use scene_graph::{AssetOrigin, Node, SceneAsset};
pub use selection::{SelectionCommand, SelectionCursor, SelectionEvent};
pub use stage::{DrawItem, ModelId, Stage};
pub use theme::{ThemeColor, ThemeSynchronizer};
