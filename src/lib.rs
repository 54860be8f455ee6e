//! Distancing Kernel
//!
//! Flags pairs of people in a video who stand closer together than their own
//! apparent height suggests is safe.
//!
//! # Pipeline
//!
//! 1. A `FileSource` yields RGB frames from a local file, a V4L2 camera, or a
//!    synthetic stub.
//! 2. A `FrameThrottle` decides which frames are analyzed (the first, then every 4th).
//! 3. A `DetectorBackend` returns person bounding boxes for an analyzed frame.
//! 4. The `ProximityEngine` groups people of similar box area as a proxy for
//!    similar depth, then reports same-group pairs whose centers are closer
//!    than the group's average height.
//! 5. `render::annotate` draws each violation with its group's palette color.
//!
//! # Module Structure
//!
//! - `grouping`: depth grouping and pairwise violation detection
//! - `palette`: per-session group colors
//! - `throttle`: frame sampling policy
//! - `detect`: detector backends, registry, YOLO decoding and NMS
//! - `ingest`, `frame`: frame sources and the frame type
//! - `render`: drawing adapter
//! - `session`: the read, detect, analyze loop
//! - `config`: TOML file and environment configuration

pub mod config;
pub mod detect;
pub mod frame;
pub mod grouping;
pub mod ingest;
pub mod palette;
pub mod render;
pub mod session;
pub mod throttle;

pub use config::{DetectorSettings, DistancingConfig};
pub use detect::{
    BackendRegistry, Detection, DetectionCapability, DetectionResult, DetectorBackend, ModelKind,
    ObjectClass, SharedBackend, StubBackend,
};
pub use frame::Frame;
pub use grouping::{
    AnalysisSummary, ContractViolation, EngineParams, FrameAnalysis, Group, PersonRecord, Point,
    ProximityEngine, Violation, DEFAULT_GROUP_RATIO, DEFAULT_MAX_HEIGHT_DIFF,
};
pub use ingest::{FileConfig, FileSource, SourceKind, SourceStats};
pub use palette::{Palette, Rgb, PALETTE_SIZE};
pub use render::{annotate, DrawCommand, RecordingRenderer, Renderer};
pub use session::{AnalysisSession, AnalyzedFrame, FrameOutcome, SessionStats};
pub use throttle::FrameThrottle;

#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
#[cfg(feature = "render-image")]
pub use render::ImageRenderer;
