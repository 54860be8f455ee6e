mod backend;
mod backends;
pub mod nms;
mod registry;
mod result;
pub mod yolo;

pub use backend::{DetectionCapability, DetectorBackend};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use registry::{BackendRegistry, SharedBackend};
pub use result::{Detection, DetectionResult, ObjectClass};
pub use yolo::ModelKind;
