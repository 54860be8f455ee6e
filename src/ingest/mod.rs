//! Frame ingestion sources.
//!
//! - `stub://<name>`: synthetic frames for tests and dry runs
//! - Local video files and V4L2 cameras (feature: ingest-file-ffmpeg)
//!
//! A source hands out frames in stream order with 1-based indices and reports
//! exhaustion as `Ok(None)`, which is terminal. Read failures are errors.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

pub use file::{FileConfig, FileSource, SourceKind, SourceStats, CAMERA_SCHEME};
