//! Local file and camera frame source.
//!
//! `FileSource` reads frames from a local video file or a V4L2 capture device,
//! or synthesizes them for `stub://` paths. Remote URL schemes are rejected.

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::frame::Frame;

pub const DEFAULT_STUB_WIDTH: u32 = 640;
pub const DEFAULT_STUB_HEIGHT: u32 = 480;

pub const CAMERA_SCHEME: &str = "camera://";
const V4L2_DEVICE_PREFIX: &str = "/dev/video";

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path, `camera://<index>` or `/dev/video<n>` for a capture
    /// device, or `stub://<name>` for synthetic frames.
    pub path: String,
    /// Synthetic frame width, also requested from cameras (decoded files keep
    /// their own size).
    pub width: u32,
    /// Synthetic or requested camera frame height.
    pub height: u32,
    /// Frames a synthetic source yields before it is exhausted. `None` never ends.
    pub max_frames: Option<u64>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            width: DEFAULT_STUB_WIDTH,
            height: DEFAULT_STUB_HEIGHT,
            max_frames: None,
        }
    }
}

impl FileConfig {
    pub fn stub(name: &str, max_frames: u64) -> Self {
        Self {
            path: format!("stub://{}", name),
            max_frames: Some(max_frames),
            ..Self::default()
        }
    }

    /// Capture device `/dev/video<index>`.
    pub fn camera(index: u32) -> Self {
        Self {
            path: format!("{}{}", CAMERA_SCHEME, index),
            ..Self::default()
        }
    }
}

/// What a configured source path refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Synthetic,
    File,
    Camera { device: String },
}

impl SourceKind {
    pub fn classify(path: &str) -> Result<Self> {
        if path.trim().is_empty() {
            return Err(anyhow!("source path must not be empty"));
        }
        if path.starts_with("stub://") {
            return Ok(SourceKind::Synthetic);
        }
        if let Some(index) = path.strip_prefix(CAMERA_SCHEME) {
            let index: u32 = index
                .parse()
                .map_err(|_| anyhow!("camera source '{}' needs a device index", path))?;
            return Ok(SourceKind::Camera {
                device: format!("{}{}", V4L2_DEVICE_PREFIX, index),
            });
        }
        if path.starts_with(V4L2_DEVICE_PREFIX) {
            return Ok(SourceKind::Camera {
                device: path.to_string(),
            });
        }
        if path.contains("://") {
            return Err(anyhow!(
                "file ingestion only supports local paths, cameras or stub:// (got '{}')",
                path
            ));
        }
        Ok(SourceKind::File)
    }
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        let backend = match SourceKind::classify(&config.path)? {
            SourceKind::Synthetic => FileBackend::Synthetic(SyntheticFileSource::new(config)?),
            #[cfg(feature = "ingest-file-ffmpeg")]
            SourceKind::File => FileBackend::Ffmpeg(FfmpegFileSource::open_file(config)?),
            #[cfg(feature = "ingest-file-ffmpeg")]
            SourceKind::Camera { device } => {
                FileBackend::Ffmpeg(FfmpegFileSource::open_camera(config, &device)?)
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            SourceKind::File | SourceKind::Camera { .. } => {
                return Err(anyhow!(
                    "decoding '{}' requires the ingest-file-ffmpeg feature",
                    config.path
                ))
            }
        };
        Ok(Self { backend })
    }

    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.connect(),
        }
    }

    /// Read the next frame. `Ok(None)` means the stream is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    pub fn stats(&self) -> SourceStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_read: u64,
    pub exhausted: bool,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://)
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    config: FileConfig,
    frame_count: u64,
    exhausted: bool,
}

impl SyntheticFileSource {
    fn new(config: FileConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!(
                "synthetic frame size must be non-zero (got {}x{})",
                config.width,
                config.height
            ));
        }
        Ok(Self {
            config,
            frame_count: 0,
            exhausted: false,
        })
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("FileSource: connected to {} (synthetic)", self.config.path);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self
            .config
            .max_frames
            .is_some_and(|max| self.frame_count >= max)
        {
            if !self.exhausted {
                log::info!(
                    "FileSource: {} exhausted after {} frames",
                    self.config.path,
                    self.frame_count
                );
            }
            self.exhausted = true;
            return Ok(None);
        }

        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels();
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )
        .map(Some)
    }

    /// Horizontal gradient that drifts with the frame count.
    fn generate_synthetic_pixels(&self) -> Vec<u8> {
        let width = self.config.width as usize;
        let pixel_count = width * self.config.height as usize * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            let column = (i / 3) % width;
            *pixel = ((column as u64 + self.frame_count) % 256) as u8;
        }
        pixels
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frame_count,
            exhausted: self.exhausted,
            path: self.config.path.clone(),
        }
    }
}
