//! Drawing adapter between the engine and a display backend.
//!
//! The engine never draws. `annotate` turns each emitted violation into one
//! line and two circle markers on whatever `Renderer` the host provides.

use crate::grouping::{FrameAnalysis, Point};
use crate::palette::Rgb;

pub const LINE_THICKNESS: u32 = 4;
pub const MARKER_RADIUS: u32 = 4;
pub const MARKER_THICKNESS: u32 = 4;

/// Drawing sink for violation annotations.
pub trait Renderer {
    fn draw_line(&mut self, from: Point, to: Point, color: Rgb, thickness: u32);
    fn draw_circle(&mut self, center: Point, radius: u32, color: Rgb, thickness: u32);
}

/// Issue drawing commands for every emitted violation; returns how many were drawn.
///
/// Both visiting orders of a pair are drawn, so each violating pair is painted twice.
pub fn annotate<R: Renderer + ?Sized>(analysis: &FrameAnalysis, renderer: &mut R) -> usize {
    for v in &analysis.violations {
        renderer.draw_line(v.first, v.second, v.color, LINE_THICKNESS);
        renderer.draw_circle(v.first, MARKER_RADIUS, v.color, MARKER_THICKNESS);
        renderer.draw_circle(v.second, MARKER_RADIUS, v.color, MARKER_THICKNESS);
    }
    analysis.violations.len()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrawCommand {
    Line {
        from: Point,
        to: Point,
        color: Rgb,
        thickness: u32,
    },
    Circle {
        center: Point,
        radius: u32,
        color: Rgb,
        thickness: u32,
    },
}

/// Renderer that only records what it was asked to draw.
#[derive(Clone, Debug, Default)]
pub struct RecordingRenderer {
    pub commands: Vec<DrawCommand>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for RecordingRenderer {
    fn draw_line(&mut self, from: Point, to: Point, color: Rgb, thickness: u32) {
        self.commands.push(DrawCommand::Line {
            from,
            to,
            color,
            thickness,
        });
    }

    fn draw_circle(&mut self, center: Point, radius: u32, color: Rgb, thickness: u32) {
        self.commands.push(DrawCommand::Circle {
            center,
            radius,
            color,
            thickness,
        });
    }
}

#[cfg(feature = "render-image")]
pub use image_renderer::ImageRenderer;

#[cfg(feature = "render-image")]
mod image_renderer {
    use std::path::Path;

    use anyhow::{anyhow, Context, Result};
    use image::{Rgb as ImageRgb, RgbImage};

    use super::Renderer;
    use crate::frame::Frame;
    use crate::grouping::Point;
    use crate::palette::Rgb;

    /// Software renderer over an in-memory RGB image.
    pub struct ImageRenderer {
        image: RgbImage,
    }

    impl ImageRenderer {
        pub fn from_frame(frame: Frame) -> Result<Self> {
            let (width, height) = (frame.width, frame.height);
            let image = RgbImage::from_raw(width, height, frame.into_pixels())
                .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", width, height))?;
            Ok(Self { image })
        }

        pub fn image(&self) -> &RgbImage {
            &self.image
        }

        pub fn into_image(self) -> RgbImage {
            self.image
        }

        pub fn save_jpeg(&self, path: &Path) -> Result<()> {
            self.image
                .save_with_format(path, image::ImageFormat::Jpeg)
                .with_context(|| format!("failed to write {}", path.display()))
        }

        /// Square brush centered on a point, clipped to the image.
        fn stamp(&mut self, center: Point, half: i32, color: ImageRgb<u8>) {
            let (w, h) = (self.image.width() as i32, self.image.height() as i32);
            for y in (center.y - half)..=(center.y + half) {
                for x in (center.x - half)..=(center.x + half) {
                    if x >= 0 && y >= 0 && x < w && y < h {
                        self.image.put_pixel(x as u32, y as u32, color);
                    }
                }
            }
        }
    }

    fn to_pixel(color: Rgb) -> ImageRgb<u8> {
        ImageRgb([color.r, color.g, color.b])
    }

    impl Renderer for ImageRenderer {
        fn draw_line(&mut self, from: Point, to: Point, color: Rgb, thickness: u32) {
            let pixel = to_pixel(color);
            let half = (thickness as i32 / 2).max(0);
            // Bresenham over all octants.
            let (mut x, mut y) = (from.x, from.y);
            let dx = (to.x - from.x).abs();
            let dy = -(to.y - from.y).abs();
            let sx = if from.x < to.x { 1 } else { -1 };
            let sy = if from.y < to.y { 1 } else { -1 };
            let mut err = dx + dy;
            loop {
                self.stamp(Point::new(x, y), half, pixel);
                if x == to.x && y == to.y {
                    break;
                }
                let e2 = 2 * err;
                if e2 >= dy {
                    err += dy;
                    x += sx;
                }
                if e2 <= dx {
                    err += dx;
                    y += sy;
                }
            }
        }

        fn draw_circle(&mut self, center: Point, radius: u32, color: Rgb, thickness: u32) {
            let pixel = to_pixel(color);
            let r = radius as i32;
            let half = thickness as i32 / 2;
            let outer = (r + half) * (r + half);
            let inner = (r - half).max(0).pow(2);
            let (w, h) = (self.image.width() as i32, self.image.height() as i32);
            for y in (center.y - r - half)..=(center.y + r + half) {
                for x in (center.x - r - half)..=(center.x + r + half) {
                    let d = (x - center.x).pow(2) + (y - center.y).pow(2);
                    if d <= outer && d >= inner && x >= 0 && y >= 0 && x < w && y < h {
                        self.image.put_pixel(x as u32, y as u32, pixel);
                    }
                }
            }
        }
    }

}
