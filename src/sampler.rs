//! Screen pixel sampling through `xcap`.

use image::RgbaImage;
use xcap::Monitor;

use crate::color_utils::{rgba_to_color, Color};
use crate::config::Point;
use crate::error::SampleError;

/// Reads the color of screen pixels.
pub trait PixelSampler {
    fn sample(&mut self, at: Point) -> Result<Color, SampleError>;

    /// Read several pixels at once. Results come back in the order of
    /// `points`.
    fn sample_many(&mut self, points: &[Point]) -> Vec<Result<Color, SampleError>> {
        points.iter().map(|&at| self.sample(at)).collect()
    }
}

/// Captures the monitor under the requested point and reads pixels from the
/// frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScreenSampler;

/// One captured monitor, positioned in desktop coordinates.
struct Frame {
    origin: Point,
    image: RgbaImage,
}

impl Frame {
    fn capture(at: Point) -> Result<Self, SampleError> {
        let monitor = Monitor::from_point(at.x, at.y)?;
        let image = monitor.capture_image()?;
        Ok(Self {
            origin: Point {
                x: monitor.x(),
                y: monitor.y(),
            },
            image,
        })
    }

    /// Captured frames are in monitor-local physical pixels.
    fn local(&self, at: Point) -> Option<(u32, u32)> {
        let x = at.x - self.origin.x;
        let y = at.y - self.origin.y;
        if x < 0 || y < 0 || x as u32 >= self.image.width() || y as u32 >= self.image.height() {
            return None;
        }
        Some((x as u32, y as u32))
    }

    fn pixel(&self, at: Point) -> Result<Color, SampleError> {
        let (x, y) = self
            .local(at)
            .ok_or(SampleError::OutOfBounds { x: at.x, y: at.y })?;
        Ok(rgba_to_color(*self.image.get_pixel(x, y)))
    }
}

impl PixelSampler for ScreenSampler {
    fn sample(&mut self, at: Point) -> Result<Color, SampleError> {
        Frame::capture(at)?.pixel(at)
    }

    /// Each monitor is captured at most once per call.
    fn sample_many(&mut self, points: &[Point]) -> Vec<Result<Color, SampleError>> {
        sample_frames(points, Frame::capture)
    }
}

/// Read `points`, reusing any frame already captured that covers a point.
///
/// # Arguments
///
/// * `points` - Desktop coordinates to read, in order.
/// * `capture` - Captures the monitor under a point.
fn sample_frames<F>(points: &[Point], mut capture: F) -> Vec<Result<Color, SampleError>>
where
    F: FnMut(Point) -> Result<Frame, SampleError>,
{
    let mut frames: Vec<Frame> = Vec::new();
    points
        .iter()
        .map(|&at| {
            if let Some(frame) = frames.iter().find(|frame| frame.local(at).is_some()) {
                return frame.pixel(at);
            }
            let frame = capture(at)?;
            let color = frame.pixel(at);
            frames.push(frame);
            color
        })
        .collect()
}
