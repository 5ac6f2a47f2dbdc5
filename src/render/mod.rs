pub mod common;
pub mod headless;
pub mod native;
pub(crate) mod shared;

pub use common::{CameraParams, LightParams, FIELD_OF_VIEW};
pub use headless::{FrameStats, HeadlessRenderer};
pub use native::NativeRenderer;

use crate::error::RenderError;
use crate::scene::SceneGraph;

/// Tightly packed 8-bit RGBA pixels, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCapture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl FrameCapture {
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y as usize * self.width as usize + x as usize) * 4;
        let bytes = self.rgba.get(start..start + 4)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

/// Draws assembled scenes onto some surface.
pub trait Renderer {
    /// Draws one frame of `scene`.
    fn draw(&mut self, scene: &SceneGraph) -> Result<(), RenderError>;

    /// Reads back the most recently drawn frame.
    fn capture(&mut self) -> Result<FrameCapture, RenderError>;

    fn surface_size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);
}
