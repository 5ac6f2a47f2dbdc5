//! Scene view orchestration for an interactive 3D vehicle configurator.
//!
//! The crate drives a single scene from one frame clock: a camera that glides
//! toward the viewpoint of whichever attribute menu is open, a turntable that
//! eases the vehicle between showcase angles, and a slowly rotating star field.
//! Attribute selections flow into the vehicle's materials each frame. Drawing
//! goes through the [`Renderer`] trait so the same view runs against a wgpu
//! window or the software rasterizer used by headless tools and tests.

pub mod camera;
pub mod cli;
pub mod clock;
pub mod color;
pub mod configuration;
pub mod error;
pub mod input;
pub mod interpolation;
pub mod model_animator;
pub mod particles;
pub mod render;
pub mod scene;
pub mod screenshot;
pub mod script;
pub mod settings;
pub mod view;

pub use camera::{CameraController, CameraPose, CameraState, ViewpointTable};
pub use clock::{FrameClock, FrameTimer, TickReport};
pub use color::Color;
pub use configuration::{ConfigurationState, MenuId, UiEvent};
pub use error::{
    ColorParseError, RenderError, ScreenshotError, ScriptError, SettingsError, TickError,
};
pub use input::{KeyBindings, KeyCode, KeyCommand, NamedKey};
pub use interpolation::{Animated, Damping, SpringConfig};
pub use model_animator::ModelAnimator;
pub use particles::{ParticleAnimator, ParticleField, ParticleSettings};
pub use render::{FrameCapture, HeadlessRenderer, NativeRenderer, Renderer};
pub use scene::{ModelFactory, SceneAssembly, SceneGraph, StageSettings, VehicleModel};
pub use screenshot::{ScreenshotWriter, SideChannel, SCREENSHOT_EVENT};
pub use script::{Script, ScriptSummary};
pub use settings::ConfiguratorSettings;
pub use view::{CommandOutcome, ConfiguratorView, FrameOutcome};
