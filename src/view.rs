//! The configurator view: one frame clock driving the camera, the turntable
//! and the star field, then assembling and drawing the scene.
//!
//! Components are shared between the view and the clock's subscribers with
//! `Rc<RefCell<_>>`. A subscriber that finds its component already borrowed
//! reports [`TickError::Busy`] for that tick instead of panicking.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, error, info, warn};

use crate::camera::{CameraController, CameraPose, CameraState};
use crate::clock::{FrameClock, TickReport};
use crate::configuration::{ConfigurationState, MenuId, UiEvent};
use crate::error::{RenderError, ScreenshotError, TickError};
use crate::input::KeyCommand;
use crate::model_animator::ModelAnimator;
use crate::particles::{ParticleAnimator, ParticleField, RotationAngles};
use crate::render::Renderer;
use crate::scene::{ModelFactory, SceneAssembly, SceneGraph};
use crate::screenshot::{ScreenshotWriter, SideChannel, Subscription, SCREENSHOT_EVENT};
use crate::settings::ConfiguratorSettings;

/// What happened during one call to [`ConfiguratorView::frame`].
#[derive(Debug, Default)]
pub struct FrameOutcome {
    /// `None` when the clock is paused or the view is not mounted.
    pub report: Option<TickReport>,
    pub drawn: bool,
    pub screenshots: Vec<Result<PathBuf, ScreenshotError>>,
}

/// Whether the host should keep running after a key command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Continue,
    Quit,
}

/// Owns the configuration, the animated components and the renderer.
pub struct ConfiguratorView<R, M> {
    settings: ConfiguratorSettings,
    state: Rc<RefCell<ConfigurationState>>,
    camera: Rc<RefCell<CameraController>>,
    animator: Rc<RefCell<ModelAnimator>>,
    particles: Rc<RefCell<ParticleAnimator>>,
    field: ParticleField,
    assembly: SceneAssembly<M>,
    renderer: R,
    clock: FrameClock,
    channel: SideChannel,
    subscription: Option<Subscription>,
    screenshots: Option<ScreenshotWriter>,
    last_scene: Option<SceneGraph>,
}

impl<R: Renderer, M: ModelFactory> ConfiguratorView<R, M> {
    pub fn new(settings: ConfiguratorSettings, model: M, renderer: R) -> Self {
        let state = settings.initial_state();
        let camera = CameraController::new(settings.viewpoints.clone(), settings.damping);
        let animator = ModelAnimator::new(
            settings.turntable.rotations.clone(),
            settings.turntable.speed,
        );
        let field = ParticleField::from_settings(&settings.particles);
        debug!(
            "generated {} particles (radius {}, seed {:#x})",
            field.len(),
            field.radius(),
            settings.particles.seed
        );
        Self {
            state: Rc::new(RefCell::new(state)),
            camera: Rc::new(RefCell::new(camera)),
            animator: Rc::new(RefCell::new(animator)),
            particles: Rc::new(RefCell::new(ParticleAnimator::from_settings(
                &settings.particles,
            ))),
            field,
            assembly: SceneAssembly::new(model, settings.stage),
            renderer,
            clock: FrameClock::new(settings.max_delta),
            channel: SideChannel::new(),
            subscription: None,
            screenshots: None,
            last_scene: None,
            settings,
        }
    }

    /// Saves screenshots into `directory` when the screenshot event fires.
    pub fn with_screenshot_dir(mut self, directory: impl Into<PathBuf>) -> Self {
        self.screenshots = Some(ScreenshotWriter::new(directory));
        self
    }

    /// Listens on `channel` instead of a private one.
    pub fn with_channel(mut self, channel: SideChannel) -> Self {
        self.channel = channel;
        self
    }

    /// Registers the tick subscribers and the screenshot listener.
    pub fn mount(&mut self) {
        if self.is_mounted() {
            return;
        }

        let state = Rc::clone(&self.state);
        let camera = Rc::clone(&self.camera);
        self.clock.subscribe("camera", move |delta| {
            let menu = state
                .try_borrow()
                .map_err(|_| TickError::Busy("configuration state"))?
                .active_menu();
            camera
                .try_borrow_mut()
                .map_err(|_| TickError::Busy("camera"))?
                .update(delta, menu);
            Ok(())
        });

        let state = Rc::clone(&self.state);
        let animator = Rc::clone(&self.animator);
        self.clock.subscribe("model", move |delta| {
            let view = state
                .try_borrow()
                .map_err(|_| TickError::Busy("configuration state"))?
                .showcase_view;
            animator
                .try_borrow_mut()
                .map_err(|_| TickError::Busy("model animator"))?
                .update(delta, view);
            Ok(())
        });

        let particles = Rc::clone(&self.particles);
        self.clock.subscribe("particles", move |delta| {
            particles
                .try_borrow_mut()
                .map_err(|_| TickError::Busy("particle animator"))?
                .update(delta);
            Ok(())
        });

        self.subscription = Some(self.channel.listen(SCREENSHOT_EVENT));
        info!("configurator view mounted");
    }

    /// Drops the tick subscribers and releases the screenshot listener.
    pub fn unmount(&mut self) {
        if !self.is_mounted() {
            return;
        }
        self.clock.clear();
        self.subscription = None;
        info!("configurator view unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    /// Applies a UI event to the configuration. Returns `true` when it changed.
    pub fn handle(&mut self, event: UiEvent) -> bool {
        match self.state.try_borrow_mut() {
            Ok(mut state) => state.apply(event),
            Err(_) => {
                warn!("dropping {event:?}: configuration state is busy");
                false
            }
        }
    }

    /// Hiding pauses the clock and the turntable; showing resumes them
    /// without replaying the hidden interval.
    pub fn set_visible(&mut self, visible: bool) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            if state.visible == visible {
                return;
            }
            state.visible = visible;
        }
        if let Ok(mut animator) = self.animator.try_borrow_mut() {
            animator.set_visible(visible);
        }
        if visible {
            self.clock.resume();
        } else {
            self.clock.pause();
        }
        debug!("view visibility set to {visible}");
    }

    pub fn is_visible(&self) -> bool {
        self.state.borrow().visible
    }

    /// Emits the screenshot event on this view's channel.
    pub fn request_screenshot(&self) -> usize {
        self.channel.emit(SCREENSHOT_EVENT)
    }

    /// Runs one frame: tick the clock, assemble the scene, draw it and serve
    /// pending screenshot requests.
    pub fn frame(&mut self, raw_delta: f32) -> Result<FrameOutcome, RenderError> {
        let mut outcome = FrameOutcome::default();
        if !self.is_mounted() {
            return Ok(outcome);
        }

        outcome.report = self.clock.tick(raw_delta);
        if outcome.report.is_some() {
            let scene = self.assemble();
            match self.renderer.draw(&scene) {
                Ok(()) => outcome.drawn = true,
                Err(RenderError::SurfaceUnavailable(reason)) => {
                    warn!("skipping frame: {reason}");
                }
                Err(err) => return Err(err),
            }
            self.last_scene = Some(scene);
        }

        let requested = self
            .subscription
            .as_ref()
            .map_or(0, Subscription::drain);
        for _ in 0..requested {
            let result = self.save_screenshot();
            if let Err(err) = &result {
                error!("screenshot failed: {err}");
            }
            outcome.screenshots.push(result);
        }
        Ok(outcome)
    }

    /// Applies a key command. Returns [`CommandOutcome::Quit`] when the host should exit.
    pub fn execute(&mut self, command: KeyCommand) -> CommandOutcome {
        match command {
            KeyCommand::ToggleMenu(menu) => {
                self.handle(UiEvent::ToggleMenu(menu));
            }
            KeyCommand::Back => match self.active_menu() {
                Some(menu) => {
                    self.handle(UiEvent::ToggleMenu(menu));
                }
                None => return CommandOutcome::Quit,
            },
            KeyCommand::CycleSwatch(menu) => {
                if let Some(event) = self.next_swatch(menu) {
                    self.handle(event);
                }
            }
            KeyCommand::ClearOverrides => {
                self.handle(UiEvent::ClearRimColor);
                self.handle(UiEvent::ClearGlassTint);
            }
            KeyCommand::NextView => {
                let count = self.settings.turntable.rotations.len().max(1);
                let next = (self.state().showcase_view + 1) % count;
                self.handle(UiEvent::SelectView(next));
            }
            KeyCommand::Screenshot => {
                self.request_screenshot();
            }
            KeyCommand::ToggleVisibility => {
                let visible = self.is_visible();
                self.set_visible(!visible);
            }
        }
        CommandOutcome::Continue
    }

    /// Event selecting the swatch after the current one. Optional attributes
    /// cycle back to their default material after the last swatch.
    fn next_swatch(&self, menu: MenuId) -> Option<UiEvent> {
        let palette = self.settings.palettes.for_menu(menu);
        let state = self.state();
        let current = match menu {
            MenuId::Body => Some(state.body_color),
            MenuId::Rims => state.rim_color,
            MenuId::Glass => state.glass_tint,
        };
        let position = current.and_then(|color| palette.iter().position(|s| s.color == color));
        let next = match position {
            Some(index) => palette.get(index + 1),
            None => palette.first(),
        };
        match (menu, next) {
            (MenuId::Body, Some(swatch)) => Some(UiEvent::SelectBodyColor(swatch.color)),
            (MenuId::Body, None) => palette.first().map(|s| UiEvent::SelectBodyColor(s.color)),
            (MenuId::Rims, Some(swatch)) => Some(UiEvent::SelectRimColor(swatch.color)),
            (MenuId::Rims, None) => Some(UiEvent::ClearRimColor),
            (MenuId::Glass, Some(swatch)) => Some(UiEvent::SelectGlassTint(swatch.color)),
            (MenuId::Glass, None) => Some(UiEvent::ClearGlassTint),
        }
    }

    fn assemble(&self) -> SceneGraph {
        let state = self.state.borrow();
        self.assembly.render(
            &state,
            self.camera.borrow().pose(),
            self.animator.borrow().rotation_y(),
            &self.field,
            self.particles.borrow().angles(),
        )
    }

    fn save_screenshot(&mut self) -> Result<PathBuf, ScreenshotError> {
        let Some(writer) = self.screenshots.as_ref() else {
            return Err(ScreenshotError::NoDirectory);
        };
        let frame = self.renderer.capture()?;
        writer.save(&frame)
    }

    pub fn state(&self) -> ConfigurationState {
        self.state.borrow().clone()
    }

    pub fn active_menu(&self) -> Option<MenuId> {
        self.state.borrow().active_menu()
    }

    pub fn camera_pose(&self) -> CameraPose {
        self.camera.borrow().pose()
    }

    pub fn camera_state(&self) -> CameraState {
        self.camera.borrow().state()
    }

    pub fn rotation_y(&self) -> f32 {
        self.animator.borrow().rotation_y()
    }

    pub fn particle_angles(&self) -> RotationAngles {
        self.particles.borrow().angles()
    }

    pub fn particle_field(&self) -> &ParticleField {
        &self.field
    }

    pub fn settings(&self) -> &ConfiguratorSettings {
        &self.settings
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn channel(&self) -> &SideChannel {
        &self.channel
    }

    pub fn screenshot_dir(&self) -> Option<&Path> {
        self.screenshots.as_ref().map(ScreenshotWriter::directory)
    }

    pub fn last_scene(&self) -> Option<&SceneGraph> {
        self.last_scene.as_ref()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}
