use std::any::Any;
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey as WinitNamedKey};
use winit::window::{Window, WindowId};

use configurator_runtime::cli::Cli;
use configurator_runtime::{
    CameraState, CommandOutcome, ConfiguratorSettings, ConfiguratorView, FrameTimer,
    HeadlessRenderer, KeyBindings, KeyCode, NamedKey, NativeRenderer, Renderer, Script,
    ScriptSummary, VehicleModel,
};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    if cli.headless {
        run_headless(&cli, settings)
    } else {
        match run_interactive(&cli, settings.clone()) {
            Ok(()) => Ok(()),
            Err(err) => {
                if err.downcast_ref::<WindowInitError>().is_some() {
                    eprintln!(
                        "{err}. Falling back to --headless mode (set DISPLAY or install X11 libs to enable rendering)."
                    );
                    run_headless(&cli, settings)
                } else {
                    Err(err)
                }
            }
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<ConfiguratorSettings> {
    let Some(path) = path else {
        return Ok(ConfiguratorSettings::default());
    };
    let xml = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings {}", path.display()))?;
    let settings = ConfiguratorSettings::from_xml(&xml)
        .with_context(|| format!("failed to parse settings {}", path.display()))?;
    info!("loaded settings from {}", path.display());
    Ok(settings)
}

fn load_script(cli: &Cli) -> Result<Script> {
    if !cli.has_script() {
        info!("no script given, rendering a single frame");
        return Ok(Script::default());
    }
    let source = match &cli.script {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?,
        None => cli.events.clone().unwrap_or_default(),
    };
    Script::parse(&source).context("failed to parse event script")
}

fn run_headless(cli: &Cli, settings: ConfiguratorSettings) -> Result<()> {
    let script = load_script(cli)?;
    let renderer = HeadlessRenderer::new(cli.width.max(1), cli.height.max(1));
    let mut view = ConfiguratorView::new(settings, VehicleModel::new(), renderer);
    if let Some(dir) = &cli.screenshot_dir {
        view = view.with_screenshot_dir(dir);
    }
    view.mount();

    println!(
        "Running {} script step(s) at {} fps on a {}x{} software surface",
        script.steps().len(),
        cli.fps,
        cli.width.max(1),
        cli.height.max(1)
    );
    let summary = script
        .run(&mut view, cli.fps)
        .context("headless session failed")?;
    print_summary(&summary);
    print_final_state(&view);
    Ok(())
}

fn run_interactive(cli: &Cli, settings: ConfiguratorSettings) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;

    let mut app = App::new(cli, settings);
    println!("Configurator controls:");
    for (key, command) in app.bindings.entries() {
        println!("  {key:<6} {command}");
    }
    event_loop
        .run_app(&mut app)
        .context("event loop terminated abnormally")?;

    if let Some(view) = &app.view {
        print_final_state(view);
    }
    match app.last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct App {
    settings: ConfiguratorSettings,
    screenshot_dir: Option<PathBuf>,
    size: (u32, u32),
    bindings: KeyBindings,
    timer: FrameTimer,
    view: Option<ConfiguratorView<NativeRenderer, VehicleModel>>,
    last_error: Option<anyhow::Error>,
}

impl App {
    fn new(cli: &Cli, settings: ConfiguratorSettings) -> Self {
        Self {
            settings,
            screenshot_dir: cli.screenshot_dir.clone(),
            size: (cli.width.max(1), cli.height.max(1)),
            bindings: KeyBindings::default(),
            timer: FrameTimer::new(),
            view: None,
            last_error: None,
        }
    }

    fn create_view(
        &self,
        event_loop: &ActiveEventLoop,
    ) -> Result<ConfiguratorView<NativeRenderer, VehicleModel>> {
        let window = event_loop
            .create_window(
                Window::default_attributes()
                    .with_title("Vehicle Configurator")
                    .with_inner_size(LogicalSize::new(self.size.0 as f64, self.size.1 as f64)),
            )
            .map_err(|err| WindowInitError::from_error("window", err))?;
        let renderer = block_on(NativeRenderer::new(Arc::new(window)))?;
        let mut view = ConfiguratorView::new(self.settings.clone(), VehicleModel::new(), renderer);
        if let Some(dir) = &self.screenshot_dir {
            view = view.with_screenshot_dir(dir);
        }
        view.mount();
        Ok(view)
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.last_error = Some(err);
        event_loop.exit();
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        let Some(command) = map_key(&event.logical_key).and_then(|key| self.bindings.command(key))
        else {
            return;
        };
        let Some(view) = self.view.as_mut() else {
            return;
        };
        info!("key command: {command}");
        if view.execute(command) == CommandOutcome::Quit {
            event_loop.exit();
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let delta = self.timer.tick();
        let Some(view) = self.view.as_mut() else {
            return;
        };
        match view.frame(delta) {
            Ok(outcome) => {
                for path in outcome.screenshots.into_iter().flatten() {
                    println!("Saved screenshot {}", path.display());
                }
            }
            Err(err) => self.fail(event_loop, err.into()),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.view.is_some() {
            return;
        }
        match self.create_view(event_loop) {
            Ok(view) => {
                self.timer.reset();
                self.view = Some(view);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let ours = self
            .view
            .as_ref()
            .is_some_and(|view| view.renderer().window_id() == window_id);
        if !ours {
            return;
        }
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(view) = self.view.as_mut() {
                    view.renderer_mut().resize(size.width, size.height);
                }
            }
            WindowEvent::Occluded(occluded) => {
                if let Some(view) = self.view.as_mut() {
                    view.set_visible(!occluded);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, &event),
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(view) = &self.view {
            view.renderer().window().request_redraw();
        }
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

fn print_summary(summary: &ScriptSummary) {
    println!(
        "Simulated {} frame(s) ({:.2}s), {} event(s), {} tick failure(s)",
        summary.frames, summary.simulated_seconds, summary.events, summary.tick_failures
    );
    for path in &summary.screenshots {
        println!("Saved screenshot {}", path.display());
    }
    if summary.screenshot_failures > 0 {
        println!("{} screenshot(s) failed", summary.screenshot_failures);
    }
}

fn print_final_state<R: Renderer>(view: &ConfiguratorView<R, VehicleModel>) {
    let state = view.state();
    let optional = |color: Option<configurator_runtime::Color>| {
        color.map_or_else(|| "default".to_string(), |c| c.to_string())
    };
    let menu = view.active_menu().map_or("none", |menu| menu.name());
    let pose = view.camera_pose();
    let camera_state = match view.camera_state() {
        CameraState::Idle { .. } => "idle",
        CameraState::Transitioning { .. } => "transitioning",
    };
    let angles = view.particle_angles();

    println!("Final configuration:");
    println!(
        " - body={} rims={} glass={}",
        state.body_color,
        optional(state.rim_color),
        optional(state.glass_tint)
    );
    println!(
        " - menu={menu} view={} visible={}",
        state.showcase_view, state.visible
    );
    println!(
        " - camera pos=({:.2}, {:.2}, {:.2}) {camera_state}",
        pose.position.x, pose.position.y, pose.position.z
    );
    println!(" - model rotation_y={:.3}", view.rotation_y());
    println!(" - particles rotation=({:.3}, {:.3})", angles.x, angles.y);
}

fn map_key(key: &Key) -> Option<KeyCode> {
    match key {
        Key::Named(named) => {
            let named = match named {
                WinitNamedKey::Space => NamedKey::Space,
                WinitNamedKey::Enter => NamedKey::Enter,
                WinitNamedKey::Tab => NamedKey::Tab,
                WinitNamedKey::ArrowLeft => NamedKey::Left,
                WinitNamedKey::ArrowRight => NamedKey::Right,
                WinitNamedKey::Escape => NamedKey::Escape,
                _ => return None,
            };
            Some(KeyCode::Named(named))
        }
        Key::Character(text) => KeyCode::from_name(text.as_str()),
        _ => None,
    }
}
