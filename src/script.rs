//! Scripted sessions for headless runs.
//!
//! A script is a list of commands separated by commas or newlines; `#` starts
//! a comment. Commands:
//!
//! ```text
//! menu:<body|rims|glass>   toggle a menu
//! body:<color>             pick the body color
//! rim:<color|none>         pick or clear the rim color
//! glass:<color|none>       pick or clear the glass tint
//! view:<index>             select a showcase view
//! wait:<seconds>           advance time at the runner's tick rate
//! hide / show              change visibility
//! screenshot               emit the screenshot event
//! ```
//!
//! Colors inside scripts must be hex literals since commas separate commands.
//! A `#` directly after the colon belongs to the color, anywhere else it
//! starts a comment.

use std::path::PathBuf;

use log::{debug, info};

use crate::color::Color;
use crate::configuration::{MenuId, UiEvent};
use crate::error::{RenderError, ScriptError};
use crate::render::Renderer;
use crate::scene::ModelFactory;
use crate::view::ConfiguratorView;

/// Longest single `wait` a script may request, in seconds.
pub const MAX_WAIT_SECONDS: f32 = 3600.0;

/// Highest tick rate the runner simulates.
pub const MAX_FPS: f32 = 1000.0;

/// One parsed script command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptStep {
    Event(UiEvent),
    Wait(f32),
    Hide,
    Show,
    Screenshot,
}

/// Totals reported after a script ran to completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptSummary {
    pub frames: u64,
    pub simulated_seconds: f32,
    pub events: usize,
    pub tick_failures: usize,
    pub screenshots: Vec<PathBuf>,
    pub screenshot_failures: usize,
}

/// Parsed list of steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    steps: Vec<ScriptStep>,
}

impl Script {
    pub fn parse(source: &str) -> Result<Self, ScriptError> {
        let mut steps = Vec::new();
        for (index, raw_line) in source.lines().enumerate() {
            let line = index + 1;
            let content = strip_comment(raw_line);
            for command in content.split(',').map(str::trim).filter(|c| !c.is_empty()) {
                steps.push(parse_command(line, command)?);
            }
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Plays the script against `view`, ticking at `fps` (at most [`MAX_FPS`])
    /// during waits. A final zero-length frame serves any screenshot requested
    /// by the last commands.
    pub fn run<R, M>(
        &self,
        view: &mut ConfiguratorView<R, M>,
        fps: f32,
    ) -> Result<ScriptSummary, RenderError>
    where
        R: Renderer,
        M: ModelFactory,
    {
        let fps = if fps.is_finite() && fps > 0.0 {
            fps.min(MAX_FPS)
        } else {
            60.0
        };
        let step_delta = 1.0 / fps;
        let mut summary = ScriptSummary::default();

        for step in &self.steps {
            debug!("script step {step:?}");
            match *step {
                ScriptStep::Event(event) => {
                    view.handle(event);
                    summary.events += 1;
                }
                ScriptStep::Wait(seconds) => {
                    let frames = (seconds.clamp(0.0, MAX_WAIT_SECONDS) * fps).round() as u64;
                    for _ in 0..frames {
                        run_frame(view, step_delta, &mut summary)?;
                    }
                }
                ScriptStep::Hide => view.set_visible(false),
                ScriptStep::Show => view.set_visible(true),
                ScriptStep::Screenshot => {
                    view.request_screenshot();
                }
            }
        }
        run_frame(view, 0.0, &mut summary)?;

        info!(
            "script finished after {} frames ({:.2}s simulated)",
            summary.frames, summary.simulated_seconds
        );
        Ok(summary)
    }
}

fn run_frame<R: Renderer, M: ModelFactory>(
    view: &mut ConfiguratorView<R, M>,
    delta: f32,
    summary: &mut ScriptSummary,
) -> Result<(), RenderError> {
    let outcome = view.frame(delta)?;
    if let Some(report) = outcome.report {
        summary.frames += 1;
        summary.simulated_seconds += report.delta;
        summary.tick_failures += report.failures.len();
    }
    for result in outcome.screenshots {
        match result {
            Ok(path) => summary.screenshots.push(path),
            Err(_) => summary.screenshot_failures += 1,
        }
    }
    Ok(())
}

/// Cuts the line at the first `#` that is not the start of a color argument.
fn strip_comment(line: &str) -> &str {
    let mut previous = None;
    for (index, ch) in line.char_indices() {
        if ch == '#' && previous != Some(':') {
            return &line[..index];
        }
        if !ch.is_whitespace() {
            previous = Some(ch);
        }
    }
    line
}

fn parse_command(line: usize, command: &str) -> Result<ScriptStep, ScriptError> {
    let (name, argument) = match command.split_once(':') {
        Some((name, argument)) => (name.trim(), Some(argument.trim())),
        None => (command, None),
    };
    let invalid = |message: String| ScriptError::InvalidArgument { line, message };
    let require = || {
        argument
            .filter(|value| !value.is_empty())
            .ok_or_else(|| invalid(format!("`{name}` needs an argument")))
    };

    let step = match name.to_ascii_lowercase().as_str() {
        "menu" => {
            let value = require()?;
            let menu = MenuId::from_name(value)
                .ok_or_else(|| invalid(format!("unknown menu `{value}`")))?;
            ScriptStep::Event(UiEvent::ToggleMenu(menu))
        }
        "body" => ScriptStep::Event(UiEvent::SelectBodyColor(parse_color(line, require()?)?)),
        "rim" | "rims" => match require()? {
            value if value.eq_ignore_ascii_case("none") => {
                ScriptStep::Event(UiEvent::ClearRimColor)
            }
            value => ScriptStep::Event(UiEvent::SelectRimColor(parse_color(line, value)?)),
        },
        "glass" => match require()? {
            value if value.eq_ignore_ascii_case("none") => {
                ScriptStep::Event(UiEvent::ClearGlassTint)
            }
            value => ScriptStep::Event(UiEvent::SelectGlassTint(parse_color(line, value)?)),
        },
        "view" => {
            let value = require()?;
            let index = value
                .parse::<usize>()
                .map_err(|_| invalid(format!("`{value}` is not a view index")))?;
            ScriptStep::Event(UiEvent::SelectView(index))
        }
        "wait" => {
            let value = require()?;
            let seconds = value
                .parse::<f32>()
                .ok()
                .filter(|s| s.is_finite() && *s >= 0.0)
                .ok_or_else(|| invalid(format!("`{value}` is not a duration in seconds")))?;
            if seconds > MAX_WAIT_SECONDS {
                return Err(invalid(format!(
                    "wait of {seconds}s exceeds the {MAX_WAIT_SECONDS}s limit"
                )));
            }
            ScriptStep::Wait(seconds)
        }
        "hide" => ScriptStep::Hide,
        "show" => ScriptStep::Show,
        "screenshot" => ScriptStep::Screenshot,
        _ => {
            return Err(ScriptError::UnknownCommand {
                line,
                command: command.to_string(),
            })
        }
    };
    Ok(step)
}

fn parse_color(line: usize, value: &str) -> Result<Color, ScriptError> {
    Color::parse(value).map_err(|err| ScriptError::InvalidArgument {
        line,
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessRenderer;
    use crate::scene::VehicleModel;
    use crate::settings::ConfiguratorSettings;

    #[test]
    fn parses_commands_across_lines_and_commas() {
        let script = Script::parse(
            "menu:rims, wait:2.0\n# a comment line\nbody:#1E1E1E, rim:none # trailing\nglass:#333333,view:1\nhide,show,screenshot",
        )
        .unwrap();
        assert_eq!(
            script.steps(),
            &[
                ScriptStep::Event(UiEvent::ToggleMenu(MenuId::Rims)),
                ScriptStep::Wait(2.0),
                ScriptStep::Event(UiEvent::SelectBodyColor(Color::rgb(0x1E, 0x1E, 0x1E))),
                ScriptStep::Event(UiEvent::ClearRimColor),
                ScriptStep::Event(UiEvent::SelectGlassTint(Color::rgb(0x33, 0x33, 0x33))),
                ScriptStep::Event(UiEvent::SelectView(1)),
                ScriptStep::Hide,
                ScriptStep::Show,
                ScriptStep::Screenshot,
            ]
        );
    }

    #[test]
    fn hex_colors_are_not_comments() {
        assert_eq!(strip_comment("body:#FFF # white"), "body:#FFF ");
        assert_eq!(strip_comment("glass: #333333"), "glass: #333333");
        assert_eq!(strip_comment("# only a comment"), "");
        assert_eq!(strip_comment("hide,#show"), "hide,");
    }

    #[test]
    fn reports_the_offending_line() {
        let err = Script::parse("menu:body\nspin:3").unwrap_err();
        assert_eq!(
            err,
            ScriptError::UnknownCommand {
                line: 2,
                command: "spin:3".into()
            }
        );

        let err = Script::parse("wait:-1").unwrap_err();
        assert!(matches!(err, ScriptError::InvalidArgument { line: 1, .. }));
        let err = Script::parse("wait:1e30").unwrap_err();
        assert!(matches!(err, ScriptError::InvalidArgument { line: 1, .. }));
        assert_eq!(
            Script::parse("wait:3600").unwrap().steps(),
            &[ScriptStep::Wait(MAX_WAIT_SECONDS)]
        );
        let err = Script::parse("menu:roof").unwrap_err();
        assert!(matches!(err, ScriptError::InvalidArgument { line: 1, .. }));
        let err = Script::parse("body").unwrap_err();
        assert!(matches!(err, ScriptError::InvalidArgument { line: 1, .. }));
    }

    #[test]
    fn runs_waits_at_the_requested_rate() {
        let mut settings = ConfiguratorSettings::default();
        settings.particles.count = 100;
        let mut view =
            ConfiguratorView::new(settings, VehicleModel::new(), HeadlessRenderer::new(32, 24));
        view.mount();

        let script = Script::parse("menu:glass, wait:0.5, rim:#D4AF37").unwrap();
        let summary = script.run(&mut view, 30.0).unwrap();

        assert_eq!(summary.frames, 16);
        assert!((summary.simulated_seconds - 0.5).abs() < 1e-4);
        assert_eq!(summary.events, 2);
        assert_eq!(view.active_menu(), Some(MenuId::Glass));
        assert_eq!(view.state().rim_color, Some(Color::rgb(0xD4, 0xAF, 0x37)));
        assert_eq!(
            view.last_scene().unwrap().model().unwrap().rims.color,
            Color::rgb(0xD4, 0xAF, 0x37)
        );
    }

    #[test]
    fn runner_bounds_frames_per_wait() {
        let mut settings = ConfiguratorSettings::default();
        settings.particles.count = 10;
        let mut view =
            ConfiguratorView::new(settings, VehicleModel::new(), HeadlessRenderer::new(4, 4));
        view.mount();

        let script = Script {
            steps: vec![ScriptStep::Wait(0.002)],
        };
        let summary = script.run(&mut view, 1.0e9).unwrap();
        assert_eq!(summary.frames, 3);
    }
}
