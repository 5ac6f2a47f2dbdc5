use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "configurator-runtime")]
#[command(about = "Interactive 3D vehicle configurator", long_about = None)]
pub struct Cli {
    /// Settings document (<configurator> XML)
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Run without a window on the software renderer
    #[arg(long = "headless", default_value = "false")]
    pub headless: bool,

    /// Event script to play in headless mode
    #[arg(long = "script", conflicts_with = "events")]
    pub script: Option<PathBuf>,

    /// Inline event script, e.g. "menu:rims, wait:2, screenshot"
    #[arg(long = "events")]
    pub events: Option<String>,

    /// Tick rate used by headless waits
    #[arg(long = "fps", default_value_t = 60.0)]
    pub fps: f32,

    /// Directory receiving screenshots
    #[arg(long = "screenshot-dir")]
    pub screenshot_dir: Option<PathBuf>,

    /// Surface width in pixels
    #[arg(long = "width", default_value_t = 1280)]
    pub width: u32,

    /// Surface height in pixels
    #[arg(long = "height", default_value_t = 720)]
    pub height: u32,
}

impl Cli {
    /// Whether a scripted session was requested.
    pub fn has_script(&self) -> bool {
        self.script.is_some() || self.events.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_an_interactive_session() {
        let cli = Cli::try_parse_from(["configurator-runtime"]).unwrap();
        assert!(!cli.headless);
        assert!(!cli.has_script());
        assert_eq!(cli.fps, 60.0);
        assert_eq!((cli.width, cli.height), (1280, 720));
    }

    #[test]
    fn parses_headless_flags() {
        let cli = Cli::try_parse_from([
            "configurator-runtime",
            "--headless",
            "--events",
            "menu:rims, wait:1",
            "--fps",
            "30",
            "--screenshot-dir",
            "shots",
            "--width",
            "320",
        ])
        .unwrap();
        assert!(cli.headless && cli.has_script());
        assert_eq!(cli.events.as_deref(), Some("menu:rims, wait:1"));
        assert_eq!(cli.fps, 30.0);
        assert_eq!(cli.screenshot_dir, Some(PathBuf::from("shots")));
        assert_eq!(cli.width, 320);
    }

    #[test]
    fn script_file_and_inline_events_conflict() {
        let result = Cli::try_parse_from([
            "configurator-runtime",
            "--script",
            "a.txt",
            "--events",
            "hide",
        ]);
        assert!(result.is_err());
    }
}
