use std::path::PathBuf;

use thiserror::Error;

/// Failure to interpret a color literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorParseError {
    #[error("color literal is empty")]
    Empty,
    #[error("`{0}` is not a #RGB or #RRGGBB hex color")]
    InvalidHex(String),
    #[error("`{0}` does not contain three color components")]
    MissingComponents(String),
    #[error("color component `{0}` is not an integer in 0..=255")]
    InvalidComponent(String),
}

/// Failure while reading configurator settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid settings XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("settings document must have a <configurator> root, found <{0}>")]
    UnexpectedRoot(String),
    #[error("<{tag}> is missing the `{attribute}` attribute")]
    MissingAttribute { tag: String, attribute: String },
    #[error("invalid value `{value}` for {field}")]
    InvalidValue { field: String, value: String },
    #[error("unknown menu `{0}`")]
    UnknownMenu(String),
    #[error("invalid color for {field}: {source}")]
    Color {
        field: String,
        #[source]
        source: ColorParseError,
    },
    #[error("{0} palette must contain at least one swatch")]
    EmptyPalette(&'static str),
}

/// Failure reported by a frame clock subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TickError {
    #[error("{0} is already borrowed")]
    Busy(&'static str),
    #[error("{subscriber} panicked: {message}")]
    Panicked { subscriber: String, message: String },
    #[error("{0}")]
    Failed(String),
}

/// Failure raised by a renderer implementation.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("drawing surface is unavailable: {0}")]
    SurfaceUnavailable(String),
    #[error("nothing has been drawn yet")]
    NothingDrawn,
    #[error("GPU is out of memory")]
    OutOfMemory,
    #[error("frame readback failed: {0}")]
    Readback(String),
}

/// Failure while capturing or saving a screenshot.
#[derive(Debug, Error)]
pub enum ScreenshotError {
    #[error("screenshot capture failed: {0}")]
    Capture(#[from] RenderError),
    #[error("unable to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("captured frame has {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },
    #[error("no screenshot directory is configured")]
    NoDirectory,
}

/// Failure while parsing a scripted session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("line {line}: unknown command `{command}`")]
    UnknownCommand { line: usize, command: String },
    #[error("line {line}: {message}")]
    InvalidArgument { line: usize, message: String },
}
