//! Named-event side channel and PNG output for screenshots.

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use chrono::Local;
use log::{debug, info};

use crate::error::ScreenshotError;
use crate::render::FrameCapture;

/// Event that asks a mounted view to capture and save its surface.
pub const SCREENSHOT_EVENT: &str = "configurator:screenshot";

#[derive(Debug, Default)]
struct ChannelInner {
    next_id: u64,
    listeners: Vec<Listener>,
}

#[derive(Debug)]
struct Listener {
    id: u64,
    event: String,
    pending: usize,
}

/// Single-threaded broadcast of named, payload-free events.
#[derive(Debug, Clone, Default)]
pub struct SideChannel {
    inner: Rc<RefCell<ChannelInner>>,
}

impl SideChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts listening for `event`. Dropping the subscription stops it.
    pub fn listen(&self, event: &str) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push(Listener {
            id,
            event: event.to_string(),
            pending: 0,
        });
        Subscription {
            channel: Rc::downgrade(&self.inner),
            id,
            event: event.to_string(),
        }
    }

    /// Queues `event` for every current listener. Returns how many were notified.
    pub fn emit(&self, event: &str) -> usize {
        let mut inner = self.inner.borrow_mut();
        let mut notified = 0;
        for listener in inner.listeners.iter_mut().filter(|l| l.event == event) {
            listener.pending += 1;
            notified += 1;
        }
        if notified == 0 {
            debug!("no listener for {event}");
        }
        notified
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .borrow()
            .listeners
            .iter()
            .filter(|l| l.event == event)
            .count()
    }
}

/// Registration of one listener. Deregisters on drop.
#[derive(Debug)]
pub struct Subscription {
    channel: Weak<RefCell<ChannelInner>>,
    id: u64,
    event: String,
}

impl Subscription {
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Number of events received since the previous drain.
    pub fn drain(&self) -> usize {
        let Some(channel) = self.channel.upgrade() else {
            return 0;
        };
        let mut inner = channel.borrow_mut();
        inner
            .listeners
            .iter_mut()
            .find(|l| l.id == self.id)
            .map_or(0, |l| std::mem::take(&mut l.pending))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.upgrade() {
            if let Ok(mut inner) = channel.try_borrow_mut() {
                inner.listeners.retain(|l| l.id != self.id);
            }
        }
    }
}

/// Writes captured frames as timestamped PNG files.
#[derive(Debug, Clone)]
pub struct ScreenshotWriter {
    directory: PathBuf,
}

impl ScreenshotWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Saves `frame` as `configurator-<timestamp>.png` and returns its path.
    pub fn save(&self, frame: &FrameCapture) -> Result<PathBuf, ScreenshotError> {
        fs::create_dir_all(&self.directory).map_err(|source| ScreenshotError::Io {
            path: self.directory.clone(),
            source,
        })?;
        let path = self.next_path();
        let file = File::create(&path).map_err(|source| ScreenshotError::Io {
            path: path.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        write_png(&mut writer, frame)?;
        writer.flush().map_err(|source| ScreenshotError::Io {
            path: path.clone(),
            source,
        })?;
        info!("saved screenshot {}", path.display());
        Ok(path)
    }

    fn next_path(&self) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d-%H%M%S%.3f");
        let candidate = self.directory.join(format!("configurator-{stamp}.png"));
        if !candidate.exists() {
            return candidate;
        }
        (1..)
            .map(|n| self.directory.join(format!("configurator-{stamp}-{n}.png")))
            .find(|path| !path.exists())
            .unwrap_or(candidate)
    }
}

/// Encodes `frame` as an 8-bit RGBA PNG.
pub fn write_png<W: Write>(writer: W, frame: &FrameCapture) -> Result<(), ScreenshotError> {
    let expected = frame.expected_len();
    if frame.rgba.len() != expected {
        return Err(ScreenshotError::FrameSize {
            expected,
            actual: frame.rgba.len(),
        });
    }
    let mut encoder = png::Encoder::new(writer, frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(&frame.rgba)?;
    png_writer.finish()?;
    Ok(())
}
