//! Android device backend driving the `adb` binary.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::DeviceConfig;
use crate::device::text_input::{contains_non_ascii, escape_for_input};
use crate::device::traits::{ScreenCapture, UiDriver};
use crate::device::types::{Bounds, CapturedFrame, Direction, ElementRef, Gesture, Locator, Point};
use crate::device::uiautomator::{self, UiNode};
use crate::errors::{TapsightError, TapsightResult};

const KEYCODE_BACK: &str = "4";
const KEYCODE_DEL: &str = "67";
const KEYCODE_MOVE_END: &str = "123";
/// Characters deleted by a clear. Longer field contents are truncated, not cleared.
const CLEAR_DELETE_COUNT: usize = 64;
const LONG_PRESS_MS: u32 = 1000;
const SWIPE_MS: u32 = 300;

pub struct AdbDevice {
    adb_path: String,
    serial: Option<String>,
    artifacts_dir: PathBuf,
    capture_seq: AtomicUsize,
}

impl AdbDevice {
    /// `artifacts_dir` receives the screenshots of this run.
    pub fn new(config: &DeviceConfig, artifacts_dir: PathBuf) -> Self {
        Self {
            adb_path: config.adb_path.clone(),
            serial: config.serial.clone(),
            artifacts_dir,
            capture_seq: AtomicUsize::new(0),
        }
    }

    async fn adb(&self, args: &[&str]) -> TapsightResult<Vec<u8>> {
        let mut cmd = Command::new(&self.adb_path);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(args);
        tracing::trace!(adb = %self.adb_path, ?args, "adb");

        let output = cmd.output().await.map_err(|e| {
            TapsightError::Device(format!("failed to spawn {}: {e}", self.adb_path))
        })?;
        if !output.status.success() {
            return Err(TapsightError::Device(format!(
                "adb {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }

    async fn shell_input(&self, args: &[&str]) -> TapsightResult<()> {
        let mut full = vec!["shell", "input"];
        full.extend_from_slice(args);
        self.adb(&full).await.map(|_| ())
    }

    async fn dump_hierarchy(&self) -> TapsightResult<Vec<UiNode>> {
        let raw = self.adb(&["exec-out", "uiautomator", "dump", "/dev/tty"]).await?;
        let nodes = uiautomator::parse_dump(&String::from_utf8_lossy(&raw));
        tracing::debug!(nodes = nodes.len(), "view hierarchy dumped");
        Ok(nodes)
    }

    async fn bounds_of(&self, element: &ElementRef) -> TapsightResult<Bounds> {
        if let Some(bounds) = element.bounds {
            return Ok(bounds);
        }
        let nodes = self.dump_hierarchy().await?;
        uiautomator::find(&nodes, &element.locator)
            .and_then(|n| n.bounds)
            .ok_or_else(|| TapsightError::TargetNotFound(element.locator.to_string()))
    }

    async fn swipe(&self, from: Point, to: Point, duration_ms: u32) -> TapsightResult<()> {
        let args = [
            from.x.to_string(),
            from.y.to_string(),
            to.x.to_string(),
            to.y.to_string(),
            duration_ms.to_string(),
        ];
        let mut full = vec!["swipe"];
        full.extend(args.iter().map(String::as_str));
        self.shell_input(&full).await
    }

    async fn type_text(&self, text: &str) -> TapsightResult<()> {
        if contains_non_ascii(text) {
            return Err(TapsightError::Device(format!(
                "adb input cannot type non-ASCII text: {text:?}"
            )));
        }
        if text.is_empty() {
            return Ok(());
        }
        let escaped = escape_for_input(text);
        self.shell_input(&["text", &escaped]).await
    }

    async fn clear_focused(&self) -> TapsightResult<()> {
        self.shell_input(&["keyevent", KEYCODE_MOVE_END]).await?;
        let mut args = vec!["keyevent"];
        args.extend(std::iter::repeat(KEYCODE_DEL).take(CLEAR_DELETE_COUNT));
        self.shell_input(&args).await
    }
}

/// Finger path for a swipe in `direction` across the given bounds.
fn swipe_path(bounds: Bounds, direction: Direction) -> (Point, Point) {
    let c = bounds.center();
    let dx = (bounds.right - bounds.left) * 3 / 10;
    let dy = (bounds.bottom - bounds.top) * 3 / 10;
    match direction {
        Direction::Up => (Point::new(c.x, c.y + dy), Point::new(c.x, c.y - dy)),
        Direction::Down => (Point::new(c.x, c.y - dy), Point::new(c.x, c.y + dy)),
        Direction::Left => (Point::new(c.x + dx, c.y), Point::new(c.x - dx, c.y)),
        Direction::Right => (Point::new(c.x - dx, c.y), Point::new(c.x + dx, c.y)),
    }
}

/// Finger path that scrolls content by `pixels` in `direction`: scrolling
/// down moves the finger up.
fn scroll_path(bounds: Bounds, pixels: u32, direction: Direction) -> (Point, Point) {
    let c = bounds.center();
    let d = pixels as i32 / 2;
    match direction {
        Direction::Down => (Point::new(c.x, c.y + d), Point::new(c.x, c.y - d)),
        Direction::Up => (Point::new(c.x, c.y - d), Point::new(c.x, c.y + d)),
        Direction::Right => (Point::new(c.x + d, c.y), Point::new(c.x - d, c.y)),
        Direction::Left => (Point::new(c.x - d, c.y), Point::new(c.x + d, c.y)),
    }
}

fn artifact_name(seq: usize, name: &str) -> String {
    let clean: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{seq:03}-{clean}.png")
}

#[async_trait]
impl ScreenCapture for AdbDevice {
    async fn capture_screen(&self, name: &str) -> TapsightResult<CapturedFrame> {
        let bytes = self.adb(&["exec-out", "screencap", "-p"]).await?;
        let seq = self.capture_seq.fetch_add(1, Ordering::Relaxed);

        tokio::fs::create_dir_all(&self.artifacts_dir).await?;
        let path = self.artifacts_dir.join(artifact_name(seq, name));
        tokio::fs::write(&path, &bytes).await?;

        let frame = CapturedFrame::from_image_bytes(bytes, Some(path))?;
        tracing::debug!(
            name,
            width = frame.width,
            height = frame.height,
            "screen captured"
        );
        Ok(frame)
    }
}

#[async_trait]
impl UiDriver for AdbDevice {
    async fn find(&self, locator: &Locator) -> TapsightResult<Option<ElementRef>> {
        let nodes = self.dump_hierarchy().await?;
        Ok(uiautomator::find(&nodes, locator).map(|node| ElementRef {
            locator: locator.clone(),
            bounds: node.bounds,
        }))
    }

    async fn perform(&self, element: &ElementRef, gesture: &Gesture) -> TapsightResult<()> {
        let bounds = self.bounds_of(element).await?;
        let center = bounds.center();
        tracing::debug!(element = %element.locator, ?gesture, x = center.x, y = center.y, "perform");

        match gesture {
            Gesture::Tap => self.tap_at(center).await,
            Gesture::TypeText { text } => {
                self.tap_at(center).await?;
                self.type_text(text).await
            }
            Gesture::ClearText => {
                self.tap_at(center).await?;
                self.clear_focused().await
            }
            Gesture::Scroll { pixels, direction } => {
                let (from, to) = scroll_path(bounds, *pixels, *direction);
                self.swipe(from, to, SWIPE_MS).await
            }
            Gesture::Swipe { direction } => {
                let (from, to) = swipe_path(bounds, *direction);
                self.swipe(from, to, SWIPE_MS).await
            }
            Gesture::LongPress => self.long_press_at(center).await,
        }
    }

    async fn tap_at(&self, point: Point) -> TapsightResult<()> {
        self.shell_input(&["tap", &point.x.to_string(), &point.y.to_string()])
            .await
    }

    async fn long_press_at(&self, point: Point) -> TapsightResult<()> {
        self.swipe(point, point, LONG_PRESS_MS).await
    }

    async fn type_into_focused(&self, text: &str) -> TapsightResult<()> {
        self.type_text(text).await
    }

    async fn press_back(&self) -> TapsightResult<()> {
        self.shell_input(&["keyevent", KEYCODE_BACK]).await
    }
}
