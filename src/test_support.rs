//! Scripted fakes shared by the unit tests.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::device::traits::{ScreenCapture, UiDriver};
use crate::device::types::{CapturedFrame, ElementRef, Gesture, Locator, Point};
use crate::errors::{TapsightError, TapsightResult};
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse};

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::new(width, height);
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .expect("encode png");
    buf.into_inner()
}

/// 100x200 black frame.
pub fn png_frame() -> CapturedFrame {
    CapturedFrame::from_image_bytes(png_bytes(100, 200), None).expect("valid png")
}

/// Replies with canned strings in order; errors once the script runs out.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, messages: Vec<ChatMessage>, _cfg: &CallConfig) -> TapsightResult<LlmResponse> {
        self.calls.lock().unwrap().push(messages);
        match self.replies.lock().unwrap().pop_front() {
            Some(content) => Ok(LlmResponse {
                content,
                reasoning: String::new(),
            }),
            None => Err(TapsightError::LlmProvider("script exhausted".into())),
        }
    }
}

/// In-memory device. Lookups succeed for the registered locators; every call is logged.
#[derive(Default)]
pub struct FakeDevice {
    present: Mutex<HashSet<Locator>>,
    log: Mutex<Vec<String>>,
    broken_lookups: HashSet<String>,
    fail_back: bool,
    fail_tap_at: bool,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, locators: impl IntoIterator<Item = Locator>) -> Self {
        self.present.lock().unwrap().extend(locators);
        self
    }

    /// Lookups for `value` (any strategy) fail with a transport error.
    pub fn failing_find(mut self, value: &str) -> Self {
        self.broken_lookups.insert(value.to_string());
        self
    }

    pub fn failing_back(mut self) -> Self {
        self.fail_back = true;
        self
    }

    pub fn failing_tap_at(mut self) -> Self {
        self.fail_tap_at = true;
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl ScreenCapture for FakeDevice {
    async fn capture_screen(&self, name: &str) -> TapsightResult<CapturedFrame> {
        self.record(format!("capture {name}"));
        Ok(png_frame())
    }
}

#[async_trait]
impl UiDriver for FakeDevice {
    async fn find(&self, locator: &Locator) -> TapsightResult<Option<ElementRef>> {
        self.record(format!("find {locator}"));
        if self.broken_lookups.contains(locator.value()) {
            return Err(TapsightError::Device("uiautomator dump failed".into()));
        }
        Ok(self
            .present
            .lock()
            .unwrap()
            .contains(locator)
            .then(|| ElementRef {
                locator: locator.clone(),
                bounds: None,
            }))
    }

    async fn perform(&self, element: &ElementRef, gesture: &Gesture) -> TapsightResult<()> {
        let name = match gesture {
            Gesture::Tap => "tap".to_string(),
            Gesture::TypeText { text } => format!("type {text:?}"),
            Gesture::ClearText => "clear".to_string(),
            Gesture::Scroll { pixels, direction } => format!("scroll {pixels} {direction:?}"),
            Gesture::Swipe { direction } => format!("swipe {direction:?}"),
            Gesture::LongPress => "long_press".to_string(),
        };
        self.record(format!("{name} {}", element.locator));
        Ok(())
    }

    async fn tap_at(&self, point: Point) -> TapsightResult<()> {
        self.record(format!("tap_at {},{}", point.x, point.y));
        if self.fail_tap_at {
            return Err(TapsightError::Device("tap rejected".into()));
        }
        Ok(())
    }

    async fn long_press_at(&self, point: Point) -> TapsightResult<()> {
        self.record(format!("long_press_at {},{}", point.x, point.y));
        Ok(())
    }

    async fn type_into_focused(&self, text: &str) -> TapsightResult<()> {
        self.record(format!("type_focused {text:?}"));
        Ok(())
    }

    async fn press_back(&self) -> TapsightResult<()> {
        self.record("back".to_string());
        if self.fail_back {
            return Err(TapsightError::Device("no back stack".into()));
        }
        Ok(())
    }
}
