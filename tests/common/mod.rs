#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tapsight_lib::device::traits::{ScreenCapture, UiDriver};
use tapsight_lib::device::types::{CapturedFrame, ElementRef, Gesture, Locator, Point};
use tapsight_lib::errors::{TapsightError, TapsightResult};
use tapsight_lib::llm::provider::LlmProvider;
use tapsight_lib::llm::types::{CallConfig, ChatMessage, LlmResponse};
use tapsight_lib::vision::client::VisionClient;

pub fn frame() -> CapturedFrame {
    let img = image::RgbImage::new(360, 640);
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    CapturedFrame::from_image_bytes(buf.into_inner(), None).unwrap()
}

/// Model double answering from a fixed transcript.
pub struct Transcript {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl Transcript {
    pub fn new<I: IntoIterator<Item = String>>(replies: I) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for Transcript {
    fn name(&self) -> &str {
        "transcript"
    }

    async fn chat(&self, messages: Vec<ChatMessage>, _cfg: &CallConfig) -> TapsightResult<LlmResponse> {
        if let Some(last) = messages.last() {
            self.prompts.lock().unwrap().push(last.text());
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .map(|content| LlmResponse {
                content,
                reasoning: String::new(),
            })
            .ok_or_else(|| TapsightError::LlmProvider("transcript exhausted".into()))
    }
}

pub fn vision(transcript: Arc<Transcript>) -> VisionClient {
    VisionClient::new(
        transcript,
        CallConfig {
            model: "scripted".into(),
            stream: false,
            temperature: 0.0,
        },
    )
}

/// Device double: the listed locators exist, every operation is recorded.
#[derive(Default)]
pub struct Phone {
    present: HashSet<Locator>,
    ops: Mutex<Vec<String>>,
}

impl Phone {
    pub fn with_ids(ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            present: ids.iter().map(|id| Locator::Id(id.to_string())).collect(),
            ops: Mutex::new(Vec::new()),
        })
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    /// Element operations only, without lookups and captures.
    pub fn actions(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter(|op| !op.starts_with("find ") && !op.starts_with("capture "))
            .collect()
    }

    fn push(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl ScreenCapture for Phone {
    async fn capture_screen(&self, name: &str) -> TapsightResult<CapturedFrame> {
        self.push(format!("capture {name}"));
        Ok(frame())
    }
}

#[async_trait]
impl UiDriver for Phone {
    async fn find(&self, locator: &Locator) -> TapsightResult<Option<ElementRef>> {
        self.push(format!("find {locator}"));
        Ok(self.present.contains(locator).then(|| ElementRef {
            locator: locator.clone(),
            bounds: None,
        }))
    }

    async fn perform(&self, element: &ElementRef, gesture: &Gesture) -> TapsightResult<()> {
        self.push(format!("{gesture:?} {}", element.locator.value()));
        Ok(())
    }

    async fn tap_at(&self, point: Point) -> TapsightResult<()> {
        self.push(format!("tap_at {},{}", point.x, point.y));
        Ok(())
    }

    async fn long_press_at(&self, point: Point) -> TapsightResult<()> {
        self.push(format!("long_press_at {},{}", point.x, point.y));
        Ok(())
    }

    async fn type_into_focused(&self, text: &str) -> TapsightResult<()> {
        self.push(format!("type_focused {text}"));
        Ok(())
    }

    async fn press_back(&self) -> TapsightResult<()> {
        self.push("back".to_string());
        Ok(())
    }
}
