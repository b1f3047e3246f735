use async_trait::async_trait;

use crate::device::types::{CapturedFrame, ElementRef, Gesture, Locator, Point};
use crate::errors::TapsightResult;

/// Still-frame capture from the device under test.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    /// Capture the current screen. `name` is used for the stored artifact.
    async fn capture_screen(&self, name: &str) -> TapsightResult<CapturedFrame>;
}

/// UI automation primitives. Lookups return `Ok(None)` when nothing matches;
/// `Err` is reserved for transport failures.
#[async_trait]
pub trait UiDriver: Send + Sync {
    async fn find(&self, locator: &Locator) -> TapsightResult<Option<ElementRef>>;

    async fn perform(&self, element: &ElementRef, gesture: &Gesture) -> TapsightResult<()>;

    async fn tap_at(&self, point: Point) -> TapsightResult<()>;

    async fn long_press_at(&self, point: Point) -> TapsightResult<()>;

    /// Type into whatever currently has input focus.
    async fn type_into_focused(&self, text: &str) -> TapsightResult<()>;

    /// Platform back navigation (hardware back on Android, edge swipe on iOS).
    async fn press_back(&self) -> TapsightResult<()>;
}
