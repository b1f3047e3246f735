use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Screen pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned element bounds in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn center(&self) -> Point {
        Point::new((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }
}

/// How an element is looked up on the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Locator {
    /// Stable programmer-assigned identifier (testID / resource-id / accessibilityIdentifier).
    Id(String),
    /// Visible text.
    Text(String),
    /// Accessibility label / content description.
    Label(String),
    /// Native view class, used for generic scroll containers.
    Type(String),
}

impl Locator {
    pub fn strategy(&self) -> &'static str {
        match self {
            Locator::Id(_) => "identifier",
            Locator::Text(_) => "text",
            Locator::Label(_) => "label",
            Locator::Type(_) => "type",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Locator::Id(v) | Locator::Text(v) | Locator::Label(v) | Locator::Type(v) => v,
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.strategy(), self.value())
    }
}

/// A located element. Drivers may attach bounds so gestures can be replayed
/// without another lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRef {
    pub locator: Locator,
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Lenient parse of a model-provided direction; unknown values yield None.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gesture", rename_all = "snake_case")]
pub enum Gesture {
    Tap,
    TypeText { text: String },
    ClearText,
    Scroll { pixels: u32, direction: Direction },
    Swipe { direction: Direction },
    LongPress,
}

/// Mobile platform, when known. Drives the choice of native container types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Android,
    Ios,
}

/// One captured still frame.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub image_bytes: Vec<u8>,
    pub stored_path: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
}

impl CapturedFrame {
    /// Build a frame from encoded image bytes, reading the dimensions from the header.
    pub fn from_image_bytes(image_bytes: Vec<u8>, stored_path: Option<PathBuf>) -> crate::errors::TapsightResult<Self> {
        let (width, height) = image::ImageReader::new(std::io::Cursor::new(&image_bytes))
            .with_guessed_format()?
            .into_dimensions()?;
        Ok(Self {
            image_bytes,
            stored_path,
            width,
            height,
        })
    }

    /// `data:` URL suitable for an `image_url` message part.
    pub fn data_url(&self) -> String {
        use base64::Engine as _;
        let b64 = base64::engine::general_purpose::STANDARD.encode(&self.image_bytes);
        let mime = if self.image_bytes.starts_with(&[0xFF, 0xD8]) {
            "image/jpeg"
        } else {
            "image/png"
        };
        format!("data:{mime};base64,{b64}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::new(width, height);
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_frame_dimensions_from_png() {
        let frame = CapturedFrame::from_image_bytes(tiny_png(12, 30), None).unwrap();
        assert_eq!((frame.width, frame.height), (12, 30));
        assert!(frame.data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        assert!(CapturedFrame::from_image_bytes(b"not an image".to_vec(), None).is_err());
    }

    #[test]
    fn test_bounds_center() {
        let b = Bounds { left: 0, top: 100, right: 200, bottom: 300 };
        assert_eq!(b.center(), Point::new(100, 200));
        assert!(!b.is_empty());
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(Direction::parse(" Down "), Some(Direction::Down));
        assert_eq!(Direction::parse("sideways"), None);
    }
}
