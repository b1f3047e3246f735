use crate::device::types::{CapturedFrame, Point};

/// Point at the bottom centre of the screen, outside most modal sheets.
pub fn dismiss_point(width: u32, height: u32) -> Point {
    Point::new((width / 2) as i32, (height as u64 * 9 / 10) as i32)
}

pub fn dismiss_point_for(frame: &CapturedFrame) -> Point {
    dismiss_point(frame.width, frame.height)
}
