pub mod adb;
pub mod text_input;
pub mod traits;
pub mod types;
pub mod uiautomator;
