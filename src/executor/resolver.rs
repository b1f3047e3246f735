use std::sync::OnceLock;

use regex::Regex;

use crate::device::types::{Locator, Platform};

const ANDROID_CONTAINERS: &[&str] = &[
    "android.widget.ScrollView",
    "androidx.recyclerview.widget.RecyclerView",
    "android.widget.ListView",
    "android.widget.HorizontalScrollView",
];

const IOS_CONTAINERS: &[&str] = &[
    "XCUIElementTypeScrollView",
    "XCUIElementTypeTable",
    "XCUIElementTypeCollectionView",
];

/// React Native's scroll view reports this class on both platforms.
const CROSS_PLATFORM_CONTAINERS: &[&str] = &["RCTScrollView"];

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("static regex"))
}

/// True for strings shaped like a stable element identifier
/// (`login-button`, `email_input`). Strings with spaces never qualify.
pub fn is_identifier(target: &str) -> bool {
    identifier_re().is_match(target)
}

/// Lookup order for tap/type/longPress targets.
pub fn primary_locators(target: &str) -> Vec<Locator> {
    let mut locators = Vec::with_capacity(3);
    if is_identifier(target) {
        locators.push(Locator::Id(target.to_string()));
    }
    locators.push(Locator::Text(target.to_string()));
    locators.push(Locator::Label(target.to_string()));
    locators
}

/// Lookup order for fallback targets: identifier, then visible text.
pub fn fallback_locators(target: &str) -> Vec<Locator> {
    let mut locators = Vec::with_capacity(2);
    if is_identifier(target) {
        locators.push(Locator::Id(target.to_string()));
    }
    locators.push(Locator::Text(target.to_string()));
    locators
}

/// Generic scroll containers to try, platform-specific ones first.
pub fn container_types(platform: Option<Platform>) -> Vec<&'static str> {
    let mut types: Vec<&'static str> = CROSS_PLATFORM_CONTAINERS.to_vec();
    match platform {
        Some(Platform::Android) => types.extend_from_slice(ANDROID_CONTAINERS),
        Some(Platform::Ios) => types.extend_from_slice(IOS_CONTAINERS),
        None => {
            types.extend_from_slice(ANDROID_CONTAINERS);
            types.extend_from_slice(IOS_CONTAINERS);
        }
    }
    types
}
