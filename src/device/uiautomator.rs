//! Parsing of `uiautomator dump` view hierarchies.

use std::sync::OnceLock;

use regex::Regex;

use crate::device::types::{Bounds, Locator};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UiNode {
    pub resource_id: String,
    pub text: String,
    pub content_desc: String,
    pub class: String,
    pub scrollable: bool,
    pub bounds: Option<Bounds>,
}

impl UiNode {
    fn matches(&self, locator: &Locator) -> bool {
        if locator.value().trim().is_empty() {
            return false;
        }
        match locator {
            Locator::Id(id) => {
                self.resource_id == *id || self.resource_id.ends_with(&format!(":id/{id}"))
            }
            Locator::Text(text) => eq_ignore_case(&self.text, text),
            Locator::Label(label) => eq_ignore_case(&self.content_desc, label),
            Locator::Type(class) => self.class == *class,
        }
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    !a.is_empty() && a.to_lowercase() == b.to_lowercase()
}

fn node_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<node\s([^>]*?)/?>").expect("static regex"))
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([\w:-]+)="([^"]*)""#).expect("static regex"))
}

fn bounds_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]").expect("static regex")
    })
}

/// Parse every `<node>` of a dump in document order. Anything outside the
/// XML (adb prints a trailer line after the dump) is ignored.
pub fn parse_dump(xml: &str) -> Vec<UiNode> {
    node_re()
        .captures_iter(xml)
        .map(|cap| {
            let mut node = UiNode::default();
            for attr in attr_re().captures_iter(&cap[1]) {
                let value = unescape(&attr[2]);
                match &attr[1] {
                    "resource-id" => node.resource_id = value,
                    "text" => node.text = value,
                    "content-desc" => node.content_desc = value,
                    "class" => node.class = value,
                    "scrollable" => node.scrollable = value == "true",
                    "bounds" => node.bounds = parse_bounds(&value),
                    _ => {}
                }
            }
            node
        })
        .collect()
}

fn parse_bounds(raw: &str) -> Option<Bounds> {
    let cap = bounds_re().captures(raw)?;
    Some(Bounds {
        left: cap[1].parse().ok()?,
        top: cap[2].parse().ok()?,
        right: cap[3].parse().ok()?,
        bottom: cap[4].parse().ok()?,
    })
}

fn unescape(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#10;", "\n")
        .replace("&amp;", "&")
}

/// First on-screen node matching the locator.
pub fn find<'a>(nodes: &'a [UiNode], locator: &Locator) -> Option<&'a UiNode> {
    nodes
        .iter()
        .find(|n| n.bounds.is_some_and(|b| !b.is_empty()) && n.matches(locator))
}
