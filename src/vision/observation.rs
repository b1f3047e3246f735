//! Structured reading of a vision-model reply.
//!
//! Model output is not guaranteed to be well-formed. Every field is optional
//! on the wire; a reply without a parseable JSON object becomes
//! [`ScreenObservation::fallback`] instead of an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::device::types::Point;
use crate::engine::state::{ActionIntent, ActionKind, IssueCategory, Severity};

/// State label used when the model's reply could not be read.
pub const UNKNOWN_STATE: &str = "unknown";

const FALLBACK_DESCRIPTION_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    fn from_value(v: &Value) -> Self {
        if let Some(n) = v.as_f64() {
            return if n >= 0.8 {
                Confidence::High
            } else if n >= 0.5 {
                Confidence::Medium
            } else {
                Confidence::Low
            };
        }
        match v.as_str().map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("high") => Confidence::High,
            Some("medium") | Some("med") => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementState {
    Enabled,
    Disabled,
    Selected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedElement {
    pub element_type: String,
    /// Identifier when one is visible to the model, otherwise a description.
    pub identifier: String,
    pub state: ElementState,
    pub position: Option<String>,
    pub interactive: bool,
}

/// Types the model uses for things that cannot be acted upon.
const STATIC_TYPES: &[&str] = &[
    "text", "label", "image", "heading", "title", "static", "statictext", "container", "view",
    "divider", "separator", "background",
];

impl DetectedElement {
    fn from_value(v: &Value) -> Option<Self> {
        if let Some(s) = v.as_str() {
            let s = s.trim();
            return (!s.is_empty()).then(|| DetectedElement {
                element_type: "unknown".into(),
                identifier: s.to_string(),
                state: ElementState::Enabled,
                position: None,
                interactive: true,
            });
        }
        let obj = v.as_object()?;
        let element_type = str_field(v, &["type", "elementType", "element_type", "kind"])
            .unwrap_or_else(|| "unknown".into())
            .to_ascii_lowercase();
        let identifier = str_field(
            v,
            &["identifier", "id", "testID", "testId", "text", "label", "description", "name"],
        )?;
        let state = match str_field(v, &["state", "status"])
            .map(|s| s.to_ascii_lowercase())
            .as_deref()
        {
            Some("disabled") => ElementState::Disabled,
            Some("selected") | Some("checked") | Some("active") => ElementState::Selected,
            _ => ElementState::Enabled,
        };
        let position = str_field(v, &["position", "location"]);
        let interactive = obj
            .get("interactive")
            .and_then(Value::as_bool)
            .unwrap_or_else(|| !STATIC_TYPES.contains(&element_type.replace(&['_', '-', ' '][..], "").as_str()));
        Some(DetectedElement {
            element_type,
            identifier,
            state,
            position,
            interactive: interactive && state != ElementState::Disabled,
        })
    }
}

/// Problem reported by the model for the current frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedIssue {
    pub category: IssueCategory,
    pub severity: Severity,
    pub description: String,
    pub element: Option<String>,
}

impl ReportedIssue {
    fn from_value(v: &Value) -> Option<Self> {
        if let Some(s) = v.as_str() {
            let s = s.trim();
            return (!s.is_empty()).then(|| ReportedIssue {
                category: IssueCategory::Visual,
                severity: Severity::Low,
                description: s.to_string(),
                element: None,
            });
        }
        let description = str_field(v, &["description", "issue", "message", "text"])?;
        Some(ReportedIssue {
            category: IssueCategory::parse(&str_field(v, &["category", "type"]).unwrap_or_default()),
            severity: Severity::parse(&str_field(v, &["severity", "priority"]).unwrap_or_default()),
            description,
            element: str_field(v, &["element", "target", "identifier"]),
        })
    }
}

/// One model reading of a single captured frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenObservation {
    pub description: String,
    pub current_state: String,
    pub elements: Vec<DetectedElement>,
    pub action: ActionIntent,
    pub confidence: Confidence,
    pub reasoning: Option<String>,
    pub concerns: Option<String>,
    #[serde(default)]
    pub issues: Vec<ReportedIssue>,
    #[serde(default)]
    pub suggested_tests: Vec<String>,
}

impl ScreenObservation {
    /// Observation substituted when the reply holds no usable JSON.
    pub fn fallback(raw: &str) -> Self {
        Self {
            description: raw.trim().chars().take(FALLBACK_DESCRIPTION_CHARS).collect(),
            current_state: UNKNOWN_STATE.to_string(),
            elements: Vec::new(),
            action: ActionIntent::none(),
            confidence: Confidence::Low,
            reasoning: None,
            concerns: Some("model reply contained no parseable JSON object".to_string()),
            issues: Vec::new(),
            suggested_tests: Vec::new(),
        }
    }

    /// Completion signal: nothing left to do and the model is sure of it.
    pub fn signals_done(&self) -> bool {
        self.action.kind == ActionKind::None && self.confidence == Confidence::High
    }

    pub fn is_fallback(&self) -> bool {
        self.current_state == UNKNOWN_STATE && self.confidence == Confidence::Low && self.elements.is_empty()
    }
}

/// Parse a model reply. Never fails.
pub fn parse_observation(reply: &str) -> ScreenObservation {
    match first_json_object(reply) {
        Some(value) => from_json(&value),
        None => {
            tracing::warn!(reply_len = reply.len(), "no JSON object in vision reply, using fallback observation");
            ScreenObservation::fallback(reply)
        }
    }
}

/// First balanced `{...}` block of `text` that parses as a JSON object.
/// Braces inside string literals are ignored.
pub fn first_json_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(offset) = text[start..].find('{') {
        let open = start + offset;
        if let Some(close) = balanced_end(bytes, open) {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&text[open..=close]) {
                return Some(value);
            }
        }
        start = open + 1;
    }
    None
}

/// Index of the `}` closing the brace at `open`.
fn balanced_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn from_json(v: &Value) -> ScreenObservation {
    let elements = array_field(v, &["elements", "interactiveElements", "interactive_elements"])
        .iter()
        .filter_map(DetectedElement::from_value)
        .collect();
    let issues = array_field(v, &["issues", "problems"])
        .iter()
        .filter_map(ReportedIssue::from_value)
        .collect();
    let suggested_tests = array_field(v, &["suggestedTests", "suggested_tests", "testCases", "test_cases"])
        .iter()
        .filter_map(|t| match t {
            Value::String(s) => Some(s.trim().to_string()),
            other => str_field(other, &["description", "name", "title"]),
        })
        .filter(|s| !s.is_empty())
        .collect();

    let action = v
        .get("action")
        .or_else(|| v.get("nextAction"))
        .or_else(|| v.get("next_action"))
        .map(parse_action)
        .unwrap_or_else(ActionIntent::none);

    ScreenObservation {
        description: str_field(v, &["description", "screenDescription", "summary"]).unwrap_or_default(),
        current_state: str_field(v, &["currentState", "current_state", "state", "screen", "screenName"])
            .unwrap_or_else(|| UNKNOWN_STATE.to_string()),
        elements,
        action,
        confidence: v.get("confidence").map(Confidence::from_value).unwrap_or(Confidence::Low),
        reasoning: str_field(v, &["reasoning", "rationale"]),
        concerns: str_field(v, &["concerns", "concern", "warnings"]),
        issues,
        suggested_tests,
    }
}

fn parse_action(v: &Value) -> ActionIntent {
    // Bare string form: "none", "back", ...
    if let Some(s) = v.as_str() {
        return match ActionKind::parse(s) {
            Some(kind) if !kind.needs_target() => normalize_target(ActionIntent::new(kind, "")),
            _ => ActionIntent::none(),
        };
    }

    let Some(kind) = str_field(v, &["type", "action", "kind"])
        .as_deref()
        .map(ActionKind::parse)
        .unwrap_or(Some(ActionKind::None))
    else {
        tracing::warn!(action = %v, "unknown action type, treating as none");
        return ActionIntent::none();
    };

    let value = v.get("value").and_then(|val| match val {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let fallback_targets = array_field(v, &["fallbackTargets", "fallback_targets", "fallbacks"])
        .iter()
        .filter_map(|t| t.as_str().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .collect();

    normalize_target(ActionIntent {
        kind,
        target: str_field(v, &["target", "element", "identifier"]).unwrap_or_default(),
        value,
        coordinates: v.get("coordinates").and_then(parse_point),
        fallback_targets,
    })
}

/// Keep `target` empty exactly when the action is `none`.
fn normalize_target(mut intent: ActionIntent) -> ActionIntent {
    if intent.kind == ActionKind::None {
        intent.target.clear();
        return intent;
    }
    if !intent.target.is_empty() {
        return intent;
    }
    match intent.kind {
        ActionKind::Tap | ActionKind::Type | ActionKind::LongPress => match intent.coordinates {
            Some(p) => intent.target = format!("{},{}", p.x, p.y),
            None => {
                tracing::warn!(kind = intent.kind.as_str(), "action without target or coordinates, treating as none");
                return ActionIntent::none();
            }
        },
        ActionKind::Scroll | ActionKind::Swipe => intent.target = "screen".to_string(),
        other => intent.target = other.as_str().to_string(),
    }
    intent
}

fn parse_point(v: &Value) -> Option<Point> {
    let (x, y) = match v {
        Value::Object(o) => (o.get("x")?.as_f64()?, o.get("y")?.as_f64()?),
        Value::Array(a) if a.len() == 2 => (a[0].as_f64()?, a[1].as_f64()?),
        _ => return None,
    };
    Some(Point::new(x.round() as i32, y.round() as i32))
}

fn str_field(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| v.get(*k))
        .find_map(|val| val.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn array_field<'a>(v: &'a Value, keys: &[&str]) -> &'a [Value] {
    keys.iter()
        .filter_map(|k| v.get(*k))
        .find_map(|val| val.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"Here is my analysis:
```json
{
  "description": "Login form with email and password fields",
  "currentState": "login_form",
  "elements": [
    {"type": "input", "identifier": "email-input", "state": "enabled", "position": "top"},
    {"type": "button", "identifier": "login-button", "state": "disabled", "position": "bottom"},
    {"type": "text", "identifier": "Welcome {back}"}
  ],
  "action": {"type": "type", "target": "email-input", "value": "user@example.com", "fallbackTargets": ["Email"]},
  "confidence": "medium",
  "reasoning": "Email must be filled before submitting"
}
```"#;

    #[test]
    fn test_parses_markdown_wrapped_json() {
        let obs = parse_observation(WELL_FORMED);
        assert_eq!(obs.current_state, "login_form");
        assert_eq!(obs.confidence, Confidence::Medium);
        assert_eq!(obs.action.kind, ActionKind::Type);
        assert_eq!(obs.action.target, "email-input");
        assert_eq!(obs.action.value.as_deref(), Some("user@example.com"));
        assert_eq!(obs.action.fallback_targets, vec!["Email".to_string()]);
        assert_eq!(obs.elements.len(), 3);
        assert!(obs.elements[0].interactive);
        assert!(!obs.elements[1].interactive, "disabled elements are not interactive");
        assert!(!obs.elements[2].interactive, "text is not interactive");
        assert_eq!(obs.elements[2].identifier, "Welcome {back}");
    }

    #[test]
    fn test_non_json_reply_falls_back() {
        let obs = parse_observation("**The screen shows a login form.** I would tap the button.");
        assert_eq!(obs.confidence, Confidence::Low);
        assert_eq!(obs.action.kind, ActionKind::None);
        assert_eq!(obs.current_state, UNKNOWN_STATE);
        assert!(obs.is_fallback());
        assert!(!obs.signals_done());
    }

    #[test]
    fn test_unbalanced_json_falls_back() {
        let obs = parse_observation(r#"{"currentState": "home", "action": {"type": "tap""#);
        assert_eq!(obs.action.kind, ActionKind::None);
        assert_eq!(obs.confidence, Confidence::Low);
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_extraction() {
        let reply = r#"note {not json} then {"currentState": "a}b", "confidence": "high", "action": {"type": "none"}}"#;
        let obs = parse_observation(reply);
        assert_eq!(obs.current_state, "a}b");
        assert!(obs.signals_done());
    }

    #[test]
    fn test_escaped_quotes_in_strings() {
        let reply = r#"{"description": "Says \"hi {\"", "currentState": "greeting", "confidence": "low"}"#;
        let obs = parse_observation(reply);
        assert_eq!(obs.current_state, "greeting");
        assert_eq!(obs.description, "Says \"hi {\"");
    }

    #[test]
    fn test_missing_fields_default_safely() {
        let obs = parse_observation("{}");
        assert_eq!(obs.current_state, UNKNOWN_STATE);
        assert_eq!(obs.confidence, Confidence::Low);
        assert_eq!(obs.action, ActionIntent::none());
        assert!(obs.elements.is_empty());
    }

    #[test]
    fn test_tap_without_target_uses_coordinates_or_becomes_none() {
        let with_coords =
            parse_observation(r#"{"action": {"type": "tap", "coordinates": {"x": 120.4, "y": 880}}}"#);
        assert_eq!(with_coords.action.kind, ActionKind::Tap);
        assert_eq!(with_coords.action.coordinates, Some(Point::new(120, 880)));
        assert!(!with_coords.action.target.is_empty());

        let bare = parse_observation(r#"{"action": {"type": "tap"}}"#);
        assert_eq!(bare.action.kind, ActionKind::None);
        assert!(bare.action.target.is_empty());
    }

    #[test]
    fn test_unknown_action_type_is_none() {
        let obs = parse_observation(r#"{"action": {"type": "teleport", "target": "moon"}, "confidence": "high"}"#);
        assert_eq!(obs.action, ActionIntent::none());
    }

    #[test]
    fn test_none_action_clears_target() {
        let obs = parse_observation(r#"{"action": {"type": "none", "target": "home"}, "confidence": "high"}"#);
        assert!(obs.action.target.is_empty());
        assert!(obs.signals_done());
    }

    #[test]
    fn test_numeric_confidence_and_string_action() {
        let obs = parse_observation(r#"{"action": "back", "confidence": 0.9}"#);
        assert_eq!(obs.action.kind, ActionKind::Back);
        assert_eq!(obs.action.target, "back");
        assert_eq!(obs.confidence, Confidence::High);
    }

    #[test]
    fn test_issues_and_suggested_tests() {
        let reply = r#"{
            "currentState": "settings",
            "issues": [
                {"category": "accessibility", "severity": "high", "description": "Toggle has no label", "element": "notif-toggle"},
                "Footer text is clipped"
            ],
            "suggestedTests": ["Toggle notifications on and off", {"description": "Change language"}, ""]
        }"#;
        let obs = parse_observation(reply);
        assert_eq!(obs.issues.len(), 2);
        assert_eq!(obs.issues[0].category, IssueCategory::Accessibility);
        assert_eq!(obs.issues[0].severity, Severity::High);
        assert_eq!(obs.issues[1].category, IssueCategory::Visual);
        assert_eq!(obs.suggested_tests, vec!["Toggle notifications on and off", "Change language"]);
    }
}
