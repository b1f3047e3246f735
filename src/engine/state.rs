use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::device::types::Point;
use crate::vision::observation::ScreenObservation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Tap,
    Type,
    Scroll,
    Swipe,
    LongPress,
    Back,
    Wait,
    None,
}

impl ActionKind {
    /// Lenient parse of a model-provided action type. Unknown values yield None.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "tap" | "click" | "press" => Some(ActionKind::Tap),
            "type" | "typetext" | "input" | "fill" => Some(ActionKind::Type),
            "scroll" => Some(ActionKind::Scroll),
            "swipe" => Some(ActionKind::Swipe),
            "longpress" => Some(ActionKind::LongPress),
            "back" | "goback" | "pressback" => Some(ActionKind::Back),
            "wait" => Some(ActionKind::Wait),
            "none" | "done" | "" => Some(ActionKind::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Tap => "tap",
            ActionKind::Type => "type",
            ActionKind::Scroll => "scroll",
            ActionKind::Swipe => "swipe",
            ActionKind::LongPress => "longPress",
            ActionKind::Back => "back",
            ActionKind::Wait => "wait",
            ActionKind::None => "none",
        }
    }

    /// Whether the action must name a target element.
    pub fn needs_target(&self) -> bool {
        matches!(self, ActionKind::Tap | ActionKind::Type | ActionKind::LongPress)
    }
}

/// One proposed UI operation. `target` is empty only for `none`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionIntent {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub target: String,
    /// Text to type, scroll/swipe direction, or wait duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Point>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_targets: Vec<String>,
}

impl ActionIntent {
    pub fn none() -> Self {
        Self {
            kind: ActionKind::None,
            target: String::new(),
            value: None,
            coordinates: None,
            fallback_targets: Vec::new(),
        }
    }

    pub fn new(kind: ActionKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            ..Self::none()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_coordinates(mut self, point: Point) -> Self {
        self.coordinates = Some(point);
        self
    }

    pub fn with_fallbacks<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Short human-readable form used in prompts and logs.
    pub fn summary(&self) -> String {
        let value = self.value.as_deref();
        match self.kind {
            ActionKind::None => "none".to_string(),
            ActionKind::Back => "back".to_string(),
            ActionKind::Wait => format!("wait {}ms", value.unwrap_or("1000")),
            ActionKind::Type => format!("type \"{}\" into {}", value.unwrap_or(""), self.target),
            ActionKind::Scroll | ActionKind::Swipe => match value {
                Some(dir) => format!("{} {} {dir}", self.kind.as_str(), self.target),
                None => format!("{} {}", self.kind.as_str(), self.target),
            },
            ActionKind::Tap | ActionKind::LongPress => {
                format!("{} {}", self.kind.as_str(), self.target)
            }
        }
    }
}

/// Position of a run in the goal-execution loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Running { step: usize },
    Succeeded,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    GoalAchieved,
    StepBudget,
    TimeBudget,
    ScreenBudget,
    NothingLeftToExplore,
}

/// One iteration of a run. The list of these is the run's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: usize,
    pub frame: Option<PathBuf>,
    pub observation: ScreenObservation,
    /// Action actually executed. Differs from the observation's proposal in
    /// exploration mode, where the explorer picks the element.
    pub action: ActionIntent,
    pub success: bool,
    pub error: Option<String>,
    /// Resolution strategy that located the target, when one did.
    pub strategy: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
}

/// Terminal summary of a goal run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalRunResult {
    pub run_id: String,
    pub success: bool,
    pub goal: String,
    pub steps: Vec<StepResult>,
    pub final_state: String,
    pub stop_reason: StopReason,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Visual,
    Functional,
    Accessibility,
    Performance,
}

impl IssueCategory {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "functional" | "function" | "bug" => IssueCategory::Functional,
            "accessibility" | "a11y" => IssueCategory::Accessibility,
            "performance" | "perf" => IssueCategory::Performance,
            _ => IssueCategory::Visual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" | "critical" | "major" => Severity::High,
            "medium" | "moderate" => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

/// Problem noticed on a screen during exploration. Never updated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub screen: String,
    pub category: IssueCategory,
    pub severity: Severity,
    pub description: String,
    pub element: Option<String>,
    pub frame: Option<PathBuf>,
}

impl Issue {
    /// Two issues are duplicates when they describe the same problem on the same screen.
    pub fn same_as(&self, other: &Issue) -> bool {
        self.screen == other.screen
            && self.category == other.category
            && self.description.trim().eq_ignore_ascii_case(other.description.trim())
    }
}

/// Terminal summary of an exploration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationResult {
    pub run_id: String,
    /// Discovered screens in visit order.
    pub screens: Vec<String>,
    /// First observation of each discovered screen.
    pub screen_observations: BTreeMap<String, ScreenObservation>,
    /// Directed edges: screen -> screens reached from it.
    pub navigation: BTreeMap<String, BTreeSet<String>>,
    pub issues: Vec<Issue>,
    pub suggested_tests: Vec<String>,
    pub coverage_score: u32,
    pub max_depth: usize,
    pub steps: Vec<StepResult>,
    pub final_state: String,
    pub stop_reason: StopReason,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
}
