//! JSON artifacts written at the end of a run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::state::{
    ExplorationResult, GoalRunResult, Issue, IssueCategory, Severity, StepResult, StopReason,
};
use crate::errors::{TapsightError, TapsightResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    /// Screen the model reported for this step.
    pub state: String,
    pub action: String,
    pub target: String,
    pub success: bool,
    pub error: Option<String>,
    pub screenshot: Option<PathBuf>,
    pub duration_ms: u64,
}

impl From<&StepResult> for StepRecord {
    fn from(step: &StepResult) -> Self {
        Self {
            step: step.step,
            state: step.observation.current_state.clone(),
            action: step.action.kind.as_str().to_string(),
            target: step.action.target.clone(),
            success: step.success,
            error: step.error.clone(),
            screenshot: step.frame.clone(),
            duration_ms: step.duration_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl StepCounts {
    fn of(steps: &[StepResult]) -> Self {
        let passed = steps.iter().filter(|s| s.success).count();
        Self {
            total: steps.len(),
            passed,
            failed: steps.len() - passed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub goal: String,
    pub success: bool,
    pub final_state: String,
    pub stop_reason: StopReason,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
    pub counts: StepCounts,
    pub steps: Vec<StepRecord>,
}

impl From<&GoalRunResult> for RunReport {
    fn from(run: &GoalRunResult) -> Self {
        Self {
            run_id: run.run_id.clone(),
            goal: run.goal.clone(),
            success: run.success,
            final_state: run.final_state.clone(),
            stop_reason: run.stop_reason,
            started_at: run.started_at,
            finished_at: run.started_at + chrono::Duration::milliseconds(run.duration_ms as i64),
            duration_ms: run.duration_ms,
            counts: StepCounts::of(&run.steps),
            steps: run.steps.iter().map(StepRecord::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenReport {
    pub name: String,
    pub description: String,
    pub elements: usize,
    /// Screens reached from this one.
    pub reachable: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationReport {
    pub run_id: String,
    pub stop_reason: StopReason,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
    pub coverage_score: u32,
    pub max_depth: usize,
    pub counts: StepCounts,
    pub screens: Vec<ScreenReport>,
    pub issues_by_category: BTreeMap<IssueCategory, Vec<Issue>>,
    pub issues_by_severity: BTreeMap<Severity, Vec<Issue>>,
    pub suggested_tests: Vec<String>,
    pub steps: Vec<StepRecord>,
}

impl From<&ExplorationResult> for ExplorationReport {
    fn from(result: &ExplorationResult) -> Self {
        let screens = result
            .screens
            .iter()
            .map(|name| {
                let observation = result.screen_observations.get(name);
                ScreenReport {
                    name: name.clone(),
                    description: observation.map(|o| o.description.clone()).unwrap_or_default(),
                    elements: observation.map_or(0, |o| o.elements.len()),
                    reachable: result
                        .navigation
                        .get(name)
                        .map(|targets| targets.iter().cloned().collect())
                        .unwrap_or_default(),
                }
            })
            .collect();

        let mut issues_by_category: BTreeMap<IssueCategory, Vec<Issue>> = BTreeMap::new();
        let mut issues_by_severity: BTreeMap<Severity, Vec<Issue>> = BTreeMap::new();
        for issue in &result.issues {
            issues_by_category.entry(issue.category).or_default().push(issue.clone());
            issues_by_severity.entry(issue.severity).or_default().push(issue.clone());
        }

        Self {
            run_id: result.run_id.clone(),
            stop_reason: result.stop_reason,
            started_at: result.started_at,
            duration_ms: result.duration_ms,
            coverage_score: result.coverage_score,
            max_depth: result.max_depth,
            counts: StepCounts::of(&result.steps),
            screens,
            issues_by_category,
            issues_by_severity,
            suggested_tests: result.suggested_tests.clone(),
            steps: result.steps.iter().map(StepRecord::from).collect(),
        }
    }
}

/// Pretty-print `report` to `<dir>/<name>.json` and return the path.
pub fn write_report<T: Serialize>(dir: &Path, name: &str, report: &T) -> TapsightResult<PathBuf> {
    std::fs::create_dir_all(dir)
        .map_err(|e| TapsightError::Report(format!("cannot create {}: {e}", dir.display())))?;
    let path = dir.join(format!("{name}.json"));
    let content = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, content)
        .map_err(|e| TapsightError::Report(format!("cannot write {}: {e}", path.display())))?;
    tracing::info!(path = %path.display(), "report written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::{ActionIntent, ActionKind};
    use crate::vision::observation::ScreenObservation;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn step(n: usize, state: &str, action: ActionIntent, success: bool) -> StepResult {
        let mut observation = ScreenObservation::fallback("");
        observation.current_state = state.into();
        StepResult {
            step: n,
            frame: Some(PathBuf::from(format!("/tmp/step-{n:02}.png"))),
            observation,
            action,
            success,
            error: (!success).then(|| "Target not found: x".to_string()),
            strategy: None,
            started_at: chrono::Utc::now(),
            duration_ms: 120,
        }
    }

    fn issue(screen: &str, category: IssueCategory, severity: Severity) -> Issue {
        Issue {
            screen: screen.into(),
            category,
            severity,
            description: format!("{category:?} problem"),
            element: None,
            frame: None,
        }
    }

    #[test]
    fn test_run_report_counts_and_steps() {
        let run = GoalRunResult {
            run_id: "r1".into(),
            success: true,
            goal: "log in".into(),
            steps: vec![
                step(1, "welcome", ActionIntent::new(ActionKind::Tap, "login-button"), true),
                step(2, "login", ActionIntent::new(ActionKind::Tap, "x"), false),
                step(3, "home", ActionIntent::none(), true),
            ],
            final_state: "home".into(),
            stop_reason: StopReason::GoalAchieved,
            started_at: chrono::Utc::now(),
            duration_ms: 2500,
        };
        let report = RunReport::from(&run);
        assert_eq!(report.counts, StepCounts { total: 3, passed: 2, failed: 1 });
        assert_eq!(report.finished_at - report.started_at, chrono::Duration::milliseconds(2500));
        assert_eq!(
            report.steps[0],
            StepRecord {
                step: 1,
                state: "welcome".into(),
                action: "tap".into(),
                target: "login-button".into(),
                success: true,
                error: None,
                screenshot: Some(PathBuf::from("/tmp/step-01.png")),
                duration_ms: 120,
            }
        );
    }

    #[test]
    fn test_exploration_report_groups_issues() {
        let mut navigation = BTreeMap::new();
        navigation.insert("home".to_string(), BTreeSet::from(["settings".to_string()]));
        let result = ExplorationResult {
            run_id: "e1".into(),
            screens: vec!["home".into(), "settings".into()],
            screen_observations: BTreeMap::new(),
            navigation,
            issues: vec![
                issue("home", IssueCategory::Visual, Severity::Low),
                issue("settings", IssueCategory::Visual, Severity::High),
                issue("settings", IssueCategory::Accessibility, Severity::High),
            ],
            suggested_tests: vec!["Open settings".into()],
            coverage_score: 35,
            max_depth: 1,
            steps: vec![],
            final_state: "home".into(),
            stop_reason: StopReason::NothingLeftToExplore,
            started_at: chrono::Utc::now(),
            duration_ms: 10,
        };
        let report = ExplorationReport::from(&result);
        assert_eq!(report.screens[0].reachable, vec!["settings".to_string()]);
        assert!(report.screens[1].reachable.is_empty());
        assert_eq!(report.issues_by_category[&IssueCategory::Visual].len(), 2);
        assert_eq!(report.issues_by_severity[&Severity::High].len(), 2);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["issues_by_category"]["accessibility"][0]["screen"], "settings");
    }

    #[test]
    fn test_write_report_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("reports");
        let path = write_report(&out, "run", &serde_json::json!({"success": true})).unwrap();
        assert_eq!(path, out.join("run.json"));
        let back: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back["success"], true);
    }
}
