//! Goal-free traversal of an app.
//!
//! Every step analyzes the current screen, records it when it is new, then
//! acts on the highest-priority interactive element not chosen before on that
//! screen. When a screen is exhausted the explorer navigates back, and stops
//! once there is nothing left to unwind.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::ExplorerConfig;
use crate::device::traits::ScreenCapture;
use crate::engine::coverage::coverage_score;
use crate::engine::history::{new_run_id, RunJournal};
use crate::engine::loop_control::LoopController;
use crate::engine::state::{
    ActionIntent, ActionKind, ExplorationResult, Issue, StepResult, StopReason,
};
use crate::errors::TapsightResult;
use crate::executor::dispatcher::ActionExecutor;
use crate::executor::safety::AvoidList;
use crate::vision::client::{ChatSession, VisionClient};
use crate::vision::observation::{parse_observation, DetectedElement, ScreenObservation, UNKNOWN_STATE};
use crate::vision::prompt::explore_prompt;

/// Element types that receive the placeholder text instead of a tap.
const INPUT_TYPES: &[&str] = &["input", "textfield", "text_field", "textbox", "edittext", "searchfield", "search"];

pub struct Explorer {
    capture: Arc<dyn ScreenCapture>,
    executor: ActionExecutor,
    vision: VisionClient,
    config: ExplorerConfig,
    avoid: AvoidList,
    journal_dir: Option<PathBuf>,
}

/// Mutable bookkeeping of one exploration run.
#[derive(Default)]
struct ExplorationState {
    screens: Vec<String>,
    observations: BTreeMap<String, ScreenObservation>,
    navigation: BTreeMap<String, BTreeSet<String>>,
    issues: Vec<Issue>,
    suggested_tests: Vec<String>,
    explored: HashSet<(String, String)>,
    back_stack: Vec<String>,
    max_depth: usize,
    previous_screen: Option<String>,
    last_was_back: bool,
    last_state: Option<String>,
}

impl ExplorationState {
    /// Update screen bookkeeping for a fresh observation. Returns true for a new screen.
    fn observe(&mut self, observation: &ScreenObservation, frame: Option<&PathBuf>) -> bool {
        let screen = observation.current_state.clone();
        self.last_state = Some(screen.clone());
        if screen == UNKNOWN_STATE {
            return false;
        }

        if let Some(previous) = self.previous_screen.take() {
            if previous != screen {
                if self.last_was_back {
                    self.back_stack.pop();
                } else {
                    self.navigation
                        .entry(previous.clone())
                        .or_default()
                        .insert(screen.clone());
                    self.back_stack.push(previous);
                    self.max_depth = self.max_depth.max(self.back_stack.len());
                }
            }
        }
        self.previous_screen = Some(screen.clone());

        if self.observations.contains_key(&screen) {
            return false;
        }
        self.screens.push(screen.clone());
        self.observations.insert(screen.clone(), observation.clone());

        for reported in &observation.issues {
            let issue = Issue {
                screen: screen.clone(),
                category: reported.category,
                severity: reported.severity,
                description: reported.description.clone(),
                element: reported.element.clone(),
                frame: frame.cloned(),
            };
            if !self.issues.iter().any(|known| known.same_as(&issue)) {
                self.issues.push(issue);
            }
        }
        for test in &observation.suggested_tests {
            let test = test.trim();
            if !test.is_empty() && !self.suggested_tests.iter().any(|t| t.eq_ignore_ascii_case(test)) {
                self.suggested_tests.push(test.to_string());
            }
        }
        true
    }

    fn total_elements(&self) -> usize {
        self.observations.values().map(|o| o.elements.len()).sum()
    }
}

impl Explorer {
    pub fn new(
        capture: Arc<dyn ScreenCapture>,
        executor: ActionExecutor,
        vision: VisionClient,
        config: ExplorerConfig,
    ) -> Self {
        let avoid = AvoidList::new(&config.avoid);
        Self {
            capture,
            executor,
            vision,
            config,
            avoid,
            journal_dir: None,
        }
    }

    pub fn with_journal_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.journal_dir = Some(dir.into());
        self
    }

    pub async fn explore(&self) -> TapsightResult<ExplorationResult> {
        let run_id = new_run_id();
        let journal = RunJournal::open(self.journal_dir.as_deref(), &run_id);
        let started_at = chrono::Utc::now();
        let clock = Instant::now();
        tracing::info!(
            run_id = %run_id,
            max_steps = self.config.max_steps,
            max_screens = self.config.max_screens,
            journal = ?journal.path(),
            "exploration started"
        );
        journal.record("start", &self.config);

        let mut session = self.vision.open_session();
        let mut state = ExplorationState::default();
        let mut steps = Vec::new();
        let result = self.drive(&mut session, &journal, &mut state, &mut steps).await;
        session.close();

        let stop_reason = match result {
            Ok(reason) => reason,
            Err(e) => {
                tracing::error!(run_id = %run_id, steps = steps.len(), error = %e, "exploration aborted");
                journal.record("abort", &serde_json::json!({ "error": e.to_string(), "steps": steps.len() }));
                return Err(e);
            }
        };

        let coverage = coverage_score(
            state.screens.len(),
            state.total_elements(),
            !state.issues.is_empty(),
            state.max_depth,
        );
        let result = ExplorationResult {
            run_id,
            screens: state.screens,
            screen_observations: state.observations,
            navigation: state.navigation,
            issues: state.issues,
            suggested_tests: state.suggested_tests,
            coverage_score: coverage,
            max_depth: state.max_depth,
            steps,
            final_state: state.last_state.unwrap_or_else(|| UNKNOWN_STATE.to_string()),
            stop_reason,
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
        };
        tracing::info!(
            run_id = %result.run_id,
            screens = result.screens.len(),
            issues = result.issues.len(),
            coverage = result.coverage_score,
            stop_reason = ?result.stop_reason,
            "exploration finished"
        );
        journal.record(
            "finish",
            &serde_json::json!({
                "screens": result.screens,
                "issues": result.issues.len(),
                "coverage_score": result.coverage_score,
                "stop_reason": result.stop_reason,
            }),
        );
        Ok(result)
    }

    async fn drive(
        &self,
        session: &mut ChatSession,
        journal: &RunJournal,
        state: &mut ExplorationState,
        steps: &mut Vec<StepResult>,
    ) -> TapsightResult<StopReason> {
        let mut controller = LoopController::new(self.config.max_steps, None);

        loop {
            if let Some(reason) = controller.should_stop() {
                return Ok(reason);
            }
            if state.screens.len() >= self.config.max_screens {
                return Ok(StopReason::ScreenBudget);
            }

            let step = controller.steps_taken() + 1;
            let step_clock = Instant::now();
            let started_at = chrono::Utc::now();

            let frame = self.capture.capture_screen(&format!("explore-{step:02}")).await?;
            let prompt = explore_prompt(&state.screens, state.back_stack.len());
            let reply = session.send(&prompt, Some(&frame)).await?;
            let observation = parse_observation(&reply);
            let screen = observation.current_state.clone();

            if state.observe(&observation, frame.stored_path.as_ref()) {
                tracing::info!(step, screen = %screen, elements = observation.elements.len(), "new screen discovered");
            }

            let intent = match self.next_element(&screen, &observation, &state.explored) {
                Some(element) => {
                    state.explored.insert((screen.clone(), element.identifier.clone()));
                    state.last_was_back = false;
                    self.intent_for(element)
                }
                None if !state.back_stack.is_empty() => {
                    tracing::debug!(screen = %screen, "screen exhausted, navigating back");
                    state.last_was_back = true;
                    ActionIntent::new(ActionKind::Back, "back")
                }
                None => {
                    let record = StepResult {
                        step,
                        frame: frame.stored_path.clone(),
                        observation,
                        action: ActionIntent::none(),
                        success: true,
                        error: None,
                        strategy: None,
                        started_at,
                        duration_ms: step_clock.elapsed().as_millis() as u64,
                    };
                    journal.record("step", &record);
                    steps.push(record);
                    return Ok(StopReason::NothingLeftToExplore);
                }
            };

            let outcome = self.executor.execute(&intent).await;
            let record = StepResult {
                step,
                frame: frame.stored_path.clone(),
                observation,
                action: intent,
                success: outcome.success,
                error: outcome.error,
                strategy: outcome.strategy,
                started_at,
                duration_ms: step_clock.elapsed().as_millis() as u64,
            };
            journal.record("step", &record);
            controller.record_step(record.success);
            steps.push(record);

            if controller.consecutive_failures() >= self.config.failure_threshold {
                tracing::warn!(
                    failures = controller.consecutive_failures(),
                    screen = %screen,
                    "too many consecutive failures, forcing back navigation"
                );
                let back = self.executor.execute(&ActionIntent::new(ActionKind::Back, "back")).await;
                state.last_was_back = back.success;
                controller.reset_failures();
            }

            tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
        }
    }

    /// First interactive, unexplored, non-avoided element by type priority.
    fn next_element<'a>(
        &self,
        screen: &str,
        observation: &'a ScreenObservation,
        explored: &HashSet<(String, String)>,
    ) -> Option<&'a DetectedElement> {
        let mut candidates: Vec<&DetectedElement> = observation
            .elements
            .iter()
            .filter(|e| e.interactive && !e.identifier.trim().is_empty())
            .filter(|e| !explored.contains(&(screen.to_string(), e.identifier.clone())))
            .filter(|e| {
                let blocked = self.avoid.blocks(e);
                if blocked {
                    tracing::debug!(element = %e.identifier, "element avoided");
                }
                !blocked
            })
            .collect();
        candidates.sort_by_key(|e| self.priority_of(&e.element_type));
        candidates.into_iter().next()
    }

    fn priority_of(&self, element_type: &str) -> usize {
        let element_type = element_type.to_ascii_lowercase();
        self.config
            .priority
            .iter()
            .position(|p| element_type == p.to_ascii_lowercase() || element_type.contains(&p.to_ascii_lowercase()))
            .unwrap_or(self.config.priority.len())
    }

    fn intent_for(&self, element: &DetectedElement) -> ActionIntent {
        let element_type = element.element_type.to_ascii_lowercase();
        if INPUT_TYPES.contains(&element_type.as_str()) {
            ActionIntent::new(ActionKind::Type, element.identifier.clone())
                .with_value(self.config.placeholder_text.clone())
        } else {
            ActionIntent::new(ActionKind::Tap, element.identifier.clone())
        }
    }
}
