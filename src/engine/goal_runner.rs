use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::RunnerConfig;
use crate::device::traits::ScreenCapture;
use crate::engine::history::{new_run_id, RunJournal};
use crate::engine::loop_control::LoopController;
use crate::engine::recovery::Recovery;
use crate::engine::state::{ActionIntent, GoalRunResult, RunState, StepResult, StopReason};
use crate::errors::TapsightResult;
use crate::executor::dispatcher::ActionExecutor;
use crate::vision::client::{ChatSession, VisionClient};
use crate::vision::observation::{parse_observation, Confidence, UNKNOWN_STATE};
use crate::vision::prompt::goal_step_prompt;

/// Drives one goal to success or to the end of its step budget.
///
/// Each call to [`GoalRunner::run`] owns its own chat session and step list,
/// so a runner can be reused for several goals one after another.
pub struct GoalRunner {
    capture: Arc<dyn ScreenCapture>,
    executor: ActionExecutor,
    vision: VisionClient,
    recovery: Recovery,
    config: RunnerConfig,
    journal_dir: Option<PathBuf>,
}

struct Outcome {
    state: RunState,
    stop_reason: StopReason,
    final_state: String,
}

impl GoalRunner {
    pub fn new(
        capture: Arc<dyn ScreenCapture>,
        executor: ActionExecutor,
        vision: VisionClient,
        recovery: Recovery,
        config: RunnerConfig,
    ) -> Self {
        Self {
            capture,
            executor,
            vision,
            recovery,
            config,
            journal_dir: None,
        }
    }

    pub fn with_journal_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.journal_dir = Some(dir.into());
        self
    }

    /// Run `goal`. Not reaching the goal is a normal result; only capture and
    /// vision transport failures are returned as errors.
    ///
    /// A done signal on the last allowed step still counts as success, so a
    /// run with `max_steps` steps fails only when it stopped on the budget.
    pub async fn run(&self, goal: &str) -> TapsightResult<GoalRunResult> {
        let run_id = new_run_id();
        let journal = RunJournal::open(self.journal_dir.as_deref(), &run_id);
        let started_at = chrono::Utc::now();
        let clock = Instant::now();
        tracing::info!(
            run_id = %run_id,
            goal,
            max_steps = self.config.max_steps,
            journal = ?journal.path(),
            "goal run started"
        );
        journal.record("start", &serde_json::json!({ "goal": goal, "max_steps": self.config.max_steps }));

        let mut session = self.vision.open_session();
        let mut steps = Vec::new();
        let result = self.drive(goal, &mut session, &journal, &mut steps).await;
        session.close();

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(run_id = %run_id, steps = steps.len(), error = %e, "goal run aborted");
                journal.record("abort", &serde_json::json!({ "error": e.to_string(), "steps": steps.len() }));
                return Err(e);
            }
        };

        let run = GoalRunResult {
            run_id,
            success: outcome.state == RunState::Succeeded,
            goal: goal.to_string(),
            steps,
            final_state: outcome.final_state,
            stop_reason: outcome.stop_reason,
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
        };
        tracing::info!(
            run_id = %run.run_id,
            success = run.success,
            steps = run.steps.len(),
            final_state = %run.final_state,
            stop_reason = ?run.stop_reason,
            "goal run finished"
        );
        journal.record(
            "finish",
            &serde_json::json!({
                "success": run.success,
                "final_state": run.final_state,
                "stop_reason": run.stop_reason,
                "steps": run.steps.len(),
            }),
        );
        Ok(run)
    }

    async fn drive(
        &self,
        goal: &str,
        session: &mut ChatSession,
        journal: &RunJournal,
        steps: &mut Vec<StepResult>,
    ) -> TapsightResult<Outcome> {
        let mut controller = LoopController::new(
            self.config.max_steps,
            self.config.max_run_duration_secs.map(Duration::from_secs),
        );

        loop {
            if let Some(stop_reason) = controller.should_stop() {
                return Ok(Outcome {
                    state: RunState::Exhausted,
                    stop_reason,
                    final_state: UNKNOWN_STATE.to_string(),
                });
            }

            let step = controller.steps_taken() + 1;
            let state = RunState::Running { step };
            tracing::debug!(?state, "step started");
            let step_clock = Instant::now();
            let started_at = chrono::Utc::now();

            let frame = self.capture.capture_screen(&format!("step-{step:02}")).await?;
            let window_start = steps.len().saturating_sub(self.config.context_window);
            let prompt = goal_step_prompt(goal, &steps[window_start..], step, self.config.max_steps);
            let reply = session.send(&prompt, Some(&frame)).await?;
            let observation = parse_observation(&reply);
            tracing::info!(
                step,
                screen = %observation.current_state,
                action = %observation.action.summary(),
                confidence = ?observation.confidence,
                "screen analyzed"
            );

            if observation.signals_done() {
                let final_state = observation.current_state.clone();
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
                return Ok(Outcome {
                    state: RunState::Succeeded,
                    stop_reason: StopReason::GoalAchieved,
                    final_state,
                });
            }

            let outcome = self.executor.execute(&observation.action).await;
            let needs_recovery = !outcome.success && observation.confidence == Confidence::Low;
            let record = StepResult {
                step,
                frame: frame.stored_path.clone(),
                action: observation.action.clone(),
                observation,
                success: outcome.success,
                error: outcome.error,
                strategy: outcome.strategy,
                started_at,
                duration_ms: step_clock.elapsed().as_millis() as u64,
            };
            journal.record("step", &record);
            controller.record_step(record.success);

            if needs_recovery {
                let action = self.recovery.attempt(Some(goal), &record).await;
                journal.record("recovery", &serde_json::json!({ "step": step, "action": action }));
            }
            steps.push(record);

            tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
        }
    }
}
