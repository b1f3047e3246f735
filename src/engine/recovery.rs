use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::traits::{ScreenCapture, UiDriver};
use crate::engine::state::StepResult;
use crate::executor::coordinator::dismiss_point_for;
use crate::vision::client::VisionClient;
use crate::vision::prompt::{recovery_prompt, RECOVERY_SYSTEM_PROMPT};

/// What recovery ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    Back,
    DismissTap,
    Wait,
}

/// Best-effort attempt to get a stuck run back to a usable screen.
pub struct Recovery {
    capture: Arc<dyn ScreenCapture>,
    driver: Arc<dyn UiDriver>,
    advisor: Option<VisionClient>,
    wait: Duration,
}

impl Recovery {
    pub fn new(
        capture: Arc<dyn ScreenCapture>,
        driver: Arc<dyn UiDriver>,
        advisor: Option<VisionClient>,
        wait: Duration,
    ) -> Self {
        Self {
            capture,
            driver,
            advisor: advisor.map(|a| a.with_system_prompt(RECOVERY_SYSTEM_PROMPT)),
            wait,
        }
    }

    /// Never fails. The advisor's answer is logged only.
    pub async fn attempt(&self, goal: Option<&str>, failed_step: &StepResult) -> RecoveryAction {
        tracing::info!(step = failed_step.step, "attempting recovery");

        let frame = match self.capture.capture_screen(&format!("recovery-{:02}", failed_step.step)).await {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!(error = %e, "recovery capture failed");
                None
            }
        };

        if let Some(advisor) = &self.advisor {
            match advisor.run_prompt(&recovery_prompt(goal, failed_step), frame.as_ref()).await {
                Ok(advice) => tracing::info!(advice = %advice.trim(), "recovery advice"),
                Err(e) => tracing::warn!(error = %e, "recovery advisor unavailable"),
            }
        }

        match self.driver.press_back().await {
            Ok(()) => {
                tracing::info!(action = "back", "recovery done");
                return RecoveryAction::Back;
            }
            Err(e) => tracing::warn!(error = %e, "recovery back navigation failed"),
        }

        if let Some(frame) = &frame {
            let point = dismiss_point_for(frame);
            match self.driver.tap_at(point).await {
                Ok(()) => {
                    tracing::info!(action = "dismiss_tap", x = point.x, y = point.y, "recovery done");
                    return RecoveryAction::DismissTap;
                }
                Err(e) => tracing::warn!(error = %e, "recovery dismiss tap failed"),
            }
        }

        tracing::info!(wait_ms = self.wait.as_millis() as u64, "recovery falling back to wait");
        tokio::time::sleep(self.wait).await;
        RecoveryAction::Wait
    }
}
