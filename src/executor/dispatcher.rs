//! Turns an [`ActionIntent`] into device operations.
//!
//! Target resolution for tap/type/longPress: identifier (only for
//! identifier-shaped targets), visible text, accessibility label, literal
//! coordinates. Scroll/swipe use the identified element or the first generic
//! scroll container present. When the primary resolution finds nothing, each
//! fallback target is tried in order by identifier then text.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::traits::UiDriver;
use crate::device::types::{Direction, ElementRef, Gesture, Locator, Platform};
use crate::engine::state::{ActionIntent, ActionKind};
use crate::errors::{TapsightError, TapsightResult};
use crate::executor::resolver::{container_types, fallback_locators, is_identifier, primary_locators};

const DEFAULT_WAIT_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub error: Option<String>,
    /// Which resolution step located the target.
    pub strategy: Option<String>,
}

impl ActionOutcome {
    fn ok(strategy: Option<String>) -> Self {
        Self {
            success: true,
            error: None,
            strategy,
        }
    }

    fn failed(err: &TapsightError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            strategy: None,
        }
    }
}

pub struct ActionExecutor {
    driver: Arc<dyn UiDriver>,
    scroll_px: u32,
    platform: Option<Platform>,
}

impl ActionExecutor {
    pub fn new(driver: Arc<dyn UiDriver>, scroll_px: u32, platform: Option<Platform>) -> Self {
        Self {
            driver,
            scroll_px,
            platform,
        }
    }

    /// Execute one intent. Never fails the caller: problems are reported in the outcome.
    pub async fn execute(&self, intent: &ActionIntent) -> ActionOutcome {
        tracing::info!(
            action = intent.kind.as_str(),
            target = %intent.target,
            value = ?intent.value,
            "executing action"
        );
        let result = match intent.kind {
            ActionKind::None => Ok(None),
            ActionKind::Wait => {
                let ms = intent
                    .value
                    .as_deref()
                    .and_then(|v| v.trim().trim_end_matches("ms").trim().parse::<u64>().ok())
                    .unwrap_or(DEFAULT_WAIT_MS);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(None)
            }
            ActionKind::Back => self.driver.press_back().await.map(|_| None),
            ActionKind::Tap | ActionKind::Type | ActionKind::LongPress => self.execute_targeted(intent).await,
            ActionKind::Scroll | ActionKind::Swipe => self.execute_scroll(intent).await,
        };

        match result {
            Ok(strategy) => {
                tracing::debug!(strategy = ?strategy, "action succeeded");
                ActionOutcome::ok(strategy)
            }
            Err(e) => {
                tracing::warn!(action = intent.kind.as_str(), target = %intent.target, error = %e, "action failed");
                ActionOutcome::failed(&e)
            }
        }
    }

    async fn execute_targeted(&self, intent: &ActionIntent) -> TapsightResult<Option<String>> {
        let mut lookup_error = None;
        for locator in primary_locators(&intent.target) {
            if let Some(element) = self.lookup(&locator, &mut lookup_error).await {
                self.apply(intent, &element).await?;
                return Ok(Some(locator.strategy().to_string()));
            }
        }
        if intent.coordinates.is_some() {
            self.apply_at_coordinates(intent).await?;
            return Ok(Some("coordinates".to_string()));
        }
        self.execute_fallbacks(intent, lookup_error).await
    }

    async fn execute_scroll(&self, intent: &ActionIntent) -> TapsightResult<Option<String>> {
        let mut lookup_error = None;
        if is_identifier(&intent.target) {
            let locator = Locator::Id(intent.target.clone());
            if let Some(element) = self.lookup(&locator, &mut lookup_error).await {
                self.apply(intent, &element).await?;
                return Ok(Some("identifier".to_string()));
            }
        }
        for container in container_types(self.platform) {
            let locator = Locator::Type(container.to_string());
            if let Some(element) = self.lookup(&locator, &mut lookup_error).await {
                self.apply(intent, &element).await?;
                return Ok(Some(format!("container:{container}")));
            }
        }
        self.execute_fallbacks(intent, lookup_error).await
    }

    /// Try each fallback target. When nothing resolves, the first lookup
    /// error wins over a plain "target not found".
    async fn execute_fallbacks(
        &self,
        intent: &ActionIntent,
        mut lookup_error: Option<TapsightError>,
    ) -> TapsightResult<Option<String>> {
        for target in &intent.fallback_targets {
            for locator in fallback_locators(target) {
                if let Some(element) = self.lookup(&locator, &mut lookup_error).await {
                    tracing::info!(fallback = %target, strategy = locator.strategy(), "resolved via fallback target");
                    self.apply(intent, &element).await?;
                    return Ok(Some(format!("fallback:{target}")));
                }
            }
        }
        Err(lookup_error.unwrap_or_else(|| TapsightError::TargetNotFound(intent.target.clone())))
    }

    /// A failed lookup counts as a miss; the first error is kept in `first_error`.
    async fn lookup(&self, locator: &Locator, first_error: &mut Option<TapsightError>) -> Option<ElementRef> {
        match self.driver.find(locator).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(locator = %locator, error = %e, "element lookup failed");
                first_error.get_or_insert(e);
                None
            }
        }
    }

    async fn apply(&self, intent: &ActionIntent, element: &ElementRef) -> TapsightResult<()> {
        for gesture in self.gestures(intent)? {
            self.driver.perform(element, &gesture).await?;
        }
        Ok(())
    }

    async fn apply_at_coordinates(&self, intent: &ActionIntent) -> TapsightResult<()> {
        let point = intent
            .coordinates
            .ok_or_else(|| TapsightError::TargetNotFound(intent.target.clone()))?;
        match intent.kind {
            ActionKind::Tap => self.driver.tap_at(point).await,
            ActionKind::LongPress => self.driver.long_press_at(point).await,
            ActionKind::Type => {
                self.driver.tap_at(point).await?;
                self.driver
                    .type_into_focused(intent.value.as_deref().unwrap_or(""))
                    .await
            }
            other => Err(TapsightError::Executor(format!(
                "{} cannot be performed at coordinates",
                other.as_str()
            ))),
        }
    }

    fn gestures(&self, intent: &ActionIntent) -> TapsightResult<Vec<Gesture>> {
        let direction = |default: Direction| {
            intent
                .value
                .as_deref()
                .and_then(Direction::parse)
                .unwrap_or(default)
        };
        Ok(match intent.kind {
            ActionKind::Tap => vec![Gesture::Tap],
            ActionKind::LongPress => vec![Gesture::LongPress],
            ActionKind::Type => vec![
                Gesture::ClearText,
                Gesture::TypeText {
                    text: intent.value.clone().unwrap_or_default(),
                },
            ],
            ActionKind::Scroll => vec![Gesture::Scroll {
                pixels: self.scroll_px,
                direction: direction(Direction::Down),
            }],
            ActionKind::Swipe => vec![Gesture::Swipe {
                direction: direction(Direction::Up),
            }],
            other => {
                return Err(TapsightError::Executor(format!(
                    "{} has no element gesture",
                    other.as_str()
                )))
            }
        })
    }
}
