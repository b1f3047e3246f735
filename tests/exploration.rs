mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use tapsight_lib::config::ExplorerConfig;
use tapsight_lib::engine::explorer::Explorer;
use tapsight_lib::engine::state::StopReason;
use tapsight_lib::executor::dispatcher::ActionExecutor;
use tapsight_lib::report::ExplorationReport;

use common::{vision, Phone, Transcript};

fn screen(state: &str, elements: Value) -> String {
    json!({
        "description": format!("The {state} screen"),
        "currentState": state,
        "elements": elements,
        "action": {"type": "none"},
        "confidence": "medium"
    })
    .to_string()
}

fn explorer(transcript: Arc<Transcript>, phone: Arc<Phone>, config: ExplorerConfig) -> Explorer {
    let executor = ActionExecutor::new(phone.clone(), 300, None);
    Explorer::new(
        phone,
        executor,
        vision(transcript),
        ExplorerConfig {
            settle_delay_ms: 0,
            ..config
        },
    )
}

#[tokio::test]
async fn single_screen_budget_stops_after_first_step() {
    let transcript = Transcript::new([
        screen("onboarding", json!([{"type": "button", "identifier": "next-button"}])),
        screen("permissions", json!([])),
    ]);
    let result = explorer(
        transcript,
        Phone::with_ids(&["next-button"]),
        ExplorerConfig {
            max_screens: 1,
            ..ExplorerConfig::default()
        },
    )
    .explore()
    .await
    .unwrap();

    assert_eq!(result.steps.len(), 1);
    assert_eq!(result.screens, vec!["onboarding".to_string()]);
    assert_eq!(result.stop_reason, StopReason::ScreenBudget);
}

#[tokio::test]
async fn avoided_elements_are_never_chosen() {
    let settings = json!([
        {"type": "button", "identifier": "Sign Out"},
        {"type": "button", "identifier": "delete-account-button"},
        {"type": "toggle", "identifier": "dark-mode-toggle"},
        {"type": "button", "identifier": "purchase-pro"}
    ]);
    let transcript = Transcript::new([
        screen("settings", settings.clone()),
        screen("settings", settings.clone()),
        screen("settings", settings),
    ]);
    let phone = Phone::with_ids(&["dark-mode-toggle", "purchase-pro", "delete-account-button"]);
    let result = explorer(
        transcript,
        phone.clone(),
        ExplorerConfig {
            avoid: vec!["sign out".into(), "delete".into(), "PURCHASE".into()],
            ..ExplorerConfig::default()
        },
    )
    .explore()
    .await
    .unwrap();

    assert_eq!(phone.actions(), vec!["Tap dark-mode-toggle".to_string()]);
    assert_eq!(result.stop_reason, StopReason::NothingLeftToExplore);
}

#[tokio::test]
async fn explored_pairs_are_not_revisited() {
    let home = json!([
        {"type": "tab", "identifier": "search-tab"},
        {"type": "button", "identifier": "profile-button"}
    ]);
    let transcript = Transcript::new([
        screen("home", home.clone()),
        screen("search", json!([])),
        screen("home", home.clone()),
        screen("profile", json!([{"type": "text", "identifier": "Jane Doe"}])),
        screen("home", home),
    ]);
    let phone = Phone::with_ids(&["search-tab", "profile-button"]);
    let result = explorer(transcript, phone.clone(), ExplorerConfig::default())
        .explore()
        .await
        .unwrap();

    assert_eq!(
        phone.actions(),
        vec![
            "Tap search-tab".to_string(),
            "back".to_string(),
            "Tap profile-button".to_string(),
            "back".to_string(),
        ]
    );
    assert_eq!(result.screens, vec!["home", "search", "profile"]);
    assert_eq!(result.stop_reason, StopReason::NothingLeftToExplore);

    let report = ExplorationReport::from(&result);
    assert_eq!(report.screens[0].reachable, vec!["profile".to_string(), "search".to_string()]);
    assert_eq!(report.counts.total, 5);
}
