use crate::engine::state::StepResult;

pub const SYSTEM_PROMPT: &str = r#"You are a mobile app testing assistant. You receive screenshots of a running iOS or Android app and decide the single next UI action.

Rules:
- Describe only what is visible in the screenshot. Never guess at hidden content.
- List every interactive element you can see (buttons, inputs, tabs, toggles, list items, links).
- Prefer stable identifiers (testID / accessibility id) as targets when visible; otherwise use the exact visible text or accessibility label.
- Propose exactly one next action.
- When the goal is already achieved and nothing more is needed, answer with action type "none" and confidence "high".
- Reply with a single JSON object in this shape and nothing else:

{
  "description": "what the screen shows",
  "currentState": "short_snake_case_screen_name",
  "elements": [
    {"type": "button|input|tab|toggle|list|link|text|image", "identifier": "id or visible text", "state": "enabled|disabled|selected", "position": "top|center|bottom ...", "interactive": true}
  ],
  "action": {
    "type": "tap|type|scroll|swipe|longPress|back|wait|none",
    "target": "identifier, visible text or accessibility label",
    "value": "text to type, direction (up/down/left/right) or wait milliseconds",
    "coordinates": {"x": 0, "y": 0},
    "fallbackTargets": ["alternative target", "..."]
  },
  "confidence": "high|medium|low",
  "reasoning": "why this action",
  "concerns": "anything that looks wrong or risky"
}"#;

/// One-line summary of a previous step for the running context.
pub fn step_summary(step: &StepResult) -> String {
    let outcome = if step.success { "succeeded" } else { "failed" };
    match &step.error {
        Some(err) if !step.success => format!(
            "Step {}: {} -> {outcome} ({err})",
            step.step,
            step.action.summary()
        ),
        _ => format!("Step {}: {} -> {outcome}", step.step, step.action.summary()),
    }
}

/// Prompt for one step of a goal run. `recent` is the bounded context window.
pub fn goal_step_prompt(goal: &str, recent: &[StepResult], step: usize, max_steps: usize) -> String {
    let mut prompt = format!("Goal: {goal}\n\nThis is step {step} of at most {max_steps}.\n");
    if recent.is_empty() {
        prompt.push_str("No actions have been taken yet.\n");
    } else {
        prompt.push_str("\nRecent actions:\n");
        for s in recent {
            prompt.push_str(&step_summary(s));
            prompt.push('\n');
        }
    }
    prompt.push_str(
        "\nLook at the current screenshot. If the goal is visibly achieved, reply with action \"none\" and confidence \"high\". \
         Otherwise propose the next action toward the goal. If a previous action failed, try a different target.",
    );
    prompt
}

/// Prompt for one exploration step.
pub fn explore_prompt(visited: &[String], depth: usize) -> String {
    let visited_list = if visited.is_empty() {
        "none yet".to_string()
    } else {
        visited.join(", ")
    };
    format!(
        "You are exploring the app without a fixed goal to map its screens.\n\
         Screens already visited: {visited_list}\n\
         Current navigation depth: {depth}\n\n\
         Identify the current screen with a stable snake_case \"currentState\" name (reuse a visited name if this is the same screen). \
         List every interactive element with its identifier. \
         In addition to the usual fields, include:\n\
         \"issues\": [{{\"category\": \"visual|functional|accessibility|performance\", \"severity\": \"low|medium|high\", \"description\": \"...\", \"element\": \"...\"}}],\n\
         \"suggestedTests\": [\"short test case description\", \"...\"]\n\
         Use empty arrays when there is nothing to report."
    )
}

/// Open-ended question asked after a low-confidence failure. The answer is advisory only.
pub fn recovery_prompt(goal: Option<&str>, failed_step: &StepResult) -> String {
    let goal_line = goal.map(|g| format!("The goal is: {g}\n")).unwrap_or_default();
    format!(
        "{goal_line}The last action failed: {}\n\
         The app may be stuck behind a dialog, keyboard, loading state or unexpected screen. \
         Describe what is blocking progress and how to get back to a usable state.",
        step_summary(failed_step)
    )
}

/// System prompt for the recovery advisor. Free text, no JSON contract.
pub const RECOVERY_SYSTEM_PROMPT: &str =
    "You are helping an automated mobile app test get unstuck. Look at the screenshot and answer in two or three plain sentences.";

/// Default prompt for one-off screenshot analysis.
pub const ANALYZE_PROMPT: &str =
    "Analyze this screenshot. Describe the screen, list interactive elements and propose the single most useful next action.";
