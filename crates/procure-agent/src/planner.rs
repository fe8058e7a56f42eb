//! Investigation planning

use procure_ai::Message;
use tokio_util::sync::CancellationToken;

use crate::contracts::InvestigationPlan;
use crate::error::Result;
use crate::gateway::{CallRequest, Gateway};
use crate::prompts;
use crate::request::TurnOptions;
use crate::state::ConversationState;

/// Header line of every rendered plan
pub const PLAN_HEADER: &str = "# Investigation plan";

/// Step used when the model's plan is unusable
pub const DEFAULT_STEP: &str = "Review publicly available information";

/// Render plan steps as a markdown checklist, in the order given.
pub fn render_plan_markdown<S: AsRef<str>>(steps: &[S]) -> String {
    let mut lines = vec![PLAN_HEADER.to_string(), String::new()];
    lines.extend(steps.iter().map(|s| format!("- {}", s.as_ref())));
    lines.join("\n")
}

/// Produce the investigation plan and merge it into the state.
///
/// Sets `plan_markdown`, and replaces `company` when the planner named one.
pub async fn plan(
    gateway: &Gateway,
    state: &mut ConversationState,
    options: &TurnOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let company = state
        .company
        .clone()
        .unwrap_or_else(|| prompts::COMPANY_PLACEHOLDER.to_string());
    let user_message = state.latest_user_text().unwrap_or_default();

    let request = CallRequest::new(
        prompts::SYSTEM_PROMPT,
        vec![Message::user(prompts::plan_prompt(&company, &user_message))],
    )
    .with_temperature(Some(0.0))
    .with_model(gateway.override_model(options.model.as_deref()));

    let markdown = match gateway.structured::<InvestigationPlan>(request, cancel).await? {
        Ok(plan) => {
            tracing::debug!(steps = plan.steps.len(), company = ?plan.company, "plan ready");
            if plan.company.is_some() {
                state.company = plan.company;
            }
            render_plan_markdown(&plan.steps)
        }
        Err(mismatch) => {
            tracing::warn!("Planner output unusable, using default plan: {}", mismatch);
            render_plan_markdown(&[DEFAULT_STEP])
        }
    };

    state.plan_markdown = Some(markdown);
    Ok(())
}
