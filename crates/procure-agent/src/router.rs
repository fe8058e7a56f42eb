//! Intent classification

use procure_ai::Message;
use tokio_util::sync::CancellationToken;

use crate::contracts::RouterDecision;
use crate::error::{Error, Result};
use crate::gateway::{CallRequest, Gateway};
use crate::prompts;
use crate::request::TurnOptions;
use crate::state::ConversationState;

/// Decide whether the latest user message asks for an investigation.
///
/// Fails with [`Error::EmptyInput`] before calling the model when the history
/// holds no user message. Output that does not fit the contract falls back to
/// chat.
pub async fn route(
    gateway: &Gateway,
    state: &ConversationState,
    options: &TurnOptions,
    cancel: &CancellationToken,
) -> Result<RouterDecision> {
    let latest = state.latest_user_text().ok_or(Error::EmptyInput)?;

    let request = CallRequest::new(
        prompts::extend_system_prompt(prompts::ROUTER_INSTRUCTIONS),
        vec![Message::user(latest)],
    )
    .with_temperature(Some(0.0))
    .with_model(gateway.override_model(options.model.as_deref()));

    match gateway.structured::<RouterDecision>(request, cancel).await? {
        Ok(decision) => {
            tracing::info!(mode = decision.mode.as_str(), company = ?decision.company, "routed");
            Ok(decision)
        }
        Err(mismatch) => {
            tracing::warn!("Router output unusable, falling back to chat: {}", mismatch);
            Ok(RouterDecision::fallback())
        }
    }
}
