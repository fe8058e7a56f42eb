//! General chat replies

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::gateway::{CallRequest, Gateway};
use crate::prompts;
use crate::request::TurnOptions;
use crate::state::ConversationState;
use crate::tool::ToolSet;

/// Answer the conversation as a general assistant.
pub async fn respond(
    gateway: &Gateway,
    tools: &ToolSet,
    state: &mut ConversationState,
    options: &TurnOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let request = CallRequest::new(prompts::SYSTEM_PROMPT, state.messages.clone())
        .with_tools(tools.tools())
        .with_temperature(options.temperature)
        .with_model(gateway.override_model(options.model.as_deref()));

    let reply = gateway.complete(request, cancel).await?;
    state.record_reply(reply);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Reply, ScriptedTransport};
    use procure_ai::{Message, Role};

    #[tokio::test]
    async fn test_history_forwarded_with_roles() {
        let transport = ScriptedTransport::new([Reply::text("Hello! How can I help?")]);
        let gateway = testing::gateway(&transport);
        let mut state = ConversationState::new(vec![
            Message::system("answer in French"),
            Message::user("hi"),
            Message::assistant("bonjour"),
            Message::user("how are you?"),
        ]);

        respond(&gateway, &ToolSet::default(), &mut state, &TurnOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        let call = &transport.calls()[0];
        let roles: Vec<Role> = call.messages.iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(call.config.system_prompt.as_deref(), Some(prompts::SYSTEM_PROMPT));
        assert_eq!(call.config.temperature, None);
        assert!(call.config.response_format.is_none());
        assert_eq!(call.config.tools.len(), 1);

        assert_eq!(state.last_response_text.as_deref(), Some("Hello! How can I help?"));
        assert_eq!(state.messages.len(), 5);
        assert!(state.report_markdown.is_none());
    }

    #[tokio::test]
    async fn test_caller_temperature_passed_through() {
        let transport = ScriptedTransport::new([Reply::text("ok")]);
        let gateway = testing::gateway(&transport);
        let mut state = ConversationState::new(vec![Message::user("hi")]);
        let options = TurnOptions {
            model: None,
            temperature: Some(1.5),
        };

        respond(&gateway, &ToolSet::default(), &mut state, &options, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(transport.calls()[0].config.temperature, Some(1.5));
    }
}
