//! Investigation execution

use procure_ai::Message;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::gateway::{CallRequest, Gateway};
use crate::prompts;
use crate::request::TurnOptions;
use crate::state::ConversationState;
use crate::tool::ToolSet;

/// Run the investigation and record the report.
///
/// The report is passed through as the model wrote it. It becomes both
/// `report_markdown` and `last_response_text`.
pub async fn execute(
    gateway: &Gateway,
    tools: &ToolSet,
    state: &mut ConversationState,
    options: &TurnOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let company = state
        .company
        .clone()
        .unwrap_or_else(|| prompts::COMPANY_PLACEHOLDER.to_string());
    let plan_markdown = state.plan_markdown.clone().unwrap_or_default();

    let request = CallRequest::new(
        prompts::extend_system_prompt(prompts::INVESTIGATION_PROMPT),
        vec![Message::user(prompts::execution_prompt(&company, &plan_markdown))],
    )
    .with_tools(tools.tools())
    .with_temperature(Some(options.temperature.unwrap_or(0.0)))
    .with_model(gateway.override_model(options.model.as_deref()));

    let reply = gateway.complete(request, cancel).await?;
    tracing::debug!(company = %company, chars = reply.text().len(), "investigation report received");

    state.record_reply(reply);
    state.report_markdown = state.last_response_text.clone();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Reply, ScriptedTransport};
    use procure_ai::{Role, Tool};

    fn planned() -> ConversationState {
        let mut state = ConversationState::new(vec![Message::user("Investigate Acme Corp")]);
        state.company = Some("Acme Corp".into());
        state.plan_markdown = Some("# Investigation plan\n\n- Check owners".into());
        state
    }

    #[tokio::test]
    async fn test_report_recorded() {
        let transport = ScriptedTransport::new([Reply::text(testing::acme_report())]);
        let gateway = testing::gateway(&transport);
        let mut state = planned();

        execute(&gateway, &ToolSet::default(), &mut state, &TurnOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        let report = state.report_markdown.clone().unwrap();
        for header in prompts::REPORT_SECTIONS {
            assert!(report.contains(header));
        }
        assert_eq!(state.last_response_text.as_deref(), Some(report.as_str()));
        assert_eq!(state.messages.last().unwrap().role(), Role::Assistant);
        assert_eq!(state.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_call_shape_defaults() {
        let transport = ScriptedTransport::new([Reply::text("report")]);
        let gateway = testing::gateway(&transport);
        let mut state = planned();

        execute(&gateway, &ToolSet::default(), &mut state, &TurnOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        let call = &transport.calls()[0];
        assert_eq!(call.config.temperature, Some(0.0));
        assert_eq!(call.config.tools, vec![Tool::WebSearch]);
        assert!(call.config.response_format.is_none());
        assert!(call.config.system_prompt.as_deref().unwrap().contains("SPECIAL INVESTIGATION MODE"));
        let prompt = call.messages[0].text();
        assert!(prompt.contains("\"Acme Corp\""));
        assert!(prompt.contains("- Check owners"));
    }

    #[tokio::test]
    async fn test_caller_temperature_and_knowledge_base() {
        let transport = ScriptedTransport::new([Reply::text("report")]);
        let gateway = testing::gateway(&transport);
        let mut state = planned();
        let options = TurnOptions {
            model: None,
            temperature: Some(0.7),
        };

        execute(
            &gateway,
            &ToolSet::new(Some("vs_kb".into())),
            &mut state,
            &options,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let call = &transport.calls()[0];
        assert_eq!(call.config.temperature, Some(0.7));
        assert_eq!(call.config.tools.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_leaves_report_unset() {
        let transport = ScriptedTransport::new([Reply::Fail("HTTP 500".into())]);
        let gateway = testing::gateway(&transport);
        let mut state = planned();

        let result =
            execute(&gateway, &ToolSet::default(), &mut state, &TurnOptions::default(), &CancellationToken::new())
                .await;
        assert!(result.is_err());
        assert!(state.report_markdown.is_none());
        assert_eq!(state.messages.len(), 1);
    }
}
