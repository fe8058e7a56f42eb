//! OpenAI Responses API provider

use std::collections::BTreeMap;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

use super::LlmProvider;
use crate::{
    error::{Error, Result},
    stream::{MessageEvent, MessageEventStream},
    types::{
        AssistantMetadata, Content, Context, Message, MessageContent, Model, ResponseFormat,
        StopReason, StreamOptions, Tool, Usage,
    },
};

/// OpenAI API client
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    fn headers(&self, model: &Model) -> Result<reqwest::header::HeaderMap> {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key)
            .parse()
            .map_err(|_| Error::InvalidApiKey)?;
        headers.insert(reqwest::header::AUTHORIZATION, auth);
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        // Add model-specific headers
        for (key, value) in &model.headers {
            if let (Ok(name), Ok(val)) = (
                key.parse::<reqwest::header::HeaderName>(),
                value.parse::<reqwest::header::HeaderValue>(),
            ) {
                headers.insert(name, val);
            }
        }
        Ok(headers)
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    async fn stream(
        &self,
        model: &Model,
        context: &Context,
        options: &StreamOptions,
    ) -> Result<MessageEventStream> {
        let request = build_request(model, context, options);
        let url = format!("{}/responses", model.base_url);

        tracing::debug!(
            model = %model.id,
            inputs = request.input.len(),
            tools = request.tools.as_ref().map_or(0, |t| t.len()),
            structured = request.text.is_some(),
            "Sending Responses API request"
        );

        let request_builder = self
            .client
            .post(&url)
            .headers(self.headers(model)?)
            .json(&request);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(create_stream(event_source, model.clone())))
    }
}

fn build_request(model: &Model, context: &Context, options: &StreamOptions) -> ResponsesRequest {
    let mut input = Vec::new();

    if let Some(ref system_prompt) = context.system_prompt {
        input.push(InputMessage::new("system", system_prompt.clone()));
    }

    for msg in &context.messages {
        input.push(InputMessage::new(msg.role().as_str(), msg.text()));
    }

    let tools = if context.tools.is_empty() {
        None
    } else {
        Some(context.tools.iter().map(convert_tool).collect())
    };

    let text = options
        .response_format
        .as_ref()
        .map(|format| match format {
            ResponseFormat::JsonSchema {
                name,
                schema,
                strict,
            } => TextConfig {
                format: TextFormat {
                    format_type: "json_schema".to_string(),
                    name: name.clone(),
                    schema: schema.clone(),
                    strict: *strict,
                },
            },
        });

    ResponsesRequest {
        model: model.id.clone(),
        input,
        stream: true,
        max_output_tokens: Some(options.max_tokens.unwrap_or(model.max_tokens)),
        temperature: options.temperature,
        tools,
        text,
    }
}

fn convert_tool(tool: &Tool) -> serde_json::Value {
    match tool {
        Tool::WebSearch => serde_json::json!({ "type": "web_search_preview" }),
        Tool::FileSearch { vector_store_ids } => serde_json::json!({
            "type": "file_search",
            "vector_store_ids": vector_store_ids,
        }),
    }
}

/// Collect the text parts of a finished `message` output item
fn item_text(item: &OutputItem) -> String {
    item.content
        .iter()
        .filter(|part| part.part_type == "output_text")
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join("")
}

fn convert_usage(usage: &ResponseUsage) -> Usage {
    Usage {
        input: usage.input_tokens,
        output: usage.output_tokens,
        cache_read: usage
            .input_tokens_details
            .as_ref()
            .map_or(0, |d| d.cached_tokens),
        reasoning: usage
            .output_tokens_details
            .as_ref()
            .map_or(0, |d| d.reasoning_tokens),
    }
}

async fn status_error(status: reqwest::StatusCode, response: reqwest::Response) -> Error {
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    Error::from_status(status.as_u16(), body, retry_after)
}

/// Folds Responses API stream events into one assistant message
#[derive(Debug)]
struct ResponseAssembler {
    model_id: String,
    // Output items keyed by output_index so the final message keeps provider order
    blocks: BTreeMap<usize, Content>,
    response_id: Option<String>,
}

impl ResponseAssembler {
    fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            blocks: BTreeMap::new(),
            response_id: None,
        }
    }

    /// Apply one event. Returns the terminal event once the response is over.
    fn apply(&mut self, event: StreamEvent) -> Option<MessageEvent> {
        match event {
            StreamEvent::Created { response } => {
                self.response_id = response.id;
                None
            }
            StreamEvent::OutputItemAdded { output_index, item } => {
                if item.item_type == "message" {
                    self.blocks.entry(output_index).or_insert_with(|| Content::text(""));
                }
                None
            }
            StreamEvent::OutputTextDelta { output_index, delta } => {
                match self.blocks.get_mut(&output_index) {
                    Some(Content::Text { text }) => text.push_str(&delta),
                    _ => {
                        self.blocks.insert(output_index, Content::text(delta));
                    }
                }
                None
            }
            StreamEvent::OutputItemDone { output_index, item } => {
                let block = if item.item_type == "message" {
                    Content::text(item_text(&item))
                } else {
                    Content::other(item.item_type)
                };
                self.blocks.insert(output_index, block);
                None
            }
            StreamEvent::Completed { response } => Some(self.finish(response, StopReason::Stop)),
            StreamEvent::Incomplete { response } => {
                let reason = response
                    .incomplete_details
                    .as_ref()
                    .and_then(|d| d.reason.as_deref())
                    .unwrap_or_default();
                tracing::warn!("Response incomplete: {}", reason);
                Some(self.finish(response, StopReason::Length))
            }
            StreamEvent::Failed { response } => {
                let error = response
                    .error
                    .map(|e| Error::api(e.code.unwrap_or_else(|| "response_failed".into()), e.message))
                    .unwrap_or_else(|| Error::api("response_failed", "response failed without detail"));
                Some(MessageEvent::from_error(&error))
            }
            StreamEvent::Error { code, message } => {
                let error = Error::api(code.unwrap_or_else(|| "error".into()), message);
                Some(MessageEvent::from_error(&error))
            }
            StreamEvent::Other => None,
        }
    }

    fn finish(&mut self, response: ResponseObject, stop_reason: StopReason) -> MessageEvent {
        let usage = response.usage.as_ref().map(convert_usage).unwrap_or_default();
        let message = Message::Assistant {
            content: MessageContent::Blocks(std::mem::take(&mut self.blocks).into_values().collect()),
            metadata: AssistantMetadata {
                model: Some(self.model_id.clone()),
                response_id: response.id.or_else(|| self.response_id.take()),
                usage: usage.clone(),
                stop_reason: Some(stop_reason),
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        };
        MessageEvent::Done {
            message,
            stop_reason,
            usage,
        }
    }

    /// Terminal event for a stream that closed before the response finished
    fn interrupted() -> MessageEvent {
        MessageEvent::Error {
            message: "Stream ended before the response completed".to_string(),
            retryable: true,
        }
    }
}

fn create_stream(
    mut event_source: EventSource,
    model: Model,
) -> impl futures::Stream<Item = MessageEvent> {
    stream! {
        let mut assembler = ResponseAssembler::new(model.id.clone());

        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(msg)) => {
                    let parsed = match serde_json::from_str::<StreamEvent>(&msg.data) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            event_source.close();
                            yield MessageEvent::Error {
                                message: format!("Failed to parse event: {}", e),
                                retryable: false,
                            };
                            return;
                        }
                    };

                    if let Some(terminal) = assembler.apply(parsed) {
                        event_source.close();
                        yield terminal;
                        return;
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    event_source.close();
                    let error = status_error(status, response).await;
                    yield MessageEvent::from_error(&error);
                    return;
                }
                Err(reqwest_eventsource::Error::Transport(e)) => {
                    event_source.close();
                    yield MessageEvent::from_error(&Error::Http(e));
                    return;
                }
                Err(e) => {
                    event_source.close();
                    yield MessageEvent::from_error(&Error::Sse(e.to_string()));
                    return;
                }
            }
        }

        event_source.close();
        yield ResponseAssembler::interrupted();
    }
}

// Request types

#[derive(Debug, Serialize)]
struct ResponsesRequest {
    model: String,
    input: Vec<InputMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<TextConfig>,
}

#[derive(Debug, Serialize)]
struct InputMessage {
    role: String,
    content: Vec<InputContent>,
}

impl InputMessage {
    fn new(role: &str, text: String) -> Self {
        // Prior assistant turns are replayed as output text, everything else as input text
        let content_type = if role == "assistant" {
            "output_text"
        } else {
            "input_text"
        };
        Self {
            role: role.to_string(),
            content: vec![InputContent {
                content_type: content_type.to_string(),
                text,
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct InputContent {
    #[serde(rename = "type")]
    content_type: String,
    text: String,
}

#[derive(Debug, Serialize)]
struct TextConfig {
    format: TextFormat,
}

#[derive(Debug, Serialize)]
struct TextFormat {
    #[serde(rename = "type")]
    format_type: String,
    name: String,
    schema: serde_json::Value,
    strict: bool,
}

// Streaming response types

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum StreamEvent {
    #[serde(rename = "response.created")]
    Created { response: ResponseObject },
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        output_index: usize,
        item: OutputItem,
    },
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta { output_index: usize, delta: String },
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        output_index: usize,
        item: OutputItem,
    },
    #[serde(rename = "response.completed")]
    Completed { response: ResponseObject },
    #[serde(rename = "response.incomplete")]
    Incomplete { response: ResponseObject },
    #[serde(rename = "response.failed")]
    Failed { response: ResponseObject },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        code: Option<String>,
        message: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ResponseObject {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    usage: Option<ResponseUsage>,
    #[serde(default)]
    error: Option<ResponseError>,
    #[serde(default)]
    incomplete_details: Option<IncompleteDetails>,
}

#[derive(Debug, Deserialize)]
struct ResponseError {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct IncompleteDetails {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    content: Vec<OutputContentPart>,
}

#[derive(Debug, Deserialize)]
struct OutputContentPart {
    #[serde(rename = "type")]
    part_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    input_tokens: u32,
    output_tokens: u32,
    #[serde(default)]
    input_tokens_details: Option<InputTokensDetails>,
    #[serde(default)]
    output_tokens_details: Option<OutputTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct InputTokensDetails {
    #[serde(default)]
    cached_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OutputTokensDetails {
    #[serde(default)]
    reasoning_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_model() -> Model {
        crate::models::get_model("gpt-4.1-mini", "http://localhost")
    }

    #[test]
    fn test_build_request_shapes_input_and_tools() {
        let mut context = Context::with_system("be helpful");
        context.push(Message::user("hi"));
        context.push(Message::assistant("hello"));
        context.add_tool(Tool::WebSearch);
        context.add_tool(Tool::FileSearch {
            vector_store_ids: vec!["vs_123".into()],
        });
        let options = StreamOptions {
            temperature: Some(0.0),
            ..Default::default()
        };

        let request = build_request(&test_model(), &context, &options);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4.1-mini");
        assert_eq!(json["stream"], true);
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["input"][0]["role"], "system");
        assert_eq!(json["input"][0]["content"][0]["type"], "input_text");
        assert_eq!(json["input"][1]["content"][0]["text"], "hi");
        assert_eq!(json["input"][2]["role"], "assistant");
        assert_eq!(json["input"][2]["content"][0]["type"], "output_text");
        assert_eq!(json["tools"][0]["type"], "web_search_preview");
        assert_eq!(json["tools"][1]["type"], "file_search");
        assert_eq!(json["tools"][1]["vector_store_ids"][0], "vs_123");
        assert!(json.get("text").is_none());
    }

    #[test]
    fn test_build_request_with_schema_and_no_temperature() {
        let context = Context::with_system("classify");
        let options = StreamOptions {
            response_format: Some(ResponseFormat::json_schema(
                "router_decision",
                serde_json::json!({"type": "object"}),
            )),
            ..Default::default()
        };

        let request = build_request(&test_model(), &context, &options);
        let json = serde_json::to_value(&request).unwrap();

        assert!(json.get("temperature").is_none());
        assert!(json.get("tools").is_none());
        assert_eq!(json["text"]["format"]["type"], "json_schema");
        assert_eq!(json["text"]["format"]["name"], "router_decision");
        assert_eq!(json["text"]["format"]["strict"], false);
    }

    #[test]
    fn test_parse_stream_events() {
        let delta: StreamEvent = serde_json::from_str(
            r#"{"type":"response.output_text.delta","item_id":"msg_1","output_index":1,"content_index":0,"delta":"Hi"}"#,
        )
        .unwrap();
        assert!(matches!(delta, StreamEvent::OutputTextDelta { output_index: 1, .. }));

        let unknown: StreamEvent =
            serde_json::from_str(r#"{"type":"response.web_search_call.searching","output_index":0}"#)
                .unwrap();
        assert!(matches!(unknown, StreamEvent::Other));

        let completed: StreamEvent = serde_json::from_str(
            r#"{"type":"response.completed","response":{"id":"resp_1","status":"completed","usage":{"input_tokens":12,"output_tokens":4,"output_tokens_details":{"reasoning_tokens":0}}}}"#,
        )
        .unwrap();
        match completed {
            StreamEvent::Completed { response } => {
                let usage = convert_usage(response.usage.as_ref().unwrap());
                assert_eq!(usage.input, 12);
                assert_eq!(usage.output, 4);
                assert_eq!(response.id.as_deref(), Some("resp_1"));
            }
            other => panic!("expected completed, got {:?}", other),
        }
    }

    #[test]
    fn test_item_text_joins_output_text_parts() {
        let item: OutputItem = serde_json::from_str(
            r#"{"type":"message","id":"msg_1","content":[
                {"type":"output_text","text":"Part one. ","annotations":[]},
                {"type":"refusal","refusal":"no"},
                {"type":"output_text","text":"Part two.","annotations":[]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(item_text(&item), "Part one. Part two.");
    }

    /// Feed raw SSE payloads through the assembler the way the stream loop does
    fn assemble(payloads: &[&str]) -> MessageEvent {
        let mut assembler = ResponseAssembler::new("gpt-4.1-mini");
        for payload in payloads {
            let event: StreamEvent = serde_json::from_str(payload).unwrap();
            if let Some(terminal) = assembler.apply(event) {
                return terminal;
            }
        }
        ResponseAssembler::interrupted()
    }

    const CREATED: &str = r#"{"type":"response.created","response":{"id":"resp_1"}}"#;

    #[test]
    fn test_assembler_orders_blocks_by_output_index() {
        let event = assemble(&[
            CREATED,
            r#"{"type":"response.output_item.added","output_index":1,"item":{"type":"message"}}"#,
            r#"{"type":"response.output_text.delta","output_index":1,"delta":"Acme "}"#,
            r#"{"type":"response.output_item.done","output_index":0,"item":{"type":"web_search_call"}}"#,
            r#"{"type":"response.output_text.delta","output_index":1,"delta":"report"}"#,
            r#"{"type":"response.completed","response":{"usage":{"input_tokens":20,"output_tokens":5}}}"#,
        ]);

        match event {
            MessageEvent::Done {
                message,
                stop_reason,
                usage,
            } => {
                assert_eq!(stop_reason, StopReason::Stop);
                assert_eq!(usage.input, 20);
                assert_eq!(message.text(), "Acme report");
                assert_eq!(
                    message.content(),
                    &MessageContent::Blocks(vec![
                        Content::other("web_search_call"),
                        Content::text("Acme report"),
                    ])
                );
                match message {
                    Message::Assistant { metadata, .. } => {
                        assert_eq!(metadata.response_id.as_deref(), Some("resp_1"));
                        assert_eq!(metadata.model.as_deref(), Some("gpt-4.1-mini"));
                    }
                    other => panic!("expected assistant message, got {:?}", other),
                }
            }
            other => panic!("expected done, got {:?}", other),
        }
    }

    #[test]
    fn test_assembler_item_done_replaces_deltas() {
        let event = assemble(&[
            r#"{"type":"response.output_text.delta","output_index":0,"delta":"draf"}"#,
            r#"{"type":"response.output_item.done","output_index":0,"item":{"type":"message","content":[{"type":"output_text","text":"final"}]}}"#,
            r#"{"type":"response.completed","response":{"id":"resp_2"}}"#,
        ]);
        match event {
            MessageEvent::Done { message, .. } => assert_eq!(message.text(), "final"),
            other => panic!("expected done, got {:?}", other),
        }
    }

    #[test]
    fn test_assembler_incomplete_stops_on_length() {
        let event = assemble(&[
            CREATED,
            r#"{"type":"response.output_text.delta","output_index":0,"delta":"cut sh"}"#,
            r#"{"type":"response.incomplete","response":{"incomplete_details":{"reason":"max_output_tokens"}}}"#,
        ]);
        match event {
            MessageEvent::Done {
                message, stop_reason, ..
            } => {
                assert_eq!(stop_reason, StopReason::Length);
                assert_eq!(message.text(), "cut sh");
            }
            other => panic!("expected done, got {:?}", other),
        }
    }

    #[test]
    fn test_assembler_failed_response_is_not_retryable() {
        let event = assemble(&[
            CREATED,
            r#"{"type":"response.failed","response":{"error":{"code":"invalid_prompt","message":"prompt rejected"}}}"#,
        ]);
        match event {
            MessageEvent::Error { message, retryable } => {
                assert!(!retryable);
                assert!(message.contains("prompt rejected"));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_assembler_failed_server_error_is_retryable() {
        let event = assemble(&[
            r#"{"type":"response.failed","response":{"error":{"code":"server_error","message":"try again"}}}"#,
        ]);
        assert!(matches!(event, MessageEvent::Error { retryable: true, .. }));
    }

    #[test]
    fn test_assembler_error_event() {
        let limited = assemble(&[r#"{"type":"error","code":"rate_limit_exceeded","message":"slow down"}"#]);
        assert!(matches!(limited, MessageEvent::Error { retryable: true, .. }));

        let invalid = assemble(&[r#"{"type":"error","message":"Unknown parameter: 'foo'"}"#]);
        assert!(matches!(invalid, MessageEvent::Error { retryable: false, .. }));
    }

    #[test]
    fn test_stream_closed_before_completion_is_retryable() {
        let event = assemble(&[
            CREATED,
            r#"{"type":"response.output_text.delta","output_index":0,"delta":"half"}"#,
        ]);
        match event {
            MessageEvent::Error { message, retryable } => {
                assert!(retryable);
                assert!(message.contains("before the response completed"));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unusable_api_key_fails_before_sending() {
        let provider = OpenAIProvider::new("sk-bad\nkey");
        let result = provider
            .stream(&test_model(), &Context::default(), &StreamOptions::default())
            .await;
        assert!(matches!(result, Err(Error::InvalidApiKey)));
    }
}
