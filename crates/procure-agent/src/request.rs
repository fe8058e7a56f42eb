//! Inbound turn requests and their validation

use procure_ai::{Message, Role};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Accepted temperature range, inclusive
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

/// One role-tagged message as the caller sends it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub role: String,
    pub content: String,
}

impl InboundMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

/// A single chat turn as submitted by a caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub messages: Vec<InboundMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// Per-turn overrides carried alongside the history
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// A request that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedTurn {
    pub messages: Vec<Message>,
    pub options: TurnOptions,
    pub thread_id: Option<String>,
}

impl TurnRequest {
    /// Single user message, no overrides
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            messages: vec![InboundMessage::user(text)],
            ..Default::default()
        }
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Check the request and convert it into provider messages.
    ///
    /// Runs before any LLM call. Checks, in order: non-empty list, known
    /// roles, temperature range.
    pub fn validate(self) -> Result<ValidatedTurn> {
        if self.messages.is_empty() {
            return Err(Error::NoMessages);
        }

        let messages = self
            .messages
            .into_iter()
            .map(|m| {
                Role::parse(&m.role)
                    .map(|role| Message::with_role(role, m.content))
                    .ok_or(Error::InvalidRole(m.role))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(t) = self.temperature {
            if !t.is_finite() || !TEMPERATURE_RANGE.contains(&t) {
                return Err(Error::InvalidTemperature(t));
            }
        }

        let model = self
            .model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        let thread_id = self
            .thread_id
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(ValidatedTurn {
            messages,
            options: TurnOptions {
                model,
                temperature: self.temperature,
            },
            thread_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_chat_body() {
        let request: TurnRequest = serde_json::from_str(
            r#"{"messages": [{"role": "user", "content": "hi"}], "temperature": 0.3, "thread_id": "t-1"}"#,
        )
        .unwrap();
        assert_eq!(request.messages, vec![InboundMessage::user("hi")]);
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.thread_id.as_deref(), Some("t-1"));
        assert_eq!(request.model, None);
    }

    #[test]
    fn test_empty_messages_rejected() {
        let err = TurnRequest::default().validate().unwrap_err();
        assert!(matches!(err, Error::NoMessages));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_unknown_role_rejected() {
        let request = TurnRequest {
            messages: vec![InboundMessage::user("hi"), InboundMessage::new("tool", "{}")],
            ..Default::default()
        };
        match request.validate().unwrap_err() {
            Error::InvalidRole(role) => assert_eq!(role, "tool"),
            other => panic!("expected InvalidRole, got {:?}", other),
        }
    }

    #[test]
    fn test_roles_are_case_insensitive() {
        let request = TurnRequest {
            messages: vec![
                InboundMessage::new("System", "be brief"),
                InboundMessage::new("USER", "hi"),
                InboundMessage::new("assistant", "hello"),
            ],
            ..Default::default()
        };
        let turn = request.validate().unwrap();
        let roles: Vec<Role> = turn.messages.iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    }

    #[test]
    fn test_temperature_bounds() {
        assert!(TurnRequest::from_text("hi").with_temperature(0.0).validate().is_ok());
        assert!(TurnRequest::from_text("hi").with_temperature(2.0).validate().is_ok());

        for bad in [2.5, -0.1, f32::NAN, f32::INFINITY] {
            let err = TurnRequest::from_text("hi")
                .with_temperature(bad)
                .validate()
                .unwrap_err();
            assert!(matches!(err, Error::InvalidTemperature(_)), "{} accepted", bad);
        }
    }

    #[test]
    fn test_role_checked_before_temperature() {
        let request = TurnRequest {
            messages: vec![InboundMessage::new("tool", "x")],
            temperature: Some(9.0),
            ..Default::default()
        };
        assert!(matches!(request.validate().unwrap_err(), Error::InvalidRole(_)));
    }

    #[test]
    fn test_blank_overrides_dropped() {
        let turn = TurnRequest::from_text("hi")
            .with_model("  ")
            .with_thread_id("")
            .validate()
            .unwrap();
        assert_eq!(turn.options.model, None);
        assert_eq!(turn.thread_id, None);
    }
}
