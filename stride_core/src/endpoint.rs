//! Client for the generative endpoint.
//!
//! One HTTP POST JSON endpoint serves both plan generation and coach chat.
//! The request carries conversation contents, an optional system instruction
//! and an optional generation config; the reply nests its text under
//! `candidates[0].content.parts[0].text`. Authentication is a pre-shared key
//! appended to the URL.
//!
//! Failure taxonomy is deliberately flat: non-success status, a missing text
//! part and a transport error all surface as an `Err` here, which callers
//! convert into "no result" at their boundary. No retries.

use crate::config::CoachConfig;
use crate::{ChatRole, ChatTurn, Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl Content {
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(String::from),
            parts: vec![Part { text: text.into() }],
        }
    }

    pub fn from_turn(turn: &ChatTurn) -> Self {
        let role = match turn.role {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        };
        Self::text(Some(role), turn.text.clone())
    }
}

// ============================================================================
// Client
// ============================================================================

/// Blocking client for the generative endpoint
pub struct CoachEndpoint {
    http: reqwest::blocking::Client,
    url: String,
    api_key: String,
}

impl CoachEndpoint {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
            api_key: api_key.into(),
        })
    }

    /// Build a client from configuration, resolving the API key
    pub fn from_config(config: &CoachConfig) -> Result<Self> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            Error::Config(format!(
                "no API key: set {} or coach.api_key in the config file",
                config.api_key_env
            ))
        })?;
        Self::new(config.endpoint.clone(), api_key)
    }

    /// Send one request and return the reply text
    pub fn generate(&self, request: &GenerateContentRequest) -> Result<String> {
        let url = format!("{}?key={}", self.url, self.api_key);
        let response = self.http.post(&url).json(request).send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!("Endpoint returned {}: {}", status, body);
            return Err(Error::Endpoint(format!("endpoint returned {}", status)));
        }

        let parsed: GenerateContentResponse = response.json()?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Endpoint("reply carried no text".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_camel_case() {
        let request = GenerateContentRequest {
            contents: vec![Content::text(Some("user"), "hello")],
            system_instruction: Some(Content::text(None, "be brief")),
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json".into(),
                response_schema: serde_json::json!({"type": "ARRAY"}),
            }),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("systemInstruction").is_some());
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_response_text_extraction_shape() {
        let raw = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"hi"}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text);
        assert_eq!(text.as_deref(), Some("hi"));
    }

    #[test]
    fn test_response_without_candidates_parses() {
        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());
    }

    #[test]
    fn test_turn_roles_map_to_wire_names() {
        let user = Content::from_turn(&ChatTurn::user("hi"));
        let model = Content::from_turn(&ChatTurn::model("hello"));
        assert_eq!(user.role.as_deref(), Some("user"));
        assert_eq!(model.role.as_deref(), Some("model"));
    }
}
