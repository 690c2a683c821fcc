//! Claude provider: Anthropic messages API, single message, no sources.

use super::client::{endpoint_url, ProviderTransport};
use super::errors::InferenceError;
use super::openai::NO_HINT_PLACEHOLDER;
use super::types::{Candidate, ChatMessage, MessagesRequest, MessagesResponse, Role};

impl ProviderTransport {
    /// One messages call. Never retried; always yields exactly one candidate.
    pub async fn complete_anthropic(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        credential: &str,
    ) -> Result<Candidate, InferenceError> {
        let settings = &self.providers().anthropic;
        let url = endpoint_url(&settings.base_url, "messages");

        let body = MessagesRequest {
            model: settings.model.clone(),
            max_tokens: 500,
            system: system_prompt.to_string(),
            messages: vec![ChatMessage::new(Role::User, user_prompt)],
        };

        tracing::info!(url = %url, model = %body.model, "=== MESSAGES REQUEST ===");

        let request = self
            .http()
            .post(&url)
            .header("x-api-key", credential)
            .header("anthropic-version", &settings.api_version)
            .json(&body);
        let raw = self.send_once(request, &url).await?;
        parse_messages_response(&raw)
    }
}

/// Extract `content[0].text`, substituting the placeholder.
pub fn parse_messages_response(body: &str) -> Result<Candidate, InferenceError> {
    let response: MessagesResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::MalformedResponse {
            reason: format!("failed to parse messages response: {e}"),
        })?;

    let text = response
        .content
        .first()
        .and_then(|block| block.text.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(NO_HINT_PLACEHOLDER);

    Ok(Candidate::new(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fake_config;

    #[test]
    fn test_parse_messages_response_text() {
        let body = r#"{"content":[{"type":"text","text":"Find the blue key."}]}"#;
        assert_eq!(parse_messages_response(body).unwrap().text, "Find the blue key.");
    }

    #[test]
    fn test_parse_messages_response_placeholder() {
        assert_eq!(
            parse_messages_response(r#"{"content":[]}"#).unwrap().text,
            NO_HINT_PLACEHOLDER
        );
    }

    #[tokio::test]
    async fn test_complete_anthropic_sends_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/messages")
            .match_header("x-api-key", "ak-test")
            .match_header("anthropic-version", "2023-06-01")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "system": "sys",
                "messages": [{"role": "user", "content": "user"}]
            })))
            .with_status(200)
            .with_body(r#"{"content":[{"type":"text","text":"Use the lift."}]}"#)
            .expect(1)
            .create_async()
            .await;

        let transport = ProviderTransport::from_config(&fake_config(&server.url(), &["m"])).unwrap();
        let candidate = transport
            .complete_anthropic("sys", "user", "ak-test")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(candidate.text, "Use the lift.");
    }

    #[tokio::test]
    async fn test_complete_anthropic_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/messages")
            .with_status(401)
            .with_body("invalid x-api-key")
            .create_async()
            .await;

        let transport = ProviderTransport::from_config(&fake_config(&server.url(), &["m"])).unwrap();
        let err = transport
            .complete_anthropic("sys", "user", "bad")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InferenceError::HttpError { status: 401, ref body } if body == "invalid x-api-key"
        ));
    }
}
