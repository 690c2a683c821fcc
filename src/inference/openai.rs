//! ChatGPT provider: OpenAI chat completions, single message, no sources.

use super::client::{endpoint_url, ProviderTransport};
use super::errors::InferenceError;
use super::types::{Candidate, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Role};

/// Text substituted when a single-message provider returns no text.
pub const NO_HINT_PLACEHOLDER: &str = "Could not generate a hint.";

impl ProviderTransport {
    /// One chat completion. Never retried; always yields exactly one candidate.
    pub async fn complete_openai(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        credential: &str,
    ) -> Result<Candidate, InferenceError> {
        let settings = &self.providers().openai;
        let url = endpoint_url(&settings.base_url, "chat/completions");

        let body = ChatCompletionRequest {
            model: settings.model.clone(),
            messages: vec![
                ChatMessage::new(Role::System, system_prompt),
                ChatMessage::new(Role::User, user_prompt),
            ],
            temperature: 0.7,
            max_tokens: 500,
        };

        tracing::info!(url = %url, model = %body.model, "=== CHAT REQUEST ===");

        let request = self.http().post(&url).bearer_auth(credential).json(&body);
        let raw = self.send_once(request, &url).await?;
        parse_chat_completion(&raw)
    }
}

/// Extract `choices[0].message.content`, substituting the placeholder.
pub fn parse_chat_completion(body: &str) -> Result<Candidate, InferenceError> {
    let response: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::MalformedResponse {
            reason: format!("failed to parse chat completion: {e}"),
        })?;

    let text = response
        .choices
        .first()
        .and_then(|c| c.message.content.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(NO_HINT_PLACEHOLDER);

    Ok(Candidate::new(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fake_config;
    use mockito::Matcher;

    #[test]
    fn test_parse_chat_completion_text() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":" Open the gate. "}}]}"#;
        assert_eq!(parse_chat_completion(body).unwrap().text, "Open the gate.");
    }

    #[test]
    fn test_parse_chat_completion_placeholder() {
        assert_eq!(
            parse_chat_completion(r#"{"choices":[]}"#).unwrap().text,
            NO_HINT_PLACEHOLDER
        );
        assert_eq!(
            parse_chat_completion(r#"{"choices":[{"message":{"content":""}}]}"#)
                .unwrap()
                .text,
            NO_HINT_PLACEHOLDER
        );
    }

    #[tokio::test]
    async fn test_complete_openai_sends_bearer_and_messages() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "user"}
                ],
                "max_tokens": 500
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"Climb the tower."}}]}"#)
            .expect(1)
            .create_async()
            .await;

        let transport = ProviderTransport::from_config(&fake_config(&server.url(), &["m"])).unwrap();
        let candidate = transport.complete_openai("sys", "user", "sk-test").await.unwrap();

        mock.assert_async().await;
        assert_eq!(candidate.text, "Climb the tower.");
        assert!(candidate.sources.is_empty());
    }

    #[tokio::test]
    async fn test_complete_openai_does_not_retry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .expect(1)
            .create_async()
            .await;

        let transport = ProviderTransport::from_config(&fake_config(&server.url(), &["m"])).unwrap();
        let err = transport.complete_openai("sys", "user", "k").await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, InferenceError::HttpError { status: 503, .. }));
    }
}
