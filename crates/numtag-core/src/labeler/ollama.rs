//! OpenAI-compatible chat completions client (Ollama's `/v1` API).

use std::future::Future;
use std::pin::Pin;

use serde_json::{Value, json};

use super::{LabelerError, PageRequest, SemanticLabeler};
use crate::models::ModelEndpoint;
use crate::prompt::PromptTemplate;

/// Labels pages by prompting a chat model for a JSON object.
pub struct OllamaLabeler {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    prompt: PromptTemplate,
}

impl OllamaLabeler {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(2)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into(),
            api_key: None,
            client,
            prompt: PromptTemplate::default(),
        }
    }

    pub fn from_endpoint(endpoint: &ModelEndpoint) -> Self {
        let mut labeler = Self::new(endpoint.base_url.clone());
        labeler.api_key = endpoint.api_key.clone();
        labeler
    }

    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// The user prompt for one page.
    pub fn render_prompt(&self, request: &PageRequest) -> String {
        let numbers: Vec<Value> = request
            .records
            .iter()
            .map(|r| {
                json!({
                    "value": r.value,
                    "context": r.context,
                    "syntax_label": r.syntax_label,
                })
            })
            .collect();
        let numbers_json =
            serde_json::to_string_pretty(&numbers).unwrap_or_else(|_| "[]".to_string());
        self.prompt
            .render(request.page_number, &request.page_text, &numbers_json)
    }
}

/// Request body with sampling pinned for repeatable output.
pub fn build_request_body(model_id: &str, prompt: &str) -> Value {
    json!({
        "model": model_id,
        "messages": [{ "role": "user", "content": prompt }],
        "response_format": { "type": "json_object" },
        "temperature": 0,
        "top_p": 1,
        "seed": 42,
        "stream": false,
        "options": {
            "seed": 42,
            "temperature": 0,
            "top_k": 0,
            "top_p": 1.0,
            "mirostat": 0,
            "repeat_penalty": 1.0,
            "num_ctx": 8192,
            "num_predict": 2048,
        },
    })
}

/// `choices[0].message.content`, if present and non-blank.
pub fn extract_message_content(body: &Value) -> Option<String> {
    body.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

impl SemanticLabeler for OllamaLabeler {
    fn name(&self) -> &str {
        "ollama"
    }

    fn label<'a>(
        &'a self,
        request: &'a PageRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, LabelerError>> + Send + 'a>> {
        Box::pin(async move {
            let prompt = self.render_prompt(request);
            let body = build_request_body(&request.model_id, &prompt);

            let mut req = self.client.post(self.completions_url()).json(&body);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }

            let resp = req.send().await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(LabelerError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let data: Value = resp.json().await?;
            let content = extract_message_content(&data).ok_or(LabelerError::EmptyResponse)?;
            tracing::debug!(
                page = request.page_number,
                chars = content.len(),
                "model responded"
            );
            Ok(content)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SyntaxLabel, TokenRecord};

    #[test]
    fn completions_url_trims_slash() {
        assert_eq!(
            OllamaLabeler::new("http://localhost:11434/").completions_url(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn body_pins_sampling() {
        let body = build_request_body("llama3.2:latest", "hi");
        assert_eq!(body["model"], "llama3.2:latest");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["temperature"], 0);
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["seed"], 42);
        assert_eq!(body["options"]["num_ctx"], 8192);
        assert_eq!(body["options"]["num_predict"], 2048);
    }

    #[test]
    fn message_content_extraction() {
        let body = json!({"choices": [{"message": {"content": "{\"classification\": []}"}}]});
        assert_eq!(
            extract_message_content(&body).as_deref(),
            Some("{\"classification\": []}")
        );
        assert_eq!(extract_message_content(&json!({"choices": []})), None);
        let blank = json!({"choices": [{"message": {"content": "  "}}]});
        assert_eq!(extract_message_content(&blank), None);
    }

    #[test]
    fn prompt_includes_records() {
        let labeler = OllamaLabeler::new("http://x")
            .with_prompt(PromptTemplate::new("{page_number}|{numbers_json}"));
        let request = PageRequest {
            page_number: 2,
            page_text: String::new(),
            records: vec![TokenRecord {
                value: "5,000".into(),
                page_number: 2,
                context: "Award of 5,000 units".into(),
                syntax_label: SyntaxLabel::GrantedUnits,
            }],
            model_id: "m".into(),
        };
        let prompt = labeler.render_prompt(&request);
        assert!(prompt.starts_with("2|"));
        assert!(prompt.contains("\"granted_units\""));
        assert!(prompt.contains("Award of 5,000 units"));
    }

    #[test]
    fn from_endpoint_keeps_key() {
        let endpoint = ModelEndpoint {
            base_url: "http://gpu:11434".into(),
            model_id: "qwen2.5:latest".into(),
            api_key: Some("k".into()),
        };
        let labeler = OllamaLabeler::from_endpoint(&endpoint);
        assert_eq!(labeler.api_key.as_deref(), Some("k"));
        assert_eq!(labeler.completions_url(), "http://gpu:11434/v1/chat/completions");
    }
}
