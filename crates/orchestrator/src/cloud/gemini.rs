//! Spec inference through the Gemini `generateContent` API

use super::failure_detail;
use crate::ports::SpecInference;
use architect_common::{Error, Result, ServiceSpec};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const SYSTEM_INSTRUCTION: &str = r#"You are API Architect. Convert the user's description of a small REST microservice into a single JSON object and output nothing else: no commentary, no Markdown.

The object has the keys "service_name" and "endpoint".
- "service_name": DNS-compliant (lowercase letters, digits, hyphens), at most 30 characters, derived from the description. "contact form api" becomes "contact-form-api".
- "endpoint": an object with the keys "path", "method", "model_name" and "schema_fields".
  - "path": a static URL path starting with "/", without parameters.
  - "method": one of "GET", "POST", "PUT", "DELETE".
  - "model_name": a PascalCase type name such as "ContactForm" or "WebhookPayload".
  - "schema_fields": an array of objects with the keys "name" (snake_case), "type" and "required" (boolean).
- "type" is one of: str, int, float, bool, EmailStr, List[str], List[int], Dict[str, Any]. Use EmailStr for anything that holds an email address.
- When the description does not say whether a field is required, treat it as required for POST and PUT."#;

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, all parts joined
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Gemini-backed [`SpecInference`]
pub struct GeminiInference {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiInference {
    pub fn new(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }

    fn url(&self) -> String {
        let model = self.model.strip_prefix("models/").unwrap_or(&self.model);
        format!("{}/models/{}:generateContent", GEMINI_API_BASE, model)
    }
}

#[async_trait]
impl SpecInference for GeminiInference {
    async fn infer(&self, prompt: &str) -> Result<ServiceSpec> {
        let body = json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseMimeType": "application/json" }
        });

        debug!("Requesting spec from {}", self.model);
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("request to the model failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Inference(format!(
                "model returned {}",
                failure_detail(response).await
            )));
        }

        let response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("unreadable model response: {}", e)))?;

        ServiceSpec::from_model_output(&response.text())
    }
}
