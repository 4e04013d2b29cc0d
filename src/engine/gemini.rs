//! Google Gemini translation engine using `models.generateContent`.

use super::{map_send_error, EngineError, TranslationEngine, AUTO_LANGUAGE, DEFAULT_ENGINE_TIMEOUT};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GEMINI_API_ROOT: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";

/// Gemini engine. The model is prompted to return the bare translation.
pub struct GeminiEngine {
    client: Client,
    api_key: String,
    model: String,
    timeout: Option<Duration>,
}

impl GeminiEngine {
    pub fn new(api_key: String) -> Self {
        Self::with_client(Client::new(), api_key)
    }

    /// Share an existing HTTP client (connection pool) with other engines
    pub fn with_client(client: Client, api_key: String) -> Self {
        Self::with_model(client, api_key, DEFAULT_MODEL.to_string())
    }

    pub fn with_model(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
            timeout: Some(DEFAULT_ENGINE_TIMEOUT),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn normalize_model_name(model: &str) -> String {
        let trimmed = model.trim();
        if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{}", trimmed)
        }
    }

    /// English name for a language code; unknown codes pass through unchanged
    fn language_name(code: &str) -> &str {
        match code.trim().to_ascii_lowercase().as_str() {
            AUTO_LANGUAGE => "auto-detect",
            "zh" | "zh-cn" | "zh-chs" => "Chinese",
            "zh-tw" | "zh-cht" => "Traditional Chinese",
            "en" => "English",
            "ja" => "Japanese",
            "ko" => "Korean",
            "fr" => "French",
            "de" => "German",
            "es" => "Spanish",
            "it" => "Italian",
            "pt" => "Portuguese",
            "ru" => "Russian",
            _ => code,
        }
    }

    fn build_prompt(text: &str, from: &str, to: &str) -> String {
        format!(
            "Translate the following text from {} to {}. Return only the translation, no explanations or additional text:\n\n{}",
            Self::language_name(from),
            Self::language_name(to),
            text
        )
    }

    fn extract_text(response: &GenerateContentResponse) -> Result<String, EngineError> {
        let candidate = response
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .ok_or_else(|| EngineError::InvalidResponse("Gemini API returned no candidates".to_string()))?;

        let text = candidate
            .content
            .as_ref()
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
            .map(str::trim)
            .ok_or_else(|| {
                EngineError::InvalidResponse("Gemini API returned a candidate without text".to_string())
            })?;

        if text.is_empty() {
            return Err(EngineError::InvalidResponse(
                "Gemini API returned empty candidate text".to_string(),
            ));
        }

        Ok(text.to_string())
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[async_trait]
impl TranslationEngine for GeminiEngine {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn description(&self) -> &'static str {
        "Google Gemini generative translation"
    }

    async fn request_translation(&self, text: &str, from: &str, to: &str) -> Result<String, EngineError> {
        if self.api_key.trim().is_empty() {
            return Err(EngineError::NoApiKey("gemini".to_string()));
        }

        let url = format!(
            "{}/{}:generateContent",
            GEMINI_API_ROOT,
            Self::normalize_model_name(&self.model)
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(Self::build_prompt(text, from, to)),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                max_output_tokens: 4096,
            },
        };

        let mut req = self
            .client
            .post(url)
            .header("x-goog-api-key", self.api_key.trim())
            .json(&request);

        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let response = req.send().await.map_err(|e| map_send_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiErrorResponse>(&error_text)
                .map(|r| r.error.message)
                .unwrap_or(error_text);
            return Err(EngineError::Api(format!("Gemini API error ({}): {}", status, message)));
        }

        let response_json: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(format!("Failed to parse Gemini response: {}", e)))?;

        let translated = Self::extract_text(&response_json)?;
        log::debug!("Engine[gemini]: {} -> {} ({} chars)", from, to, translated.chars().count());
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> GenerateContentResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_normalize_model_name() {
        assert_eq!(
            GeminiEngine::normalize_model_name("gemini-2.0-flash-lite"),
            "models/gemini-2.0-flash-lite"
        );
        assert_eq!(
            GeminiEngine::normalize_model_name(" models/gemini-2.5-flash "),
            "models/gemini-2.5-flash"
        );
    }

    #[test]
    fn test_prompt_names_languages() {
        let prompt = GeminiEngine::build_prompt("你好", "zh-CN", "en");
        assert!(prompt.starts_with("Translate the following text from Chinese to English."));
        assert!(prompt.ends_with("\n\n你好"));

        let prompt = GeminiEngine::build_prompt("hola", "auto", "de");
        assert!(prompt.contains("from auto-detect to German"));

        // Unknown codes are used verbatim
        let prompt = GeminiEngine::build_prompt("hej", "sv", "nl");
        assert!(prompt.contains("from sv to nl"));
    }

    #[test]
    fn test_extract_first_part_trimmed() {
        let response = parse(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"  Hello world\n"},{"text":"ignored"}]}}]}"#,
        );
        assert_eq!(GeminiEngine::extract_text(&response).unwrap(), "Hello world");
    }

    #[test]
    fn test_extract_rejects_missing_or_empty() {
        let response = parse(r#"{"candidates":[]}"#);
        assert!(matches!(
            GeminiEngine::extract_text(&response),
            Err(EngineError::InvalidResponse(_))
        ));

        let response = parse(r#"{"candidates":[{"content":{"parts":[]}}]}"#);
        assert!(GeminiEngine::extract_text(&response).is_err());

        let response = parse(r#"{"candidates":[{"content":{"parts":[{"text":"   "}]}}]}"#);
        assert!(GeminiEngine::extract_text(&response).is_err());

        let response = parse(r#"{}"#);
        assert!(GeminiEngine::extract_text(&response).is_err());
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some("hi".to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                max_output_tokens: 4096,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 4096);
    }

    #[tokio::test]
    async fn test_missing_key_is_reported() {
        let engine = GeminiEngine::new("  ".to_string());
        let err = engine.request_translation("hello", "auto", "de").await.unwrap_err();
        assert!(matches!(err, EngineError::NoApiKey(_)));
        assert_eq!(engine.translate("hello", "auto", "de").await, "hello");
    }

    #[test]
    fn test_builders() {
        let engine = GeminiEngine::new("k".to_string());
        assert_eq!(engine.model(), DEFAULT_MODEL);
        assert_eq!(engine.timeout, Some(DEFAULT_ENGINE_TIMEOUT));
        let engine = engine.without_timeout();
        assert!(engine.timeout.is_none());
        let engine = engine.with_timeout(Duration::from_secs(5));
        assert_eq!(engine.timeout, Some(Duration::from_secs(5)));
    }
}
