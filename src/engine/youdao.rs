//! Youdao translation engine (signed form POST, `signType=v3`).

use super::{map_send_error, EngineError, TranslationEngine, DEFAULT_ENGINE_TIMEOUT};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

const YOUDAO_API_URL: &str = "https://openapi.youdao.com/api";

/// Inputs longer than this are abbreviated before signing
const SIGN_INPUT_LIMIT: usize = 20;

pub struct YoudaoEngine {
    client: Client,
    app_key: String,
    app_secret: String,
    timeout: Option<Duration>,
}

impl YoudaoEngine {
    pub fn new(app_key: String, app_secret: String) -> Self {
        Self::with_client(Client::new(), app_key, app_secret)
    }

    pub fn with_client(client: Client, app_key: String, app_secret: String) -> Self {
        Self {
            client,
            app_key,
            app_secret,
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

    /// First 10 chars + char count + last 10 chars, for inputs over 20 chars
    fn truncate_for_sign(q: &str) -> String {
        let chars: Vec<char> = q.chars().collect();
        let len = chars.len();
        if len <= SIGN_INPUT_LIMIT {
            return q.to_string();
        }
        let head: String = chars[..10].iter().collect();
        let tail: String = chars[len - 10..].iter().collect();
        format!("{}{}{}", head, len, tail)
    }

    /// Lowercase hex SHA-256 of appKey + input + salt + curtime + appSecret
    fn sign(&self, q: &str, salt: &str, curtime: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.app_key.as_bytes());
        hasher.update(Self::truncate_for_sign(q).as_bytes());
        hasher.update(salt.as_bytes());
        hasher.update(curtime.as_bytes());
        hasher.update(self.app_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Youdao spells a few language codes its own way
    fn language_code(code: &str) -> &str {
        match code.trim() {
            "zh" | "zh-CN" | "zh-cn" => "zh-CHS",
            "zh-TW" | "zh-tw" => "zh-CHT",
            other => other,
        }
    }

    fn build_form(&self, text: &str, from: &str, to: &str, curtime: &str) -> Vec<(&'static str, String)> {
        // Youdao accepts the timestamp as salt
        let salt = curtime;
        vec![
            ("q", text.to_string()),
            ("from", Self::language_code(from).to_string()),
            ("to", Self::language_code(to).to_string()),
            ("appKey", self.app_key.clone()),
            ("salt", salt.to_string()),
            ("sign", self.sign(text, salt, curtime)),
            ("signType", "v3".to_string()),
            ("curtime", curtime.to_string()),
        ]
    }

    fn extract_translation(response: YoudaoResponse) -> Result<String, EngineError> {
        if let Some(code) = response.error_code.as_deref() {
            if code != "0" {
                return Err(EngineError::Api(format!("Youdao API error code {}", code)));
            }
        }

        response
            .translation
            .and_then(|t| t.into_iter().next())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| EngineError::InvalidResponse("Youdao response has no translation".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct YoudaoResponse {
    #[serde(default, rename = "errorCode")]
    error_code: Option<String>,
    #[serde(default)]
    translation: Option<Vec<String>>,
}

#[async_trait]
impl TranslationEngine for YoudaoEngine {
    fn name(&self) -> &'static str {
        "youdao"
    }

    fn description(&self) -> &'static str {
        "Youdao Translation API"
    }

    async fn request_translation(&self, text: &str, from: &str, to: &str) -> Result<String, EngineError> {
        if self.app_key.trim().is_empty() || self.app_secret.trim().is_empty() {
            return Err(EngineError::NoApiKey("youdao".to_string()));
        }

        let curtime = chrono::Utc::now().timestamp().to_string();
        let form = self.build_form(text, from, to, &curtime);

        let mut req = self.client.post(YOUDAO_API_URL).form(&form);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let response = req.send().await.map_err(|e| map_send_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EngineError::Api(format!("Youdao API error ({}): {}", status, error_text)));
        }

        let body: YoudaoResponse = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(format!("Failed to parse Youdao response: {}", e)))?;

        let translated = Self::extract_translation(body)?;
        log::debug!("Engine[youdao]: {} -> {} ({} chars)", from, to, translated.chars().count());
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> YoudaoEngine {
        YoudaoEngine::new("appid".to_string(), "secret".to_string())
    }

    fn parse(body: &str) -> YoudaoResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_truncate_short_input_unchanged() {
        assert_eq!(YoudaoEngine::truncate_for_sign("hello"), "hello");
        let exactly_twenty = "a".repeat(20);
        assert_eq!(YoudaoEngine::truncate_for_sign(&exactly_twenty), exactly_twenty);
    }

    #[test]
    fn test_truncate_long_input() {
        assert_eq!(
            YoudaoEngine::truncate_for_sign("abcdefghijklmnopqrstuvwxyz1234"),
            "abcdefghij30uvwxyz1234"
        );
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let text = "一二三四五六七八九十甲乙丙丁戊己庚辛壬癸子";
        assert_eq!(text.chars().count(), 21);
        assert_eq!(
            YoudaoEngine::truncate_for_sign(text),
            "一二三四五六七八九十21乙丙丁戊己庚辛壬癸子"
        );
    }

    #[test]
    fn test_sign_known_answers() {
        let engine = engine();
        assert_eq!(
            engine.sign("hello", "1700000000", "1700000000"),
            "f068947b44e4a8ef0ec3c016d453626d87f1f0d40d93c11824c3a12885ee3e38"
        );
        assert_eq!(
            engine.sign("abcdefghijklmnopqrstuvwxyz1234", "1700000000", "1700000000"),
            "d99600bd23bd2abb9bcee742abc7a80dca5c5b9299763d61fa913ea5becbd366"
        );
    }

    #[test]
    fn test_form_fields() {
        let form = engine().build_form("hello", "auto", "zh", "1700000000");
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        assert_eq!(get("q"), "hello");
        assert_eq!(get("from"), "auto");
        assert_eq!(get("to"), "zh-CHS");
        assert_eq!(get("appKey"), "appid");
        assert_eq!(get("salt"), "1700000000");
        assert_eq!(get("curtime"), "1700000000");
        assert_eq!(get("signType"), "v3");
        assert_eq!(
            get("sign"),
            "f068947b44e4a8ef0ec3c016d453626d87f1f0d40d93c11824c3a12885ee3e38"
        );
    }

    #[test]
    fn test_extract_translation() {
        let ok = parse(r#"{"errorCode":"0","translation":["你好","ignored"],"query":"hello"}"#);
        assert_eq!(YoudaoEngine::extract_translation(ok).unwrap(), "你好");

        let failed = parse(r#"{"errorCode":"202"}"#);
        assert!(matches!(
            YoudaoEngine::extract_translation(failed),
            Err(EngineError::Api(ref msg)) if msg.contains("202")
        ));

        let empty = parse(r#"{"errorCode":"0","translation":[]}"#);
        assert!(matches!(
            YoudaoEngine::extract_translation(empty),
            Err(EngineError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let engine = YoudaoEngine::new("appid".to_string(), String::new());
        let err = engine.request_translation("hello", "auto", "en").await.unwrap_err();
        assert!(matches!(err, EngineError::NoApiKey(_)));
        assert!(!engine.is_available().await);
    }
}
