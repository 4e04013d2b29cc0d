//! Integration tests for translation engines.
//!
//! The live tests call the real APIs - run with `cargo test -- --ignored`
//! when you have `YOUDAO_APP_KEY` + `YOUDAO_APP_SECRET` or `GEMINI_API_KEY` set.

use crate::engine::{GeminiEngine, TranslationEngine, YoudaoEngine};
use std::time::Duration;

fn env_key(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(key) if !key.trim().is_empty() => Some(key),
        _ => None,
    }
}

#[test]
fn test_youdao_engine_implements_trait() {
    let engine = YoudaoEngine::new("app".to_string(), "secret".to_string());
    assert_eq!(engine.name(), "youdao");
    assert_eq!(engine.description(), "Youdao Translation API");
}

#[test]
fn test_gemini_engine_with_custom_model() {
    let engine = GeminiEngine::with_model(
        reqwest::Client::new(),
        "test_key".to_string(),
        "gemini-2.5-flash".to_string(),
    );
    assert_eq!(engine.name(), "gemini");
    assert_eq!(engine.model(), "gemini-2.5-flash");
}

/// Only runs if YOUDAO_APP_KEY and YOUDAO_APP_SECRET are set.
#[tokio::test]
#[ignore] // Run with `cargo test -- --ignored` when you have API keys
async fn test_youdao_translation_integration() {
    let (Some(app_key), Some(app_secret)) = (env_key("YOUDAO_APP_KEY"), env_key("YOUDAO_APP_SECRET")) else {
        eprintln!("Skipping Youdao integration test: YOUDAO_APP_KEY / YOUDAO_APP_SECRET not set");
        return;
    };
    let engine = YoudaoEngine::new(app_key, app_secret).with_timeout(Duration::from_secs(15));

    let result = engine.request_translation("你好", "auto", "en").await;
    assert!(result.is_ok(), "Youdao translation failed: {:?}", result);
    assert!(engine.is_available().await);
}

/// Only runs if GEMINI_API_KEY is set.
#[tokio::test]
#[ignore] // Run with `cargo test -- --ignored` when you have API keys
async fn test_gemini_translation_integration() {
    let Some(api_key) = env_key("GEMINI_API_KEY") else {
        eprintln!("Skipping Gemini integration test: GEMINI_API_KEY not set");
        return;
    };
    let engine = GeminiEngine::new(api_key).with_timeout(Duration::from_secs(30));

    let result = engine.request_translation("Guten Morgen", "de", "en").await;
    let translated = result.expect("Gemini translation failed");
    assert!(!translated.is_empty());
    assert!(!translated.contains("Translate the following"));
}

#[tokio::test]
#[ignore]
async fn test_bad_gemini_key_degrades_to_original_text() {
    let engine = GeminiEngine::new("invalid-key".to_string()).with_timeout(Duration::from_secs(15));
    assert_eq!(engine.translate("hallo", "auto", "en").await, "hallo");
    assert!(!engine.is_available().await);
}
