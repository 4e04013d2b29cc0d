//! Translation engines.
//!
//! Every backend implements [`TranslationEngine`]. The [`EngineRegistry`]
//! holds the configured engines and the active selection; it is rebuilt from
//! settings on every reload rather than edited in place.

mod gemini;
mod youdao;

pub use gemini::GeminiEngine;
pub use youdao::YoudaoEngine;

use async_trait::async_trait;
use reqwest::Client;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// Default timeout for engine HTTP requests
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(30);

/// Source language meaning "let the backend detect it"
pub const AUTO_LANGUAGE: &str = "auto";

/// Errors that can occur while selecting or calling an engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine '{0}' not found")]
    NotFound(String),

    #[error("No translation engine available")]
    NoEngineAvailable,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("No credentials configured for engine: {0}")]
    NoApiKey(String),
}

/// Map a transport error, reporting timeouts with the configured limit
pub(crate) fn map_send_error(e: reqwest::Error, timeout: Option<Duration>) -> EngineError {
    match timeout {
        Some(limit) if e.is_timeout() => EngineError::Timeout(limit),
        _ => EngineError::Network(e),
    }
}

/// A translation backend
#[async_trait]
pub trait TranslationEngine: Send + Sync {
    /// Registry key, e.g. "youdao"
    fn name(&self) -> &'static str;

    /// Human readable description
    fn description(&self) -> &'static str;

    /// Perform one translation call, surfacing every failure
    async fn request_translation(
        &self,
        text: &str,
        from: &str,
        to: &str,
    ) -> Result<String, EngineError>;

    /// Translate `text`, degrading to the original text on any failure.
    ///
    /// Callers cannot tell a failure from an engine that echoed its input;
    /// an unchanged result is only a soft failure signal.
    async fn translate(&self, text: &str, from: &str, to: &str) -> String {
        match self.request_translation(text, from, to).await {
            Ok(translated) => translated,
            Err(e) => {
                log::warn!("Engine[{}]: translation failed, keeping original text: {}", self.name(), e);
                text.to_string()
            }
        }
    }

    /// Probe the backend with a trivial translation
    async fn is_available(&self) -> bool {
        match self.request_translation("test", AUTO_LANGUAGE, "en").await {
            Ok(result) => !result.trim().is_empty(),
            Err(e) => {
                log::debug!("Engine[{}]: availability probe failed: {}", self.name(), e);
                false
            }
        }
    }
}

/// Registered engines plus the active selection.
///
/// Invariant: `current`, when set, always names a registered engine.
pub struct EngineRegistry {
    engines: HashMap<String, Arc<dyn TranslationEngine>>,
    /// Registration order, so the first-registered default is stable
    order: Vec<String>,
    current: Option<String>,
}

impl EngineRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            engines: HashMap::new(),
            order: Vec::new(),
            current: None,
        }
    }

    /// Add or replace an engine by name. The first one becomes current.
    pub fn register(&mut self, engine: Arc<dyn TranslationEngine>) {
        let name = engine.name().to_string();
        if self.engines.insert(name.clone(), engine).is_none() {
            self.order.push(name.clone());
        }
        if self.current.is_none() {
            self.current = Some(name);
        }
    }

    /// Select the active engine by name
    pub fn set_current(&mut self, name: &str) -> Result<(), EngineError> {
        if self.engines.contains_key(name) {
            self.current = Some(name.to_string());
            Ok(())
        } else {
            Err(EngineError::NotFound(name.to_string()))
        }
    }

    /// Get the active engine
    pub fn current(&self) -> Option<Arc<dyn TranslationEngine>> {
        self.current
            .as_ref()
            .and_then(|name| self.engines.get(name))
            .cloned()
    }

    /// Get an engine by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn TranslationEngine>> {
        self.engines.get(name).cloned()
    }

    /// Registered engine names in registration order
    pub fn list_engines(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Name of the active engine, if any
    pub fn current_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Dispatch to the active engine.
    ///
    /// Fails only when no engine is selected; the engine itself degrades to
    /// the original text on its own failures.
    pub async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String, EngineError> {
        let engine = self.current().ok_or(EngineError::NoEngineAvailable)?;
        Ok(engine.translate(text, from, to).await)
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Credentials for one engine: opaque key/value strings from the settings file
pub type EngineCredentials = BTreeMap<String, String>;

fn credential<'a>(credentials: &'a EngineCredentials, key: &str) -> Option<&'a str> {
    credentials
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Instantiate the engine named `name` if its credentials are complete.
///
/// Returns `None` for unknown engines and for engines without credentials,
/// which are simply not registered.
pub fn create_engine(
    name: &str,
    credentials: &EngineCredentials,
    client: Client,
    timeout: Option<Duration>,
) -> Option<Arc<dyn TranslationEngine>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "youdao" => {
            let app_key = credential(credentials, "app_key")?;
            let app_secret = credential(credentials, "app_secret")?;
            let engine = YoudaoEngine::with_client(client, app_key.to_string(), app_secret.to_string());
            Some(Arc::new(match timeout {
                Some(t) => engine.with_timeout(t),
                None => engine.without_timeout(),
            }))
        }
        "gemini" => {
            let api_key = credential(credentials, "api_key")?;
            let engine = match credential(credentials, "model") {
                Some(model) => GeminiEngine::with_model(client, api_key.to_string(), model.to_string()),
                None => GeminiEngine::with_client(client, api_key.to_string()),
            };
            Some(Arc::new(match timeout {
                Some(t) => engine.with_timeout(t),
                None => engine.without_timeout(),
            }))
        }
        other => {
            log::warn!("Engine[{}]: unknown engine in settings, skipping", other);
            None
        }
    }
}

/// Build a registry with every engine whose credentials are complete.
///
/// The active engine is not selected here; callers follow up with
/// [`EngineRegistry::set_current`].
pub fn build_registry(
    engines: &BTreeMap<String, EngineCredentials>,
    client: &Client,
    timeout: Option<Duration>,
) -> EngineRegistry {
    let mut registry = EngineRegistry::new();
    for (name, credentials) in engines {
        match create_engine(name, credentials, client.clone(), timeout) {
            Some(engine) => {
                log::info!("Engine[{}]: registered ({})", engine.name(), engine.description());
                registry.register(engine);
            }
            None => log::debug!("Engine[{}]: not registered", name),
        }
    }
    registry
}
