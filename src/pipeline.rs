//! Capture-translate-paste pipeline.
//!
//! One [`TranslationPipeline`] runs per accepted gesture, on a tokio task:
//! select-all and copy in the focused application, read the clipboard,
//! validate, translate with the active engine, write the result back and
//! paste it over the selection.
//!
//! ## Concurrency
//! Pipelines are not serialized. A gesture accepted while an earlier pipeline
//! is still translating starts a second one, and the two can interleave their
//! clipboard writes and paste chords. The gesture cooldown keeps this rare.
//!
//! ## Clipboard
//! The clipboard is left holding the translation afterwards; the user's
//! previous clipboard contents are not restored.

use crate::clipboard::{ClipboardError, ClipboardService, KeyChord};
use crate::engine::{EngineError, EngineRegistry, AUTO_LANGUAGE};
use crate::notify::Notifier;
use crate::retry::{with_retry, RetryConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// DEFAULT PIPELINE CONSTANTS
// ============================================================================

/// Wait after each synthetic chord so the focused app can process it
pub const DEFAULT_KEY_SETTLE_MS: u64 = 30;

/// Extra wait after copy before the clipboard is read
pub const DEFAULT_CLIPBOARD_SETTLE_MS: u64 = 50;

/// Wait between writing the translation and pasting it
pub const DEFAULT_PASTE_SETTLE_MS: u64 = 50;

pub const DEFAULT_CLIPBOARD_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_CLIPBOARD_RETRY_BACKOFF_MS: u64 = 50;

/// Upper bound on one translation call; 0 disables the limit
pub const DEFAULT_TRANSLATE_TIMEOUT_SECS: u64 = 30;

/// Minimum trimmed length, in characters, worth translating
const MIN_TRANSLATABLE_CHARS: usize = 2;

// ============================================================================

/// Errors that end a pipeline run with [`PipelineStatus::Failed`]
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Clipboard error: {0}")]
    Clipboard(#[from] ClipboardError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Translation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Timing and retry tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub key_settle_ms: u64,
    pub clipboard_settle_ms: u64,
    pub paste_settle_ms: u64,
    pub clipboard_retry_attempts: u32,
    pub clipboard_retry_backoff_ms: u64,
    pub translate_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            key_settle_ms: DEFAULT_KEY_SETTLE_MS,
            clipboard_settle_ms: DEFAULT_CLIPBOARD_SETTLE_MS,
            paste_settle_ms: DEFAULT_PASTE_SETTLE_MS,
            clipboard_retry_attempts: DEFAULT_CLIPBOARD_RETRY_ATTEMPTS,
            clipboard_retry_backoff_ms: DEFAULT_CLIPBOARD_RETRY_BACKOFF_MS,
            translate_timeout_secs: DEFAULT_TRANSLATE_TIMEOUT_SECS,
        }
    }
}

impl PipelineConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(
            self.clipboard_retry_attempts,
            Duration::from_millis(self.clipboard_retry_backoff_ms),
        )
    }

    pub fn translate_timeout(&self) -> Option<Duration> {
        match self.translate_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    fn key_settle(&self) -> Duration {
        Duration::from_millis(self.key_settle_ms)
    }

    fn clipboard_settle(&self) -> Duration {
        Duration::from_millis(self.clipboard_settle_ms)
    }

    fn paste_settle(&self) -> Duration {
        Duration::from_millis(self.paste_settle_ms)
    }
}

/// Everything a pipeline run reads from configuration.
///
/// Replaced as a whole on reload; a run keeps the snapshot it started with.
pub struct PipelineSnapshot {
    pub registry: EngineRegistry,
    pub config: PipelineConfig,
    pub target_language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Success,
    Skipped,
    Failed,
}

/// Outcome of one run, reported to the notifier exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    pub status: PipelineStatus,
    pub detail: String,
}

impl PipelineResult {
    fn success(detail: impl Into<String>) -> Self {
        Self {
            status: PipelineStatus::Success,
            detail: detail.into(),
        }
    }

    fn skipped(detail: impl Into<String>) -> Self {
        Self {
            status: PipelineStatus::Skipped,
            detail: detail.into(),
        }
    }

    fn failed(detail: impl Into<String>) -> Self {
        Self {
            status: PipelineStatus::Failed,
            detail: detail.into(),
        }
    }
}

/// True when `text` is worth sending to an engine: at least two characters
/// after trimming, and at least one letter, digit or CJK ideograph.
pub fn is_valid_text_for_translation(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_TRANSLATABLE_CHARS {
        return false;
    }
    trimmed
        .chars()
        .any(|c| c.is_alphanumeric() || ('\u{4E00}'..='\u{9FFF}').contains(&c))
}

/// First `max` characters of `text`, for log lines
fn preview(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

pub struct TranslationPipeline {
    clipboard: Arc<dyn ClipboardService>,
    notifier: Arc<dyn Notifier>,
    snapshot: Arc<PipelineSnapshot>,
}

impl TranslationPipeline {
    pub fn new(
        clipboard: Arc<dyn ClipboardService>,
        notifier: Arc<dyn Notifier>,
        snapshot: Arc<PipelineSnapshot>,
    ) -> Self {
        Self {
            clipboard,
            notifier,
            snapshot,
        }
    }

    /// Run all steps and report the outcome through the notifier.
    pub async fn run(&self, cancel: &CancellationToken) -> PipelineResult {
        let result = match self.execute(cancel).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Pipeline: {}", e);
                let result = PipelineResult::failed(e.to_string());
                match e {
                    PipelineError::Engine(EngineError::NotFound(_) | EngineError::NoEngineAvailable) => {
                        self.notifier.on_engine_error(&result.detail);
                    }
                    _ => self.notifier.on_error(&result.detail),
                }
                return result;
            }
        };

        match result.status {
            PipelineStatus::Success => self.notifier.on_success(&result.detail),
            PipelineStatus::Skipped => self.notifier.on_warning(&result.detail),
            // execute() reports failures as Err
            PipelineStatus::Failed => self.notifier.on_error(&result.detail),
        }
        result
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<PipelineResult, PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let config = &self.snapshot.config;
        let retry = config.retry_config();

        // Step 1: select & copy
        self.send_chord(KeyChord::SelectAll, &retry).await?;
        tokio::time::sleep(config.key_settle()).await;
        self.send_chord(KeyChord::Copy, &retry).await?;
        tokio::time::sleep(config.key_settle()).await;
        tokio::time::sleep(config.clipboard_settle()).await;

        // Step 2: read
        let captured = match self.read_clipboard(&retry).await {
            Some(text) if !text.trim().is_empty() => text,
            _ => {
                log::info!("Pipeline: nothing captured from the focused field");
                return Ok(PipelineResult::skipped("No content to translate"));
            }
        };

        // Step 3: validate
        if !is_valid_text_for_translation(&captured) {
            log::info!("Pipeline: skipping untranslatable text '{}'", preview(&captured, 50));
            return Ok(PipelineResult::skipped("Selected text has nothing to translate"));
        }
        // The selection is replaced as a whole, so surrounding whitespace goes to the engine too
        let source = captured.as_str();
        log::info!("Pipeline: translating '{}'", preview(source.trim(), 50));

        // Step 4: translate
        let translated = self.translate(source, cancel).await?;
        log::info!("Pipeline: result '{}'", preview(&translated, 30));

        // Step 5: write & paste
        with_retry(&retry, || self.clipboard.write_text(&translated)).await?;
        tokio::time::sleep(config.paste_settle()).await;
        self.send_chord(KeyChord::Paste, &retry).await?;

        Ok(PipelineResult::success(format!(
            "Translated {} chars to {}",
            source.trim().chars().count(),
            self.snapshot.target_language
        )))
    }

    async fn send_chord(&self, chord: KeyChord, retry: &RetryConfig) -> Result<(), PipelineError> {
        with_retry(retry, || self.clipboard.send_chord(chord)).await?;
        Ok(())
    }

    /// `None` when the clipboard stayed unreadable through every attempt
    async fn read_clipboard(&self, retry: &RetryConfig) -> Option<String> {
        match with_retry(retry, || self.clipboard.read_text()).await {
            Ok(text) => Some(text),
            Err(e) => {
                log::warn!("Pipeline: clipboard unreadable: {}", e);
                None
            }
        }
    }

    async fn translate(&self, text: &str, cancel: &CancellationToken) -> Result<String, PipelineError> {
        let snapshot = &self.snapshot;
        let timeout = snapshot.config.translate_timeout();
        let deadline = async {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                log::info!("Pipeline: translation cancelled");
                Err(PipelineError::Cancelled)
            }

            _ = deadline => {
                let limit = timeout.unwrap_or_default();
                log::warn!("Pipeline: translation timed out after {:?}", limit);
                Err(PipelineError::Timeout(limit))
            }

            result = snapshot.registry.translate(text, AUTO_LANGUAGE, &snapshot.target_language) => {
                result.map_err(PipelineError::from)
            }
        }
    }
}
