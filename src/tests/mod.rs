//! Cross-module tests and the in-memory doubles they share.

mod engine_integration_tests;

use crate::clipboard::{ClipboardError, ClipboardService, KeyChord};
use crate::engine::{EngineError, EngineRegistry, TranslationEngine};
use crate::gesture::InputKey;
use crate::hook::{HookError, HookHandle, KeyCallback, KeyEventSource};
use crate::notify::Notifier;
use crate::pipeline::{PipelineConfig, PipelineSnapshot};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ============================================================================
// Clipboard
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardOp {
    Chord(KeyChord),
    Read,
    Write(String),
}

#[derive(Default)]
struct ClipboardInner {
    /// Text in the focused application's field
    field: String,
    clipboard: String,
    ops: Vec<ClipboardOp>,
    failing_reads: u32,
    failing_writes: u32,
    read_delay: Duration,
}

/// Clipboard plus a single focused text field.
///
/// Copy puts the whole field on the clipboard (select-all is assumed) and
/// paste replaces the whole field with the clipboard.
#[derive(Default)]
pub struct MockClipboard {
    inner: Mutex<ClipboardInner>,
}

impl MockClipboard {
    pub fn with_field(text: &str) -> Arc<Self> {
        let mock = Self::default();
        mock.inner.lock().unwrap().field = text.to_string();
        Arc::new(mock)
    }

    /// The next `n` reads fail
    pub fn fail_reads(&self, n: u32) {
        self.inner.lock().unwrap().failing_reads = n;
    }

    /// The next `n` writes fail
    pub fn fail_writes(&self, n: u32) {
        self.inner.lock().unwrap().failing_writes = n;
    }

    pub fn set_read_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().read_delay = delay;
    }

    pub fn field(&self) -> String {
        self.inner.lock().unwrap().field.clone()
    }

    pub fn clipboard(&self) -> String {
        self.inner.lock().unwrap().clipboard.clone()
    }

    pub fn ops(&self) -> Vec<ClipboardOp> {
        self.inner.lock().unwrap().ops.clone()
    }

    pub fn writes(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                ClipboardOp::Write(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &ClipboardOp) -> usize {
        self.ops().iter().filter(|op| *op == wanted).count()
    }
}

#[async_trait]
impl ClipboardService for MockClipboard {
    async fn read_text(&self) -> Result<String, ClipboardError> {
        let delay = self.inner.lock().unwrap().read_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(ClipboardOp::Read);
        if inner.failing_reads > 0 {
            inner.failing_reads -= 1;
            return Err(ClipboardError::Unavailable("locked by another process".to_string()));
        }
        Ok(inner.clipboard.clone())
    }

    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(ClipboardOp::Write(text.to_string()));
        if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            return Err(ClipboardError::Unavailable("locked by another process".to_string()));
        }
        inner.clipboard = text.to_string();
        Ok(())
    }

    async fn send_chord(&self, chord: KeyChord) -> Result<(), ClipboardError> {
        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(ClipboardOp::Chord(chord));
        match chord {
            KeyChord::SelectAll => {}
            KeyChord::Copy => inner.clipboard = inner.field.clone(),
            KeyChord::Paste => inner.field = inner.clipboard.clone(),
        }
        Ok(())
    }
}

// ============================================================================
// Engines
// ============================================================================

#[derive(Debug, Clone)]
pub enum Reply {
    /// Return the input unchanged
    Echo,
    /// Prefix the input
    Prefix(&'static str),
    /// Fail every request
    Fail,
}

pub struct MockEngine {
    name: &'static str,
    reply: Reply,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockEngine {
    pub fn new(name: &'static str, reply: Reply) -> Arc<Self> {
        Self::slow(name, reply, Duration::ZERO)
    }

    pub fn slow(name: &'static str, reply: Reply, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply,
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationEngine for MockEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        "in-memory engine"
    }

    async fn request_translation(&self, text: &str, _from: &str, _to: &str) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.reply {
            Reply::Echo => Ok(text.to_string()),
            Reply::Prefix(prefix) => Ok(format!("{}{}", prefix, text)),
            Reply::Fail => Err(EngineError::Api("HTTP 500".to_string())),
        }
    }
}

pub fn snapshot_with(engines: Vec<Arc<dyn TranslationEngine>>, config: PipelineConfig) -> Arc<PipelineSnapshot> {
    let mut registry = EngineRegistry::new();
    for engine in engines {
        registry.register(engine);
    }
    Arc::new(PipelineSnapshot {
        registry,
        config,
        target_language: "de".to_string(),
    })
}

// ============================================================================
// Notifier
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Warning,
    EngineError,
    HookError,
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeKind, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<(NoticeKind, String)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<NoticeKind> {
        self.notices().into_iter().map(|(kind, _)| kind).collect()
    }

    fn push(&self, kind: NoticeKind, message: &str) {
        self.notices.lock().unwrap().push((kind, message.to_string()));
    }
}

impl Notifier for RecordingNotifier {
    fn on_success(&self, message: &str) {
        self.push(NoticeKind::Success, message);
    }

    fn on_error(&self, message: &str) {
        self.push(NoticeKind::Error, message);
    }

    fn on_warning(&self, message: &str) {
        self.push(NoticeKind::Warning, message);
    }

    fn on_engine_error(&self, message: &str) {
        self.push(NoticeKind::EngineError, message);
    }

    fn on_hook_error(&self, message: &str) {
        self.push(NoticeKind::HookError, message);
    }
}

// ============================================================================
// Keyboard
// ============================================================================

/// Key source driven by the test
#[derive(Default)]
pub struct ManualKeySource {
    callback: Mutex<Option<KeyCallback>>,
    active: Mutex<Option<Arc<AtomicBool>>>,
}

impl ManualKeySource {
    pub fn press(&self, key: InputKey, at: Instant) {
        let active = self
            .active
            .lock()
            .unwrap()
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false);
        if !active {
            return;
        }
        if let Some(callback) = self.callback.lock().unwrap().as_mut() {
            callback(key, at);
        }
    }

    /// Press `key` at `base + offset` for each offset in milliseconds
    pub fn tap_at(&self, key: InputKey, base: Instant, offsets_ms: &[u64]) {
        for offset in offsets_ms {
            self.press(key, base + Duration::from_millis(*offset));
        }
    }
}

impl KeyEventSource for ManualKeySource {
    fn subscribe(&self, callback: KeyCallback) -> Result<HookHandle, HookError> {
        let flag = Arc::new(AtomicBool::new(true));
        *self.callback.lock().unwrap() = Some(callback);
        *self.active.lock().unwrap() = Some(flag.clone());
        Ok(HookHandle::new(flag))
    }
}

/// Key source whose hook can never be installed
pub struct FailingKeySource;

impl KeyEventSource for FailingKeySource {
    fn subscribe(&self, _callback: KeyCallback) -> Result<HookHandle, HookError> {
        Err(HookError::InstallFailed("accessibility permission denied".to_string()))
    }
}
