//! Service lifecycle: wires the keyboard hook, gesture detector, pipelines,
//! engine registry and notifier together.

use crate::clipboard::ClipboardService;
use crate::engine::{build_registry, EngineError, AUTO_LANGUAGE};
use crate::gesture::{GestureConfig, GestureDecision, GestureDetector, InputKey};
use crate::hook::{HookError, HookHandle, KeyCallback, KeyEventSource};
use crate::notify::Notifier;
use crate::pipeline::{PipelineResult, PipelineSnapshot, TranslationPipeline};
use crate::settings::AppSettings;
use crate::state::{AppState, Snapshot};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Build the engine snapshot for `settings`, reporting selection problems
fn build_snapshot(settings: &AppSettings, client: &reqwest::Client, notifier: &dyn Notifier) -> PipelineSnapshot {
    let mut registry = build_registry(&settings.engines, client, settings.pipeline.translate_timeout());

    if registry.is_empty() {
        notifier.on_engine_error("No translation engine configured; add credentials to the settings file");
    } else if let Err(e) = registry.set_current(&settings.current_engine) {
        notifier.on_engine_error(&format!(
            "{}; using {}",
            e,
            registry.current_name().unwrap_or("none")
        ));
    }

    PipelineSnapshot {
        registry,
        config: settings.pipeline.clone(),
        target_language: settings.target_language.clone(),
    }
}

/// Starts pipeline runs. Cheap to clone into the hook callback.
#[derive(Clone)]
struct PipelineSpawner {
    runtime: Snapshot<PipelineSnapshot>,
    clipboard: Arc<dyn ClipboardService>,
    notifier: Arc<dyn Notifier>,
    handle: Handle,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl PipelineSpawner {
    fn spawn(&self) -> JoinHandle<PipelineResult> {
        let run_id = uuid::Uuid::new_v4();
        let pipeline = TranslationPipeline::new(
            self.clipboard.clone(),
            self.notifier.clone(),
            self.runtime.load(),
        );
        let cancel = self.cancel.clone();

        log::info!("Pipeline[{}]: started", run_id);
        self.tracker.spawn_on(
            async move {
                let result = pipeline.run(&cancel).await;
                log::info!("Pipeline[{}]: {:?} ({})", run_id, result.status, result.detail);
                result
            },
            &self.handle,
        )
    }
}

pub struct SpaceTransService {
    state: AppState,
    gesture: Snapshot<GestureConfig>,
    activation_key: InputKey,
    spawner: PipelineSpawner,
    http: reqwest::Client,
    hook: Mutex<Option<HookHandle>>,
}

impl SpaceTransService {
    /// Create the service from loaded settings. Pipelines run on `handle`.
    pub fn new(
        settings: &AppSettings,
        clipboard: Arc<dyn ClipboardService>,
        notifier: Arc<dyn Notifier>,
        handle: Handle,
    ) -> Self {
        let http = reqwest::Client::new();
        let snapshot = build_snapshot(settings, &http, notifier.as_ref());

        Self {
            state: AppState::new(settings.hotkey_enabled),
            gesture: Snapshot::new(settings.gesture.clone()),
            activation_key: settings.activation_key,
            spawner: PipelineSpawner {
                runtime: Snapshot::new(snapshot),
                clipboard,
                notifier,
                handle,
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
            },
            http,
            hook: Mutex::new(None),
        }
    }

    /// Subscribe the gesture detector to `source`.
    ///
    /// On failure the gesture is disabled and the hook error is reported;
    /// everything else keeps working.
    pub fn start(&self, source: &dyn KeyEventSource) -> Result<(), HookError> {
        let mut detector = GestureDetector::new(
            self.gesture.clone(),
            self.state.hotkey_enabled.clone(),
            self.activation_key,
        );
        let spawner = self.spawner.clone();

        let callback: KeyCallback = Box::new(move |key, at| match detector.on_key_event(key, at) {
            GestureDecision::Triggered => {
                log::info!("Gesture: triggered");
                let _ = spawner.spawn();
            }
            GestureDecision::Suppressed { remaining } => {
                log::info!("Gesture: skipped, cooldown has {:?} left", remaining);
            }
            GestureDecision::Recorded | GestureDecision::Ignored => {}
        });

        match source.subscribe(callback) {
            Ok(handle) => {
                if let Ok(mut hook) = self.hook.lock() {
                    *hook = Some(handle);
                }
                log::info!("Hook: listening for {:?} taps", self.activation_key);
                Ok(())
            }
            Err(e) => {
                self.state.hotkey_enabled.store(false, Ordering::SeqCst);
                self.spawner.notifier.on_hook_error(&e.to_string());
                Err(e)
            }
        }
    }

    /// Run one pipeline now. `None` once shutdown has started.
    pub fn trigger(&self) -> Option<JoinHandle<PipelineResult>> {
        if self.state.shutting_down.load(Ordering::SeqCst) {
            log::warn!("Pipeline: shutting down, trigger ignored");
            return None;
        }
        Some(self.spawner.spawn())
    }

    pub fn hotkey_enabled(&self) -> bool {
        self.state.hotkey_enabled.load(Ordering::SeqCst)
    }

    pub fn set_hotkey_enabled(&self, enabled: bool) {
        self.state.hotkey_enabled.store(enabled, Ordering::SeqCst);
        log::info!("Gesture: {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Apply new settings. Running pipelines keep the snapshot they started with.
    ///
    /// Invalid values are replaced by defaults and reported as warnings.
    pub fn reload(&self, mut settings: AppSettings) {
        for problem in settings.sanitize() {
            log::warn!("Settings: {}", problem);
            self.spawner.notifier.on_warning(&problem.to_string());
        }

        let snapshot = build_snapshot(&settings, &self.http, self.spawner.notifier.as_ref());
        self.spawner.runtime.store(snapshot);
        self.gesture.store(settings.gesture.clone());
        self.set_hotkey_enabled(settings.hotkey_enabled);

        if settings.activation_key != self.activation_key {
            log::warn!(
                "Settings: activation key change to {:?} applies after restart",
                settings.activation_key
            );
        }
        log::info!("Settings: reloaded");
    }

    /// Engines, tunables and target language currently in effect
    pub fn snapshot(&self) -> Arc<PipelineSnapshot> {
        self.spawner.runtime.load()
    }

    /// Probe every registered engine
    pub async fn probe_engines(&self) -> Vec<(String, bool)> {
        let snapshot = self.snapshot();
        let mut results = Vec::new();
        for name in snapshot.registry.list_engines() {
            let available = match snapshot.registry.get(&name) {
                Some(engine) => engine.is_available().await,
                None => false,
            };
            results.push((name, available));
        }
        results
    }

    /// One-shot translation with the active engine, surfacing engine errors
    pub async fn translate_text(&self, text: &str) -> Result<String, EngineError> {
        let snapshot = self.snapshot();
        let engine = snapshot.registry.current().ok_or(EngineError::NoEngineAvailable)?;
        engine
            .request_translation(text, AUTO_LANGUAGE, &snapshot.target_language)
            .await
    }

    /// Stop accepting gestures and wait for in-flight pipelines.
    ///
    /// Pipelines still running after `grace` are cancelled. Returns `true`
    /// when everything finished on its own.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        log::info!("Service: shutting down");
        self.state.shutting_down.store(true, Ordering::SeqCst);
        self.state.hotkey_enabled.store(false, Ordering::SeqCst);

        if let Ok(mut hook) = self.hook.lock() {
            if let Some(handle) = hook.take() {
                handle.unsubscribe();
            }
        }

        let tracker = &self.spawner.tracker;
        tracker.close();

        let graceful = tokio::time::timeout(grace, tracker.wait()).await.is_ok();
        if !graceful {
            log::warn!(
                "Service: {} pipeline(s) still running after {:?}, cancelling",
                tracker.len(),
                grace
            );
            self.spawner.cancel.cancel();
            tracker.wait().await;
        }
        log::info!("Service: stopped");
        graceful
    }
}
