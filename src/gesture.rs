//! Activation gesture detection.
//!
//! The detector runs on the keyboard hook's delivery thread for every
//! key-down, so `on_key_event` never blocks, never performs I/O and does not
//! allocate once the tap history has reached its capacity. Anything slow is
//! done by the caller on another execution context after a
//! [`GestureDecision::Triggered`].

use crate::state::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// DEFAULT GESTURE CONSTANTS
// ============================================================================

/// Gaps at or below this are treated as key repeat
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 100;

/// Gaps at or above this are treated as an unrelated typing pause
pub const DEFAULT_MAX_INTERVAL_MS: u64 = 800;

/// Presses of the activation key that make up one gesture
pub const DEFAULT_REQUIRED_TAP_COUNT: u32 = 3;

/// Minimum time between two accepted triggers
pub const DEFAULT_COOLDOWN_MS: u64 = 2000;

// ============================================================================

/// Keys the detector can be configured to watch.
///
/// Everything else arrives as [`InputKey::Other`] and is passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputKey {
    #[default]
    Space,
    Tab,
    Enter,
    CapsLock,
    #[serde(other)]
    Other,
}

impl InputKey {
    /// Parse a key name such as "Space" or "capslock".
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "SPACE" => Some(Self::Space),
            "TAB" => Some(Self::Tab),
            "ENTER" | "RETURN" => Some(Self::Enter),
            "CAPSLOCK" => Some(Self::CapsLock),
            _ => None,
        }
    }
}

/// Timing window for the activation gesture.
///
/// Immutable while in use; reconfiguration replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
    pub required_tap_count: u32,
    pub cooldown_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: DEFAULT_MIN_INTERVAL_MS,
            max_interval_ms: DEFAULT_MAX_INTERVAL_MS,
            required_tap_count: DEFAULT_REQUIRED_TAP_COUNT,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
        }
    }
}

impl GestureConfig {
    /// Check `0 < min < max` and `required_tap_count >= 2`.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_interval_ms == 0 {
            return Err("min_interval_ms must be greater than 0".to_string());
        }
        if self.min_interval_ms >= self.max_interval_ms {
            return Err(format!(
                "min_interval_ms ({}) must be less than max_interval_ms ({})",
                self.min_interval_ms, self.max_interval_ms
            ));
        }
        if self.required_tap_count < 2 {
            return Err(format!(
                "required_tap_count must be at least 2 (got {})",
                self.required_tap_count
            ));
        }
        Ok(())
    }

    fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Number of earlier timestamps needed to evaluate a new tap
    fn history_len(&self) -> usize {
        self.required_tap_count.saturating_sub(1).max(1) as usize
    }

    fn gap_in_window(&self, gap: Duration) -> bool {
        gap > self.min_interval() && gap < self.max_interval()
    }
}

/// What a single key-down did to the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureDecision {
    /// Not the activation key, or the gesture is disabled
    Ignored,
    /// Activation key recorded, no gesture completed
    Recorded,
    /// Gesture completed and accepted; the caller should start a pipeline
    Triggered,
    /// Gesture completed inside the cooldown window
    Suppressed { remaining: Duration },
}

/// Single-writer gesture state machine.
///
/// Owns the tap history and the cooldown timestamp. `&mut self` on
/// [`GestureDetector::on_key_event`] makes the cooldown check-and-update one
/// step even if the hook delivers events re-entrantly through a wrapper.
pub struct GestureDetector {
    config: Snapshot<GestureConfig>,
    enabled: Arc<AtomicBool>,
    activation_key: InputKey,
    history: VecDeque<Instant>,
    last_trigger: Option<Instant>,
}

impl GestureDetector {
    pub fn new(
        config: Snapshot<GestureConfig>,
        enabled: Arc<AtomicBool>,
        activation_key: InputKey,
    ) -> Self {
        let capacity = config.load().history_len();
        Self {
            config,
            enabled,
            activation_key,
            history: VecDeque::with_capacity(capacity),
            last_trigger: None,
        }
    }

    /// Detector with its own config cell and an always-on flag
    pub fn with_config(config: GestureConfig) -> Self {
        Self::new(
            Snapshot::new(config),
            Arc::new(AtomicBool::new(true)),
            InputKey::Space,
        )
    }

    pub fn activation_key(&self) -> InputKey {
        self.activation_key
    }

    /// Feed one key-down event.
    pub fn on_key_event(&mut self, key: InputKey, at: Instant) -> GestureDecision {
        if key != self.activation_key {
            return GestureDecision::Ignored;
        }
        if !self.enabled.load(Ordering::Relaxed) {
            return GestureDecision::Ignored;
        }

        // One snapshot per evaluation; a concurrent swap applies to the next tap.
        let config = self.config.load();
        let window = config.history_len();

        let decision = if self.gesture_completed(&config, window, at) {
            match self.last_trigger {
                Some(last) if at.saturating_duration_since(last) < config.cooldown() => {
                    let remaining = config.cooldown() - at.saturating_duration_since(last);
                    log::debug!("Gesture: in cooldown, {:?} remaining", remaining);
                    GestureDecision::Suppressed { remaining }
                }
                _ => {
                    self.last_trigger = Some(at);
                    GestureDecision::Triggered
                }
            }
        } else {
            GestureDecision::Recorded
        };

        while self.history.len() >= window {
            self.history.pop_front();
        }
        self.history.push_back(at);

        decision
    }

    /// Forget recorded taps and the last trigger time
    pub fn reset(&mut self) {
        self.history.clear();
        self.last_trigger = None;
    }

    fn gesture_completed(&self, config: &GestureConfig, window: usize, at: Instant) -> bool {
        if self.history.len() < window {
            return false;
        }

        let skip = self.history.len() - window;
        let mut previous: Option<Instant> = None;
        for current in self.history.iter().skip(skip).copied().chain(std::iter::once(at)) {
            if let Some(prev) = previous {
                if !config.gap_in_window(current.saturating_duration_since(prev)) {
                    return false;
                }
            }
            previous = Some(current);
        }
        true
    }
}
