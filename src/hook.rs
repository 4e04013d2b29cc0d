//! Global keyboard hook.
//!
//! A [`KeyEventSource`] delivers key-down events from every application to a
//! callback on its own thread. The `desktop` feature provides
//! [`RdevKeyEventSource`].

use crate::gesture::InputKey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A held key with no press or repeat for this long counts as released.
/// Longer than the slowest OS auto-repeat delay.
pub const STALE_HOLD: Duration = Duration::from_millis(1100);

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Failed to install keyboard hook: {0}")]
    InstallFailed(String),

    #[error("Keyboard hook already installed")]
    AlreadyInstalled,
}

/// Receives one call per physical key-down, on the hook's delivery thread
pub type KeyCallback = Box<dyn FnMut(InputKey, Instant) + Send + 'static>;

/// Keeps a subscription alive; events stop once it is unsubscribed or dropped
pub struct HookHandle {
    active: Arc<AtomicBool>,
}

impl HookHandle {
    pub fn new(active: Arc<AtomicBool>) -> Self {
        Self { active }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop delivering events. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            log::info!("Hook: unsubscribed");
        }
    }
}

impl Drop for HookHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Drops OS auto-repeat key-downs for watched keys.
///
/// A press is delivered only when the key is not held. A hold is forgotten on
/// release, or once nothing has been seen from the key for [`STALE_HOLD`], so
/// a lost release cannot silence the key for good.
#[derive(Debug, Default)]
pub struct RepeatFilter {
    held: HashMap<InputKey, Instant>,
}

impl RepeatFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when this key-down should reach the callback
    pub fn on_press(&mut self, key: InputKey, at: Instant) -> bool {
        if key == InputKey::Other {
            return true;
        }
        let repeat = self
            .held
            .get(&key)
            .is_some_and(|last| at.saturating_duration_since(*last) < STALE_HOLD);
        self.held.insert(key, at);
        !repeat
    }

    pub fn on_release(&mut self, key: InputKey) {
        self.held.remove(&key);
    }
}

/// Source of global key-down events
pub trait KeyEventSource: Send + Sync {
    fn subscribe(&self, callback: KeyCallback) -> Result<HookHandle, HookError>;
}

#[cfg(feature = "desktop")]
pub use desktop::RdevKeyEventSource;

#[cfg(feature = "desktop")]
mod desktop {
    use super::{HookError, HookHandle, KeyCallback, KeyEventSource, RepeatFilter};
    use crate::gesture::InputKey;
    use rdev::{listen, Event, EventType, Key};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    /// How long to wait for `rdev::listen` to fail before assuming it is running
    const INSTALL_GRACE: Duration = Duration::from_millis(250);

    /// `rdev` listener on a dedicated thread.
    ///
    /// `rdev::listen` cannot be stopped once started, so the thread lives for
    /// the rest of the process and the handle's flag gates delivery. A second
    /// subscription is refused.
    #[derive(Default)]
    pub struct RdevKeyEventSource {
        installed: Mutex<bool>,
    }

    impl RdevKeyEventSource {
        pub fn new() -> Self {
            Self::default()
        }
    }

    pub(super) fn map_key(key: Key) -> InputKey {
        match key {
            Key::Space => InputKey::Space,
            Key::Tab => InputKey::Tab,
            Key::Return | Key::KpReturn => InputKey::Enter,
            Key::CapsLock => InputKey::CapsLock,
            _ => InputKey::Other,
        }
    }

    impl KeyEventSource for RdevKeyEventSource {
        fn subscribe(&self, mut callback: KeyCallback) -> Result<HookHandle, HookError> {
            let mut installed = self
                .installed
                .lock()
                .map_err(|_| HookError::InstallFailed("hook state poisoned".to_string()))?;
            if *installed {
                return Err(HookError::AlreadyInstalled);
            }

            let active = Arc::new(AtomicBool::new(true));
            let active_clone = Arc::clone(&active);
            let (err_tx, err_rx) = mpsc::channel::<String>();

            thread::Builder::new()
                .name("spacetrans-hook".to_string())
                .spawn(move || {
                    let mut repeats = RepeatFilter::new();

                    let result = listen(move |event: Event| {
                        if !active_clone.load(Ordering::SeqCst) {
                            return;
                        }
                        match event.event_type {
                            EventType::KeyPress(key) => {
                                let mapped = map_key(key);
                                let now = Instant::now();
                                if repeats.on_press(mapped, now) {
                                    callback(mapped, now);
                                }
                            }
                            EventType::KeyRelease(key) => {
                                repeats.on_release(map_key(key));
                            }
                            _ => {}
                        }
                    });

                    if let Err(e) = result {
                        let _ = err_tx.send(format!("{:?}", e));
                    }
                })
                .map_err(|e| HookError::InstallFailed(format!("Failed to spawn hook thread: {}", e)))?;

            match err_rx.recv_timeout(INSTALL_GRACE) {
                Ok(message) => {
                    active.store(false, Ordering::SeqCst);
                    Err(HookError::InstallFailed(message))
                }
                // Still listening after the grace period, or exited without an error
                Err(_) => {
                    *installed = true;
                    log::info!("Hook: keyboard listener installed");
                    Ok(HookHandle::new(active))
                }
            }
        }
    }
}
