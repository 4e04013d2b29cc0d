use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};

/// Runtime flags shared between the hook thread and the control surface
#[derive(Default)]
pub struct AppState {
    /// Whether the activation gesture is currently honored; shared with the detector
    pub hotkey_enabled: Arc<AtomicBool>,
    /// Set once shutdown has started; new triggers are refused afterwards
    pub shutting_down: AtomicBool,
}

impl AppState {
    pub fn new(hotkey_enabled: bool) -> Self {
        Self {
            hotkey_enabled: Arc::new(AtomicBool::new(hotkey_enabled)),
            shutting_down: AtomicBool::new(false),
        }
    }
}

/// An immutable value that can be replaced wholesale.
///
/// Readers take an `Arc` to the current value and keep using it even if a
/// writer swaps in a new one meanwhile; nobody ever observes a half-updated
/// value. The write lock is held only for the pointer assignment.
pub struct Snapshot<T> {
    inner: Arc<RwLock<Arc<T>>>,
}

impl<T> Snapshot<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(value))),
        }
    }

    /// Current value
    pub fn load(&self) -> Arc<T> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the current value
    pub fn store(&self, value: T) {
        let next = Arc::new(value);
        match self.inner.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_readers_keep_their_snapshot_across_store() {
        let cell = Snapshot::new(String::from("first"));
        let held = cell.load();

        cell.store(String::from("second"));

        assert_eq!(held.as_str(), "first");
        assert_eq!(cell.load().as_str(), "second");
    }

    #[test]
    fn test_clones_share_the_same_cell() {
        let cell = Snapshot::new(1u32);
        let other = cell.clone();
        other.store(2);
        assert_eq!(*cell.load(), 2);
    }

    #[test]
    fn test_app_state_flags() {
        let state = AppState::new(true);
        assert!(state.hotkey_enabled.load(Ordering::SeqCst));
        assert!(!state.shutting_down.load(Ordering::SeqCst));
        assert!(!AppState::default().hotkey_enabled.load(Ordering::SeqCst));
    }
}
