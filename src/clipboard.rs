//! Clipboard access and synthetic key chords.
//!
//! The pipeline only talks to [`ClipboardService`]. The `desktop` feature
//! provides [`SystemClipboard`], built on `arboard` for clipboard text and
//! `enigo` for key injection.

use async_trait::async_trait;

/// Errors from the clipboard / input-injection boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("Key injection failed: {0}")]
    Injection(String),
}

/// Key chords the pipeline sends to the focused application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyChord {
    SelectAll,
    Copy,
    Paste,
}

impl KeyChord {
    /// Letter pressed together with the platform modifier
    pub fn letter(self) -> char {
        match self {
            KeyChord::SelectAll => 'a',
            KeyChord::Copy => 'c',
            KeyChord::Paste => 'v',
        }
    }
}

impl std::fmt::Display for KeyChord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyChord::SelectAll => write!(f, "select-all"),
            KeyChord::Copy => write!(f, "copy"),
            KeyChord::Paste => write!(f, "paste"),
        }
    }
}

/// Platform clipboard plus key injection into the focused application.
///
/// Each call is a single attempt; retries belong to the caller.
#[async_trait]
pub trait ClipboardService: Send + Sync {
    /// Current clipboard text. A clipboard without text reads as `""`.
    async fn read_text(&self) -> Result<String, ClipboardError>;

    /// Replace the clipboard contents with `text`
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;

    /// Synthesize `chord` to whatever application has focus
    async fn send_chord(&self, chord: KeyChord) -> Result<(), ClipboardError>;
}

#[cfg(feature = "desktop")]
pub use system::{InputWorker, StopWorker, SystemClipboard};

#[cfg(feature = "desktop")]
mod system {
    use super::{ClipboardError, ClipboardService, KeyChord};
    use arboard::Clipboard;
    use async_trait::async_trait;
    use enigo::{Direction, Enigo, Key, Keyboard, Settings};
    use std::thread;
    use std::time::Duration;
    use tokio::sync::{mpsc, oneshot};

    /// Delay between pressing the modifier and clicking the letter
    const MODIFIER_SETTLE: Duration = Duration::from_millis(10);

    enum Request {
        Read(oneshot::Sender<Result<String, ClipboardError>>),
        Write(String, oneshot::Sender<Result<(), ClipboardError>>),
        Chord(KeyChord, oneshot::Sender<Result<(), ClipboardError>>),
        Stop,
    }

    /// `arboard` + `enigo` implementation.
    ///
    /// Requests are forwarded to an [`InputWorker`] that owns the platform
    /// handles. The clipboard handle lives as long as the worker: on X11 and
    /// Wayland the written text disappears with the last handle.
    #[derive(Debug, Clone)]
    pub struct SystemClipboard {
        requests: mpsc::UnboundedSender<Request>,
    }

    impl SystemClipboard {
        /// Create the service and the worker that must run its requests.
        ///
        /// On macOS `enigo` only works from the main thread, so
        /// [`InputWorker::run`] belongs there.
        pub fn with_worker() -> (Self, InputWorker) {
            let (requests, inbox) = mpsc::unbounded_channel();
            (Self { requests }, InputWorker { inbox })
        }

        /// Guard that ends [`InputWorker::run`] when dropped
        pub fn stop_on_drop(&self) -> StopWorker {
            StopWorker(self.requests.clone())
        }

        async fn call<T>(
            &self,
            request: impl FnOnce(oneshot::Sender<Result<T, ClipboardError>>) -> Request,
        ) -> Result<T, ClipboardError> {
            let (reply, response) = oneshot::channel();
            self.requests
                .send(request(reply))
                .map_err(|_| ClipboardError::Unavailable("input worker stopped".to_string()))?;
            response
                .await
                .map_err(|_| ClipboardError::Unavailable("input worker stopped".to_string()))?
        }
    }

    /// Stops the worker once the async side is done, even on panic
    pub struct StopWorker(mpsc::UnboundedSender<Request>);

    impl Drop for StopWorker {
        fn drop(&mut self) {
            let _ = self.0.send(Request::Stop);
        }
    }

    /// Owns the clipboard and the key injector, created on first use
    pub struct InputWorker {
        inbox: mpsc::UnboundedReceiver<Request>,
    }

    #[derive(Default)]
    struct Devices {
        clipboard: Option<Clipboard>,
        enigo: Option<Enigo>,
    }

    impl InputWorker {
        /// Serve requests on the calling thread until stopped or every
        /// [`SystemClipboard`] is gone. Must not be called from async code.
        pub fn run(mut self) {
            let mut devices = Devices::default();
            log::debug!("Input: worker running on {:?}", thread::current().name());

            while let Some(request) = self.inbox.blocking_recv() {
                match request {
                    Request::Read(reply) => {
                        let _ = reply.send(devices.read_text());
                    }
                    Request::Write(text, reply) => {
                        let _ = reply.send(devices.write_text(text));
                    }
                    Request::Chord(chord, reply) => {
                        let _ = reply.send(devices.send_chord(chord));
                    }
                    Request::Stop => break,
                }
            }
            log::debug!("Input: worker stopped");
        }
    }

    impl Devices {
        fn clipboard(&mut self) -> Result<&mut Clipboard, ClipboardError> {
            if self.clipboard.is_none() {
                let clipboard = Clipboard::new()
                    .map_err(|e| ClipboardError::Unavailable(format!("Failed to open clipboard: {}", e)))?;
                self.clipboard = Some(clipboard);
            }
            self.clipboard
                .as_mut()
                .ok_or_else(|| ClipboardError::Unavailable("clipboard not initialized".to_string()))
        }

        fn enigo(&mut self) -> Result<&mut Enigo, ClipboardError> {
            if self.enigo.is_none() {
                let enigo = Enigo::new(&Settings::default())
                    .map_err(|e| ClipboardError::Injection(format!("Failed to initialize Enigo: {}", e)))?;
                self.enigo = Some(enigo);
            }
            self.enigo
                .as_mut()
                .ok_or_else(|| ClipboardError::Injection("Enigo not initialized".to_string()))
        }

        fn read_text(&mut self) -> Result<String, ClipboardError> {
            match self.clipboard()?.get_text() {
                Ok(text) => Ok(text),
                Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
                Err(e) => Err(ClipboardError::Unavailable(format!("Failed to read clipboard: {}", e))),
            }
        }

        fn write_text(&mut self, text: String) -> Result<(), ClipboardError> {
            self.clipboard()?
                .set_text(text)
                .map_err(|e| ClipboardError::Unavailable(format!("Failed to set clipboard: {}", e)))
        }

        fn send_chord(&mut self, chord: KeyChord) -> Result<(), ClipboardError> {
            let enigo = self.enigo()?;
            let modifier = modifier_key();

            enigo
                .key(modifier, Direction::Press)
                .map_err(|e| ClipboardError::Injection(format!("Failed to press modifier: {}", e)))?;
            thread::sleep(MODIFIER_SETTLE);

            let click = enigo
                .key(Key::Unicode(chord.letter()), Direction::Click)
                .map_err(|e| ClipboardError::Injection(format!("Failed to send {}: {}", chord, e)));

            // Always release the modifier, even if the click failed.
            let release = enigo
                .key(modifier, Direction::Release)
                .map_err(|e| ClipboardError::Injection(format!("Failed to release modifier: {}", e)));

            click.and(release)
        }
    }

    /// Cmd on macOS, Ctrl elsewhere
    fn modifier_key() -> Key {
        #[cfg(target_os = "macos")]
        {
            Key::Meta
        }
        #[cfg(not(target_os = "macos"))]
        {
            Key::Control
        }
    }

    #[async_trait]
    impl ClipboardService for SystemClipboard {
        async fn read_text(&self) -> Result<String, ClipboardError> {
            self.call(Request::Read).await
        }

        async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
            let text = text.to_string();
            self.call(move |reply| Request::Write(text, reply)).await
        }

        async fn send_chord(&self, chord: KeyChord) -> Result<(), ClipboardError> {
            self.call(move |reply| Request::Chord(chord, reply)).await
        }
    }

}
