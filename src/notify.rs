//! Outcome notifications for the presentation layer.

/// Observer for pipeline and hook outcomes.
///
/// Implementations are called from async tasks and the hook thread, so they
/// must return quickly and never block on user interaction.
pub trait Notifier: Send + Sync {
    fn on_success(&self, message: &str);
    fn on_error(&self, message: &str);
    fn on_warning(&self, message: &str);
    fn on_engine_error(&self, message: &str);
    fn on_hook_error(&self, message: &str);
}

/// Timestamped status lines on stdout, mirrored into the log
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }

    fn format_line(marker: &str, message: &str) -> String {
        format!("[{}] {} {}", chrono::Local::now().format("%H:%M:%S"), marker, message)
    }
}

impl Notifier for ConsoleNotifier {
    fn on_success(&self, message: &str) {
        log::info!("{}", message);
        println!("{}", Self::format_line("✅", message));
    }

    fn on_error(&self, message: &str) {
        log::error!("{}", message);
        println!("{}", Self::format_line("❌", message));
    }

    fn on_warning(&self, message: &str) {
        log::warn!("{}", message);
        println!("{}", Self::format_line("⚠️", message));
    }

    fn on_engine_error(&self, message: &str) {
        log::error!("Engine: {}", message);
        println!("{}", Self::format_line("🔧", message));
    }

    fn on_hook_error(&self, message: &str) {
        log::error!("Hook: {}", message);
        println!("{}", Self::format_line("⌨️", message));
    }
}

/// Log-only notifier for headless use
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn on_success(&self, message: &str) {
        log::info!("{}", message);
    }

    fn on_error(&self, message: &str) {
        log::error!("{}", message);
    }

    fn on_warning(&self, message: &str) {
        log::warn!("{}", message);
    }

    fn on_engine_error(&self, message: &str) {
        log::error!("Engine: {}", message);
    }

    fn on_hook_error(&self, message: &str) {
        log::error!("Hook: {}", message);
    }
}
