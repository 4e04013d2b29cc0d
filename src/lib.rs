use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod clipboard;
pub mod engine;
pub mod gesture;
pub mod hook;
pub mod notify;
pub mod pipeline;
pub mod retry;
pub mod service;
pub mod settings;
pub mod state;

#[cfg(test)]
mod tests;

/// How long in-flight pipelines get to finish on Ctrl+C
pub const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

/// Translate the focused text field in place by tapping space three times
#[derive(Debug, Parser)]
#[command(name = "spacetrans", version, about)]
pub struct Cli {
    /// Settings file (default: search for config.json)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Listen for the gesture until Ctrl+C (default)
    Run,
    /// Probe every configured engine
    Check,
    /// Translate TEXT with the active engine and print the result
    Translate {
        text: String,
    },
}

#[cfg(feature = "desktop")]
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .try_init();
}

#[cfg(feature = "desktop")]
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Parse the command line and run it.
///
/// The async work runs on a separate thread; the calling (main) thread serves
/// clipboard and key-injection requests, since macOS only allows `enigo` there.
#[cfg(feature = "desktop")]
pub fn run() -> Result<(), BoxError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let loaded = settings::load_settings(cli.config.as_deref())?;
    log::info!("Settings: using {}", loaded.path.display());

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let (clipboard, worker) = clipboard::SystemClipboard::with_worker();
    let command = cli.command.unwrap_or(Command::Run);

    let app = std::thread::Builder::new()
        .name("spacetrans-runtime".to_string())
        .spawn(move || {
            let _stop = clipboard.stop_on_drop();
            runtime.block_on(run_command(command, loaded.settings, clipboard))
        })?;

    worker.run();
    app.join().map_err(|_| "runtime thread panicked")?
}

#[cfg(feature = "desktop")]
async fn run_command(
    command: Command,
    settings: settings::AppSettings,
    clipboard: clipboard::SystemClipboard,
) -> Result<(), BoxError> {
    use notify::Notifier;
    use std::sync::Arc;

    let notifier = Arc::new(notify::ConsoleNotifier::new());
    let service = service::SpaceTransService::new(
        &settings,
        Arc::new(clipboard),
        notifier.clone(),
        tokio::runtime::Handle::current(),
    );

    match command {
        Command::Run => {
            let source = hook::RdevKeyEventSource::new();
            if service.start(&source).is_ok() {
                notifier.on_success(&format!(
                    "Started. Tap {:?} {} times to translate the focused field to '{}'. Ctrl+C to exit.",
                    settings.activation_key, settings.gesture.required_tap_count, settings.target_language
                ));
            }

            tokio::signal::ctrl_c().await?;
            println!();
            log::info!("Service: Ctrl+C received");
            service.shutdown(SHUTDOWN_GRACE).await;
        }
        Command::Check => {
            let results = service.probe_engines().await;
            if results.is_empty() {
                notifier.on_engine_error("No translation engine configured");
            }
            for (name, available) in results {
                if available {
                    notifier.on_success(&format!("{} is available", name));
                } else {
                    notifier.on_error(&format!("{} is not available", name));
                }
            }
        }
        Command::Translate { text } => match service.translate_text(&text).await {
            Ok(translated) => println!("{}", translated),
            Err(e) => notifier.on_engine_error(&e.to_string()),
        },
    }

    Ok(())
}
