//! `sentineld`: headless daemon entry point. Loads configuration, brings
//! the engine up, and blocks until a shutdown signal arrives — the
//! out-of-process analog of a desktop app's `run()` minus the window
//! shell and tray icon.

use std::path::PathBuf;
use std::sync::Arc;

use sentinel_dlp::config::Config;
use sentinel_dlp::DlpEngine;

fn main() {
    sentinel_dlp::init_logging();

    let config_path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("sentinel.toml"));
    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    let engine = match DlpEngine::init(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("engine failed to initialize: {e}");
            std::process::exit(1);
        }
    };

    engine.start();
    wait_for_shutdown_signal(&engine);
    engine.stop();
}

/// Blocks until stdin closes, then returns so `main` can run an orderly
/// `stop()`. No `ctrlc` crate in the dependency set; a supervised daemon's
/// controlling process closing its end of stdin is the signal we wait on.
fn wait_for_shutdown_signal(_engine: &Arc<DlpEngine>) {
    let mut buf = String::new();
    let _ = std::io::stdin().read_line(&mut buf);
}
