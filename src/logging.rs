//! Logging utilities for error tracking and debugging

use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;

use crate::db::get_app_data_dir;

static LOG_INITIALIZED: std::sync::Once = std::sync::Once::new();

/// Initialize logging to file and terminal
pub fn init_logging(level: LevelFilter) {
    LOG_INITIALIZED.call_once(|| {
        let log_path = get_app_data_dir().join("jobradar.log");

        match File::options().create(true).append(true).open(&log_path) {
            Ok(log_file) => {
                let config = Config::default();

                if let Err(e) = CombinedLogger::init(vec![
                    TermLogger::new(
                        level,
                        config.clone(),
                        TerminalMode::Mixed,
                        ColorChoice::Auto,
                    ),
                    WriteLogger::new(LevelFilter::Debug, config, log_file),
                ]) {
                    eprintln!("Failed to initialize logger: {}", e);
                } else {
                    log::info!("=== JobRadar Logging Initialized ===");
                    log::info!("Log file: {}", log_path.display());
                }
            }
            Err(e) => {
                eprintln!("Failed to open log file at {}: {}", log_path.display(), e);
            }
        }
    });
}

/// Log a panic with its location before the process dies
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let panic_message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "Unknown panic".to_string());

        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        log::error!(
            "PANIC: {} at {} ({})",
            panic_message,
            location,
            chrono::Utc::now().to_rfc3339()
        );
    }));
}
