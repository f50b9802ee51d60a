//! Containerizer - Entry Point
//!
//! Installs a git-hosted Node application, keeps it up to date and runs it
//! as a supervised child process.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::sync::Arc;

use containerizer::app::options::AppOptions;
use containerizer::app::run::{init_supervisor, run};
use containerizer::deploy::command::SystemCommandRunner;
use containerizer::filesys::file::File;
use containerizer::logs::{init_logging, LogLevel, LogOptions};
use containerizer::storage::config::Configuration;
use containerizer::storage::layout::StorageLayout;
use containerizer::storage::settings::Settings;
use containerizer::utils::version_info;

use tracing::{error, info};

const USAGE: &str = "\
Usage: containerizer [OPTIONS]

Options:
  --base-dir=<DIR>      Directory holding the configuration and state files (default: .)
  --config=<FILE>       Configuration file (default: <base-dir>/containerizer.json)
  --log-level=<LEVEL>   trace, debug, info, warn or error
  --state               Print the install state and exit
  --version             Print version information and exit
  --help                Print this help and exit";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    if cli_args.contains_key("help") {
        println!("{}", USAGE);
        return;
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return;
    }

    let layout = match cli_args.get("base-dir") {
        Some(dir) => StorageLayout::new(dir),
        None => StorageLayout::default(),
    };

    // Retrieve the settings file
    let settings = match Settings::load_or_default(&layout.settings_file()).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let mut log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: settings.log_dir.clone(),
        json_format: settings.json_logs,
        ..Default::default()
    };
    if let Some(level) = cli_args.get("log-level") {
        match LogLevel::from_str(level) {
            Ok(level) => log_options.log_level = level,
            Err(e) => eprintln!("Ignoring --log-level: {}", e),
        }
    }
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    // Load the configuration once for the whole run
    let config_file = match cli_args.get("config") {
        Some(path) => File::new(path),
        None => layout.config_file(),
    };
    let config = match Configuration::load(&config_file).await {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let options = AppOptions::from_settings(&settings, layout);

    // Print the install state and exit
    if cli_args.contains_key("state") {
        let supervisor = match init_supervisor(config, &options, Arc::new(SystemCommandRunner)) {
            Ok(supervisor) => supervisor,
            Err(e) => {
                error!("Failed to initialize: {}", e);
                std::process::exit(1);
            }
        };
        let state = supervisor.install_state(&supervisor.current_env()).await;
        match serde_json::to_string(&state) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize state: {}", e),
        }
        return;
    }

    info!(
        "Running containerizer {} ({}) with options: {:?}",
        version.version, version.git_hash, options
    );
    let result = run(config, options, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run containerizer: {e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                error!("Failed to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
