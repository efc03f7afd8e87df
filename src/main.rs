//! Entry point for the **brightd** daemon.
//!
//! Binds the command socket, starts the debounce loop on a background
//! thread and serves clients on the main thread until the process is killed.

use brightd::config::Config;
use brightd::ddcutil::display::DdcutilDisplay;
use brightd::engine::CoalescingEngine;
use brightd::ipc::dispatch::Dispatcher;
use brightd::ipc::listener::UnixSocketServer;
use brightd::waybar::SignalNotifier;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;

/// Resolve the config directory (`$XDG_CONFIG_HOME/brightd`).
fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    PathBuf::from(base).join("brightd")
}

/// `--config <path>` from the command line, if present.
fn config_arg() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

/// Load the config from `--config` or `$XDG_CONFIG_HOME/brightd/config.json`,
/// falling back to compiled-in defaults.
fn load_config() -> Config {
    let path = config_arg().unwrap_or_else(|| config_dir().join("config.json"));
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no usable config file ({}), using defaults", e);
            Config::default()
        }
    }
}

//  Main

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config();

    let display = Arc::new(DdcutilDisplay::new(config.display.clone()));
    let notifier = Arc::new(SignalNotifier::new(config.notifier.clone()));
    let engine = Arc::new(CoalescingEngine::new(
        display,
        notifier,
        config.engine_settings(),
    ));

    let server = match UnixSocketServer::bind(&config.socket_path) {
        Ok(s) => s,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    {
        let engine = Arc::clone(&engine);
        let spawned = std::thread::Builder::new()
            .name("brightd-debounce".into())
            .spawn(move || engine.run());
        if let Err(e) = spawned {
            error!("failed to start debounce loop: {}", e);
            std::process::exit(1);
        }
    }

    info!(
        "brightd running at {} (window {} ms, step {})",
        server.path().display(),
        config.debounce_ms,
        config.step
    );

    let dispatcher = Arc::new(Dispatcher::new(engine, config.default_max));
    server.serve(dispatcher);
}
