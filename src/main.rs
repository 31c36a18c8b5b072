//! Juice agent entry point: CLI dispatch, signal handlers, async runtime.

mod app;
mod config;
mod daemon;
mod host;
mod packet;
mod ups;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use app::cli::{Args, HELP_TEXT};
use app::logging::{filter_for_level, init_tracing, RELOAD_HANDLE};
use config::persistence::{default_config_path, load_config};
use config::setup::run_setup_wizard;
use daemon::control::{
    restart_daemon_with_log_level, set_log_level_runtime, start_daemon_with_log_level, stop_daemon,
};
use daemon::pid::{ensure_directories, get_pid, remove_pid_file, save_pid};
use daemon::status::{run_health_check, show_status};
use daemon::LOG_DIR;
use host::client::HostClient;
use ups::monitor::UpsMonitor;

#[cfg(target_os = "linux")]
use daemon::systemd::{install_systemd_service, uninstall_systemd_service};
#[cfg(target_os = "linux")]
use ups::monitor::PiJuiceMonitor;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse arguments with custom error handling
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            if err.kind() == clap::error::ErrorKind::DisplayHelp {
                print!("{}", HELP_TEXT);
                std::process::exit(0);
            }
            if err.kind() == clap::error::ErrorKind::DisplayVersion {
                println!("\x1b[32mjuice-agent {} ({})\x1b[0m", env!("CARGO_PKG_VERSION"), std::env::consts::ARCH);
                std::process::exit(0);
            }

            eprintln!("{}", err);
            eprintln!();
            print!("{}", HELP_TEXT);
            eprintln!();
            eprintln!("\nFor more information, try '--help'.");

            std::process::exit(1);
        }
    };

    // Handle management commands first (before async setup)
    if args.start {
        return start_daemon_with_log_level(args.log_level); // Spawns new process and exits
    }

    if args.stop {
        return stop_daemon();
    }

    if args.restart {
        return restart_daemon_with_log_level(args.log_level);
    }

    if args.status {
        return show_status().await;
    }

    if args.check {
        return run_health_check();
    }

    #[cfg(target_os = "linux")]
    if args.install_service {
        return install_systemd_service();
    }

    #[cfg(target_os = "linux")]
    if args.uninstall_service {
        return uninstall_systemd_service();
    }

    if let Some(lines) = args.log_show {
        let log_path = format!("{}/agent.log", LOG_DIR);

        let mut cmd = std::process::Command::new("tail");

        match lines {
            Some(n) => {
                println!("Showing last {} log entries...", n);
                println!("\x1b[32mjuice-agent v{} ({})\x1b[0m\n", env!("CARGO_PKG_VERSION"), std::env::consts::ARCH);
                cmd.arg("-n").arg(n.to_string());
            }
            None => {
                println!("Showing live agent logs (Ctrl+C to exit)...");
                println!("\x1b[32mjuice-agent v{} ({})\x1b[0m\n", env!("CARGO_PKG_VERSION"), std::env::consts::ARCH);
                cmd.arg("-f");
            }
        }

        cmd.arg(&log_path);
        let status = cmd.status()?;
        std::process::exit(status.code().unwrap_or(1));
    }

    let is_run_mode = args.daemon_child || args.test || args.probe || args.config || args.setup;

    // If user provided --log-level without other commands, set it for running agent
    if let Some(level) = args.log_level.as_ref() {
        if !is_run_mode {
            return set_log_level_runtime(level);
        }
    }

    // If no command was provided at all, show help
    if !is_run_mode {
        eprintln!("ERROR: No command specified. You must specify a command.");
        eprintln!();
        Args::command().print_help().unwrap();
        eprintln!();
        eprintln!("Common commands:");
        eprintln!("  ./juice-agent --start       Start the agent");
        eprintln!("  ./juice-agent --stop        Stop the agent");
        eprintln!("  ./juice-agent -i            Show status");
        eprintln!("  ./juice-agent -l            View logs");
        std::process::exit(1);
    }

    // Log level priority: --log-level flag, LOG_LEVEL env, config file, default
    let log_level = if let Some(level) = args.log_level.as_ref() {
        level.to_lowercase()
    } else if let Ok(env_level) = std::env::var("LOG_LEVEL") {
        env_level.to_lowercase()
    } else {
        "info".to_string()
    };

    init_tracing(filter_for_level(&log_level));

    if args.daemon_child {
        ensure_directories()?;
        save_pid(std::process::id())?;
    }

    if args.config {
        let config = load_config(None).await?;
        println!("\n{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if args.setup {
        run_setup_wizard(None).await?;
        return Ok(());
    }

    info!("Juice Agent v{} starting ({})", env!("CARGO_PKG_VERSION"), std::env::consts::OS);

    // Load configuration (falls back to defaults when no file exists, which
    // is fine for --probe/--test)
    let loaded_config = load_config(None).await?;

    #[cfg(target_os = "linux")]
    let monitor: Arc<dyn UpsMonitor> = Arc::new(PiJuiceMonitor::new(
        loaded_config.ups.i2c_bus,
        loaded_config.ups.i2c_address,
    ));

    if args.probe {
        let snapshot = monitor.read_snapshot().await?;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    if args.test {
        info!("Running in test mode");
        match monitor.read_snapshot().await {
            Ok(snap) => {
                info!(
                    "PiJuice OK: {}% charge ({}), {:.3} V battery, input power {}",
                    snap.charge_percent,
                    if snap.battery.is_charging() { "charging" } else { "not charging" },
                    snap.battery_voltage,
                    if snap.power_present() { "present" } else { "absent" }
                );
                if snap.faults.any() {
                    info!("PiJuice reports latched faults: {:?}", snap.faults);
                }
            }
            Err(e) => {
                error!("PiJuice test failed: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Normal operation requires a real config file
    let config_file_path = default_config_path()?;
    if !config_file_path.exists() {
        eprintln!("ERROR: Configuration file not found: {:?}", config_file_path);
        eprintln!("\nPlease run the setup wizard first:");
        eprintln!("  ./juice-agent --setup");
        std::process::exit(1);
    }

    let client = Arc::new(HostClient::new(loaded_config, monitor));

    // SIGHUP reloads the log level from the config file
    #[cfg(target_os = "linux")]
    if args.daemon_child {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sighup = signal(SignalKind::hangup()).expect("Failed to setup SIGHUP handler");

        tokio::spawn(async move {
            loop {
                sighup.recv().await;
                info!("SIGHUP received, reloading log level configuration");

                match load_config(None).await {
                    Ok(new_config) => {
                        let new_level = new_config.agent.log_level;
                        if let Some(handle) = RELOAD_HANDLE.get() {
                            match handle.reload(EnvFilter::new(filter_for_level(&new_level))) {
                                Ok(_) => info!("Log level reloaded: {}", new_level.to_uppercase()),
                                Err(e) => error!("Failed to reload log level: {}", e),
                            }
                        }
                    }
                    Err(e) => error!("Failed to reload config: {}", e),
                }
            }
        });
    }

    // Setup signal handler with proper cancellation. systemd and --stop
    // deliver SIGTERM; both take the same graceful path as Ctrl+C.
    let client_clone = Arc::clone(&client);
    let shutdown_signal = tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received (Ctrl+C)"),
                        _ = sigterm.recv() => info!("Shutdown signal received (SIGTERM)"),
                    }
                }
                Err(e) => {
                    error!("Failed to setup SIGTERM handler: {}", e);
                    tokio::signal::ctrl_c().await.ok();
                    info!("Shutdown signal received (Ctrl+C)");
                }
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received (Ctrl+C)");
        }
        client_clone.stop().await;
    });

    tokio::select! {
        result = client.run() => {
            if let Err(e) = result {
                error!("Host link error: {}", e);
            }
        }
        _ = shutdown_signal => {
            info!("Shutdown signal handled");
        }
    }

    // Clean up PID file after shutdown
    if let Ok(Some(pid)) = get_pid() {
        if pid == std::process::id() {
            let _ = remove_pid_file();
            info!("PID file cleaned up");
        }
    }

    info!("Agent shutdown complete");
    Ok(())
}
