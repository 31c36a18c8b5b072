use std::fs;
use std::process;

use anyhow::Result;

use crate::config::types::AgentConfig;
use crate::daemon::pid::*;
use crate::daemon::systemd::is_systemd_service_active;
use crate::daemon::LOG_DIR;

pub fn start_daemon_with_log_level(log_level: Option<String>) -> Result<()> {
    if is_running() {
        eprintln!("ERROR: Agent is already running (PID: {:?})", get_pid()?);
        process::exit(1);
    }

    let exe_path = std::env::current_exe()?;
    let config_path = exe_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine executable directory"))?
        .join("config.json");

    if !config_path.exists() {
        eprintln!("ERROR: Configuration file not found: {:?}", config_path);
        eprintln!("\nPlease run the setup wizard first:");
        eprintln!("  ./juice-agent --setup");
        process::exit(1);
    }

    println!("\x1b[32mStarting juice-agent v{} ({})\x1b[0m", env!("CARGO_PKG_VERSION"), std::env::consts::ARCH);

    // Daemon child inherits the log file as stdout/stderr
    ensure_directories()?;
    let log_path = format!("{}/agent.log", LOG_DIR);
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let mut cmd = process::Command::new(&exe_path);
    cmd.arg("--daemon-child");

    if let Some(level) = log_level {
        cmd.arg("--log-level").arg(level);
    }

    let child = cmd
        .current_dir(std::env::current_dir()?)
        .stdin(process::Stdio::null())
        .stdout(log_file.try_clone()?)
        .stderr(log_file)
        .spawn()?;

    let pid = child.id();
    save_pid(pid)?;

    println!("Agent started successfully (PID: {})", pid);
    println!("Logs: tail -f {}/agent.log", LOG_DIR);

    Ok(())
}

/// Stop a running daemon: SIGTERM, grace period, then SIGKILL.
fn terminate_running_agent() -> Result<()> {
    if let Some(pid) = get_pid()? {
        println!("Stopping juice-agent (PID: {})...", pid);

        unsafe { libc::kill(pid as i32, libc::SIGTERM) };

        for _ in 0..10 {
            if !is_running() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_secs(1));
        }

        if is_running() {
            println!("WARNING: Force killing agent...");
            unsafe { libc::kill(pid as i32, libc::SIGKILL) };
        }

        remove_pid_file()?;
        println!("Agent stopped");
    }
    Ok(())
}

/// Try to delegate an operation to systemctl when systemd owns the process.
/// Returns true when systemctl handled it.
fn delegate_to_systemctl(verb: &str) -> bool {
    if !is_systemd_service_active() {
        return false;
    }

    println!("Agent is managed by systemd. Using systemctl {}...", verb);
    match process::Command::new("systemctl").args([verb, "juice-agent"]).status() {
        Ok(s) if s.success() => {
            println!("systemctl {} completed", verb);
            true
        }
        Ok(_) => {
            eprintln!("WARNING: systemctl {} failed, falling back to manual {}", verb, verb);
            false
        }
        Err(e) => {
            eprintln!("WARNING: Could not run systemctl: {}, falling back to manual {}", e, verb);
            false
        }
    }
}

pub fn stop_daemon() -> Result<()> {
    // Delegate to systemctl to prevent auto-restart from Restart=on-failure
    if delegate_to_systemctl("stop") {
        return Ok(());
    }

    if !is_running() {
        eprintln!("WARNING: Agent is not running");
        process::exit(1);
    }

    terminate_running_agent()
}

pub fn restart_daemon_with_log_level(log_level: Option<String>) -> Result<()> {
    println!("\x1b[32mRestarting juice-agent v{} ({})\x1b[0m", env!("CARGO_PKG_VERSION"), std::env::consts::ARCH);

    if delegate_to_systemctl("restart") {
        return Ok(());
    }

    if is_running() {
        terminate_running_agent()?;
        std::thread::sleep(std::time::Duration::from_secs(1));
    } else {
        println!("Agent not running, starting it...");
    }

    start_daemon_with_log_level(log_level)
}

pub fn set_log_level_runtime(level: &str) -> Result<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    let level_lower = level.to_lowercase();
    if !valid_levels.contains(&level_lower.as_str()) {
        return Err(anyhow::anyhow!(
            "Invalid log level '{}'. Valid levels: TRACE, DEBUG, INFO, WARN, ERROR",
            level
        ));
    }

    if !is_running() {
        return Err(anyhow::anyhow!(
            "Agent is not running. Start the agent first with: --start"
        ));
    }

    let config_path = std::env::current_exe()?
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine executable directory"))?
        .join("config.json");

    let content = std::fs::read_to_string(&config_path)?;
    let mut config: AgentConfig = serde_json::from_str(&content)?;

    let old_level = config.agent.log_level.clone();
    config.agent.log_level = level.to_uppercase();

    let content = serde_json::to_string_pretty(&config)?;
    std::fs::write(&config_path, content)?;

    println!("Log level updated: {} → {}", old_level, level.to_uppercase());
    println!("Configuration saved to: {:?}", config_path);

    // SIGHUP asks the running agent to reload its filter
    if let Some(pid) = get_pid()? {
        println!("Sending reload signal to agent (PID: {})...", pid);
        unsafe { libc::kill(pid as i32, libc::SIGHUP) };
        println!("✅ Log level changed successfully");
        println!("\nNote: New log level will be applied immediately.");
        println!("      View logs with: ./juice-agent -l");
    }

    Ok(())
}
