use std::fs;
use std::path::Path;
use std::process;

use anyhow::{Context, Result};

use crate::daemon::{SYSTEMD_SERVICE_PATH, SYSTEMD_SERVICE_TEMPLATE};

/// Check if systemd is available on this system
pub fn has_systemd() -> bool {
    Path::new("/run/systemd/system").exists()
}

/// Check if the juice-agent systemd service is actively managing the process
pub fn is_systemd_service_active() -> bool {
    if !has_systemd() || !Path::new(SYSTEMD_SERVICE_PATH).exists() {
        return false;
    }

    process::Command::new("systemctl")
        .args(["is-active", "--quiet", "juice-agent"])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Install or repair systemd service for auto-start on boot (idempotent)
pub fn install_systemd_service() -> Result<()> {
    #[cfg(target_os = "linux")]
    if unsafe { libc::geteuid() } != 0 {
        return Err(anyhow::anyhow!(
            "Root privileges required. Run with: sudo ./juice-agent --install-service"
        ));
    }

    if !has_systemd() {
        println!("❌ systemd not detected on this system.");
        println!("   The agent can still run manually with: ./juice-agent --start");
        return Ok(());
    }

    let exe_path = std::env::current_exe()?;
    let work_dir = exe_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine executable directory"))?;

    let service_content = SYSTEMD_SERVICE_TEMPLATE
        .replace("{{EXEC_PATH}}", exe_path.to_str().unwrap_or("/opt/juice-agent/juice-agent"))
        .replace("{{WORK_DIR}}", work_dir.to_str().unwrap_or("/opt/juice-agent"));

    let service_path = Path::new(SYSTEMD_SERVICE_PATH);
    if service_path.exists() {
        if let Ok(existing_content) = fs::read_to_string(service_path) {
            if existing_content == service_content {
                println!("✓ Service is already installed and up-to-date");
                return Ok(());
            }
        }
        println!("! Existing service file found - updating...");
    }

    fs::write(service_path, &service_content)
        .context("Failed to write service file")?;
    println!("✓ Service file created: {}", SYSTEMD_SERVICE_PATH);

    let reload_status = process::Command::new("systemctl")
        .args(["daemon-reload"])
        .status();
    match reload_status {
        Ok(status) if status.success() => println!("✓ Systemd daemon reloaded"),
        _ => println!("⚠ Failed to reload systemd daemon (run: systemctl daemon-reload)"),
    }

    let enable_status = process::Command::new("systemctl")
        .args(["enable", "juice-agent.service"])
        .status();
    match enable_status {
        Ok(status) if status.success() => println!("✓ Service enabled (will start on boot)"),
        _ => println!("⚠ Failed to enable service (run: systemctl enable juice-agent.service)"),
    }

    println!();
    println!("Start now with: sudo systemctl start juice-agent");
    println!("Or use:         ./juice-agent --start");

    Ok(())
}

/// Uninstall systemd service
pub fn uninstall_systemd_service() -> Result<()> {
    #[cfg(target_os = "linux")]
    if unsafe { libc::geteuid() } != 0 {
        return Err(anyhow::anyhow!(
            "Root privileges required. Run with: sudo ./juice-agent --uninstall-service"
        ));
    }

    if !has_systemd() {
        println!("❌ systemd not detected on this system.");
        return Ok(());
    }

    let service_path = Path::new(SYSTEMD_SERVICE_PATH);
    if !service_path.exists() {
        println!("✓ Service is not installed");
        return Ok(());
    }

    let _ = process::Command::new("systemctl")
        .args(["stop", "juice-agent"])
        .status();
    println!("✓ Service stopped");

    let _ = process::Command::new("systemctl")
        .args(["disable", "juice-agent"])
        .status();
    println!("✓ Service disabled");

    fs::remove_file(service_path)?;
    println!("✓ Service file removed");

    let _ = process::Command::new("systemctl")
        .args(["daemon-reload"])
        .status();
    println!("✓ Systemd daemon reloaded");

    Ok(())
}
