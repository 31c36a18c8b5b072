use std::fs;
use std::path::Path;
use std::process;

use anyhow::Result;

use crate::config::persistence::load_config;
use crate::daemon::pid::*;
use crate::daemon::systemd::*;
use crate::daemon::{LOG_DIR, RUN_DIR, SYSTEMD_SERVICE_PATH};

pub async fn show_status() -> Result<()> {
    println!("\x1b[32mjuice-agent v{} ({})\x1b[0m", env!("CARGO_PKG_VERSION"), std::env::consts::ARCH);
    println!("================================");

    if is_running() {
        if let Some(pid) = get_pid()? {
            println!("Status: Running (PID: {})", pid);

            let log_path = format!("{}/agent.log", LOG_DIR);
            if Path::new(&log_path).exists() {
                println!("\nLast 5 log entries:");
                if let Ok(content) = fs::read_to_string(&log_path) {
                    let lines: Vec<&str> = content.lines().rev().take(5).collect();
                    for line in lines.iter().rev() {
                        println!("   {}", line);
                    }
                }
            }
        }
    } else {
        println!("Status: Not running");
    }

    println!("\nConfiguration:");
    if let Ok(config) = load_config(None).await {
        println!("   Host: {}", config.host.server_url);
        println!("   Telemetry Interval: {}s", config.agent.update_interval);
        println!("   PiJuice: /dev/i2c-{} @ {:#04x}", config.ups.i2c_bus, config.ups.i2c_address);
        println!("   Field Prefix: {}", config.ups.field_prefix);
    } else {
        println!("   Error: Could not load configuration");
    }

    Ok(())
}

/// Run health check to verify agent installation
pub fn run_health_check() -> Result<()> {
    println!("\x1b[32mjuice-agent v{} ({})\x1b[0m", env!("CARGO_PKG_VERSION"), std::env::consts::ARCH);
    println!("Health Check");
    println!("============\n");

    let mut all_ok = true;

    let exe_path = std::env::current_exe()?;
    let config_path = exe_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine executable directory"))?
        .join("config.json");

    if config_path.exists() {
        println!("✓ Config file: {}", config_path.display());
    } else {
        println!("✗ Config file: NOT FOUND");
        println!("  Run: ./juice-agent --setup");
        all_ok = false;
    }

    if Path::new(RUN_DIR).exists() {
        println!("✓ Runtime dir: {}", RUN_DIR);
    } else {
        println!("⚠ Runtime dir: Not created (will be created on start)");
    }

    if Path::new(LOG_DIR).exists() {
        println!("✓ Log dir: {}", LOG_DIR);
    } else {
        println!("⚠ Log dir: Not created (will be created on start)");
    }

    // The I2C character device is the hardware prerequisite
    #[cfg(target_os = "linux")]
    {
        let i2c_dev = Path::new("/dev/i2c-1");
        if i2c_dev.exists() {
            println!("✓ I2C device: /dev/i2c-1");
        } else {
            println!("✗ I2C device: /dev/i2c-1 NOT FOUND");
            println!("  Enable I2C (e.g. via raspi-config) and reboot");
            all_ok = false;
        }
    }

    #[cfg(target_os = "linux")]
    {
        if has_systemd() {
            if Path::new(SYSTEMD_SERVICE_PATH).exists() {
                let enabled = process::Command::new("systemctl")
                    .args(["is-enabled", "juice-agent"])
                    .output()
                    .map(|o| o.status.success())
                    .unwrap_or(false);

                if enabled {
                    println!("✓ Systemd service: Installed and enabled");
                } else {
                    println!("⚠ Systemd service: Installed but NOT enabled");
                    println!("  Run: sudo systemctl enable juice-agent");
                }
            } else {
                println!("✗ Systemd service: NOT INSTALLED");
                println!("  Run: sudo ./juice-agent --install-service");
                all_ok = false;
            }
        } else {
            println!("- Systemd: Not available on this system");
        }
    }

    if is_running() {
        if let Ok(Some(pid)) = get_pid() {
            println!("✓ Agent status: Running (PID: {})", pid);
        }
    } else {
        println!("⚠ Agent status: Not running");
        all_ok = false;
    }

    println!();
    if all_ok {
        println!("\x1b[32m✓ All checks passed!\x1b[0m");
    } else {
        println!("\x1b[33m⚠ Some issues found - see above\x1b[0m");
    }

    Ok(())
}
