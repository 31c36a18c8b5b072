//! Interactive setup wizard for first-run configuration.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::persistence::{default_config_path, load_config, save_config};
use crate::config::types::*;
use crate::ups::monitor::UpsMonitor;

#[cfg(target_os = "linux")]
use crate::daemon::control::start_daemon_with_log_level;
#[cfg(target_os = "linux")]
use crate::daemon::pid::is_running;
#[cfg(target_os = "linux")]
use crate::daemon::systemd::{has_systemd, install_systemd_service};
#[cfg(target_os = "linux")]
use crate::daemon::SYSTEMD_SERVICE_PATH;

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

pub async fn run_setup_wizard(config_path: Option<&str>) -> Result<()> {
    let config_file = if let Some(p) = config_path {
        PathBuf::from(p)
    } else {
        default_config_path()?
    };

    println!("\n╔══════════════════════════════════════════╗");
    println!("║      PiJuice UPS Agent Setup Wizard      ║");
    println!("╚══════════════════════════════════════════╝");
    println!("Build: \x1b[32mjuice-agent v{} ({})\x1b[0m\n", env!("CARGO_PKG_VERSION"), std::env::consts::ARCH);

    // Load existing config if present
    let existing_config = if config_file.exists() {
        println!("⚠️  Config file already exists: {:?}", config_file);
        let response = prompt("Overwrite? (y/N): ")?;
        if !response.eq_ignore_ascii_case("y") {
            println!("Config unchanged.");
            return Ok(());
        }
        load_config(config_file.to_str()).await.ok()
    } else {
        None
    };

    println!("\n📋 Configuration:\n");
    println!("Values in [brackets] are defaults - press Enter to use them.\n");

    let defaults = existing_config.clone().unwrap_or_default();

    // Agent ID is generated silently and kept across re-runs
    let agent_id = defaults.agent.id.clone();

    let input = prompt(&format!("Agent Name [{}]: ", defaults.agent.name))?;
    let agent_name = if input.is_empty() { defaults.agent.name.clone() } else { input };

    let input = prompt(&format!("Weather Host WebSocket URL [{}]: ", defaults.host.server_url))?;
    let server_url = if input.is_empty() { defaults.host.server_url.clone() } else { input };

    let input = prompt(&format!("Telemetry Interval (seconds) [{}]: ", defaults.agent.update_interval))?;
    let update_interval = if input.is_empty() {
        defaults.agent.update_interval
    } else {
        input.parse::<f64>().unwrap_or(defaults.agent.update_interval)
    };

    let input = prompt(&format!("I2C bus [{}]: ", defaults.ups.i2c_bus))?;
    let i2c_bus = if input.is_empty() {
        defaults.ups.i2c_bus
    } else {
        input.parse::<u8>().unwrap_or(defaults.ups.i2c_bus)
    };

    let input = prompt(&format!("I2C address (hex) [{:#04x}]: ", defaults.ups.i2c_address))?;
    let i2c_address = if input.is_empty() {
        defaults.ups.i2c_address
    } else {
        u16::from_str_radix(input.trim_start_matches("0x"), 16).unwrap_or(defaults.ups.i2c_address)
    };

    let input = prompt("Include 5V GPIO rail fields? (y/N): ")?;
    let include_io = input.eq_ignore_ascii_case("y");

    let config = AgentConfig {
        agent: AgentSettings {
            id: agent_id,
            name: agent_name,
            update_interval,
            log_level: defaults.agent.log_level.clone(),
        },
        host: HostSettings {
            server_url,
            reconnect_interval: defaults.host.reconnect_interval,
            connection_timeout: defaults.host.connection_timeout,
        },
        ups: UpsSettings {
            i2c_bus,
            i2c_address,
            include_io,
            ..defaults.ups.clone()
        },
    };

    save_config(&config, config_file.to_str().unwrap_or("config.json")).await?;
    println!("\n✅ Configuration saved to: {:?}", config_file);

    // Test the UPS read
    let test = prompt("\n🔍 Test PiJuice connectivity now? (Y/n): ")?;
    if !test.eq_ignore_ascii_case("n") {
        println!("\nReading PiJuice on /dev/i2c-{} address {:#04x}...\n", i2c_bus, i2c_address);

        #[cfg(target_os = "linux")]
        {
            let monitor = crate::ups::monitor::PiJuiceMonitor::new(i2c_bus, i2c_address);
            match monitor.read_snapshot().await {
                Ok(snap) => {
                    println!("✅ PiJuice responding");
                    println!("  • Charge:  {}%", snap.charge_percent);
                    println!("  • Battery: {:.3} V, {:.3} A ({})", snap.battery_voltage, snap.battery_current, snap.battery.label());
                    println!("  • Power:   {}", if snap.power_present() { "present" } else { "absent" });
                }
                Err(e) => {
                    println!("⚠ Could not read PiJuice: {}", e);
                    println!("  Check that the HAT is seated and I2C is enabled (raspi-config).");
                }
            }
        }
    }

    // Autostart prompt (show if systemd available and service not installed)
    #[cfg(target_os = "linux")]
    if has_systemd() && !Path::new(SYSTEMD_SERVICE_PATH).exists() {
        println!("\nAuto-start service not installed");
        let autostart = prompt("   Install systemd service to start agent on boot? [Y/n]: ")?;

        if !autostart.eq_ignore_ascii_case("n") {
            if unsafe { libc::geteuid() } == 0 {
                if let Err(e) = install_systemd_service() {
                    println!("   ⚠ Could not install service: {}", e);
                    println!("   You can retry later with: sudo ./juice-agent --install-service");
                }
            } else {
                println!("   ⚠ Root privileges required to install service.");
                println!("   Run later with: sudo ./juice-agent --install-service");
            }
        }
    }

    println!("\n✨ Setup complete!");

    #[cfg(target_os = "linux")]
    if !is_running() {
        let start = prompt("\n   Start the agent now? [Y/n]: ")?;
        if !start.eq_ignore_ascii_case("n") {
            if let Err(e) = start_daemon_with_log_level(None) {
                println!("   ⚠ Could not start agent: {}", e);
            }
        } else if has_systemd() && Path::new(SYSTEMD_SERVICE_PATH).exists() {
            println!("\n   Start later with: sudo systemctl start juice-agent");
        } else {
            println!("\n   Start later with: ./juice-agent --start");
        }
    } else {
        println!("   Agent is already running.");
    }

    Ok(())
}
