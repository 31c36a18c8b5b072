//! Config file load, save, and migration logic.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::types::AgentConfig;

pub fn default_config_path() -> Result<PathBuf> {
    let exe_dir = std::env::current_exe()?
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine executable directory"))?
        .to_path_buf();
    Ok(exe_dir.join("config.json"))
}

/// Migrate config to current version (removes deprecated, adds new fields).
/// Handles configs written by earlier releases automatically.
pub(crate) fn migrate_config(config_path: &Path) -> Result<bool> {
    if !config_path.exists() {
        return Ok(false);
    }

    let content = std::fs::read_to_string(config_path)?;
    let mut json: serde_json::Value = serde_json::from_str(&content)?;
    let mut migrated = false;

    if let Some(ups) = json.get_mut("ups").and_then(|u| u.as_object_mut()) {
        // === RENAMES ===
        // v0.1 called the push interval "poll_interval" and kept it here
        if let Some(interval) = ups.remove("poll_interval") {
            if let Some(agent) = json.get_mut("agent").and_then(|a| a.as_object_mut()) {
                agent.entry("update_interval").or_insert(interval);
            }
            info!("Migrated: moved 'ups.poll_interval' to 'agent.update_interval'");
            migrated = true;
        }
    }

    if let Some(ups) = json.get_mut("ups").and_then(|u| u.as_object_mut()) {
        // === ADDITIONS ===
        if !ups.contains_key("low_charge_warn") {
            ups.insert("low_charge_warn".to_string(), serde_json::json!(25));
            info!("Migrated: added 'low_charge_warn' with default 25");
            migrated = true;
        }
    }

    if migrated {
        std::fs::write(config_path, serde_json::to_string_pretty(&json)?)?;
        info!("Config migrated to latest version: {:?}", config_path);
    }

    Ok(migrated)
}

pub async fn load_config(path: Option<&str>) -> Result<AgentConfig> {
    let config_path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        default_config_path()?
    };

    if let Err(e) = migrate_config(&config_path) {
        warn!("Config migration check failed: {}", e);
    }

    if config_path.exists() {
        let content = tokio::fs::read_to_string(&config_path).await?;
        let config: AgentConfig = serde_json::from_str(&content)?;

        if config.host.server_url.contains("[YOUR_HOST_IP]") || config.host.server_url.is_empty() {
            warn!("⚠️ Host URL is not configured in {:?}. Agent will fail to connect.", config_path);
            warn!("Please run the setup wizard ('--setup') or edit the config file manually.");
        }

        info!("Loaded configuration from: {:?}", config_path);
        Ok(config)
    } else {
        info!("Config file not found. Please run the setup wizard ('--setup') to generate one.");
        Ok(AgentConfig::default())
    }
}

pub async fn save_config(config: &AgentConfig, path: &str) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path, content).await?;
    info!("Configuration saved to: {}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrates_v01_poll_interval() {
        let dir = std::env::temp_dir().join(format!("juice-agent-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(
            &path,
            r#"{"agent": {"id": "a", "name": "n", "log_level": "INFO"},
                "host": {"server_url": "ws://x", "reconnect_interval": 5.0, "connection_timeout": 10.0},
                "ups": {"i2c_bus": 1, "i2c_address": 20, "field_prefix": "ups_",
                        "include_temperature": true, "include_io": false, "poll_interval": 30.0}}"#,
        )
        .unwrap();

        assert!(migrate_config(&path).unwrap());

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["agent"]["update_interval"], serde_json::json!(30.0));
        assert!(json["ups"].get("poll_interval").is_none());
        assert_eq!(json["ups"]["low_charge_warn"], serde_json::json!(25));

        // Second pass is a no-op
        assert!(!migrate_config(&path).unwrap());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
