//! Agent configuration structs and defaults.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ups::pijuice::{DEFAULT_ADDRESS, DEFAULT_BUS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent: AgentSettings,
    pub host: HostSettings,
    pub ups: UpsSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    pub id: String,
    pub name: String,
    /// Seconds between standalone UPS telemetry pushes.
    pub update_interval: f64,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSettings {
    pub server_url: String,
    pub reconnect_interval: f64,
    pub connection_timeout: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsSettings {
    pub i2c_bus: u8,
    pub i2c_address: u16,
    /// Prefix for every field injected into loop packets.
    pub field_prefix: String,
    pub include_temperature: bool,
    pub include_io: bool,
    /// Charge percentage below which the agent logs a warning while the
    /// host link is down.
    #[serde(default = "default_low_charge_warn")]
    pub low_charge_warn: u8,
}

pub fn default_low_charge_warn() -> u8 {
    25
}

impl Default for UpsSettings {
    fn default() -> Self {
        Self {
            i2c_bus: DEFAULT_BUS,
            i2c_address: DEFAULT_ADDRESS,
            field_prefix: "ups_".to_string(),
            include_temperature: true,
            include_io: false,
            low_charge_warn: default_low_charge_warn(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        let hostname = hostname::get()
            .unwrap_or_else(|_| std::ffi::OsString::from("unknown"))
            .to_string_lossy()
            .to_string();

        // Unique agent ID: OS-hostname-UUID (short UUID: first 8 chars)
        let os_name = std::env::consts::OS;
        let short_uuid = &Uuid::new_v4().to_string()[..8];
        let agent_id = format!("{}-{}-{}", os_name, hostname, short_uuid);

        Self {
            agent: AgentSettings {
                id: agent_id,
                name: hostname,
                update_interval: 20.0,
                log_level: "INFO".to_string(),
            },
            host: HostSettings {
                server_url: "ws://[YOUR_HOST_IP]:9108/websocket".to_string(), // Placeholder forces user configuration
                reconnect_interval: 5.0,
                connection_timeout: 10.0,
            },
            ups: UpsSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_extension() {
        let config = AgentConfig::default();
        assert_eq!(config.agent.update_interval, 20.0);
        assert_eq!(config.ups.i2c_bus, 1);
        assert_eq!(config.ups.i2c_address, 0x14);
        assert_eq!(config.ups.field_prefix, "ups_");
    }

    #[test]
    fn missing_low_charge_warn_gets_default() {
        let json = r#"{
            "i2c_bus": 1,
            "i2c_address": 20,
            "field_prefix": "ups_",
            "include_temperature": true,
            "include_io": false
        }"#;
        let settings: UpsSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.low_charge_warn, 25);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = AgentConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let back: AgentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.agent.id, config.agent.id);
        assert_eq!(back.ups.i2c_address, config.ups.i2c_address);
    }
}
