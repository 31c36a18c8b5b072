//! Outbound host messages: registration, telemetry, and loop-packet replies.

use anyhow::Result;
use futures_util::SinkExt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, trace, warn};

use crate::config::types::{AgentConfig, UpsSettings};
use crate::packet::{augment_packet, emitted_fields, LoopPacket};
use crate::ups::monitor::UpsMonitor;

use super::client::WsSink;

/// Poll the UPS and copy the snapshot into `packet`. Returns whether the
/// packet was augmented; on any UPS error the packet is left untouched so
/// the host cycle carries on with its own fields only.
pub(crate) async fn augment_or_passthrough(
    monitor: &dyn UpsMonitor,
    settings: &UpsSettings,
    packet: &mut LoopPacket,
) -> bool {
    match monitor.read_snapshot().await {
        Ok(snap) => {
            augment_packet(packet, &snap, settings);
            true
        }
        Err(e) => {
            warn!("UPS read failed, passing loop packet through unchanged: {}", e);
            false
        }
    }
}

/// Registration message body. The interval stays f64 end to end; the rest
/// of the agent treats it as fractional seconds.
pub(crate) fn registration_payload(config: &AgentConfig) -> serde_json::Value {
    serde_json::json!({
        "type": "register",
        "data": {
            "agentId": config.agent.id,
            "name": config.agent.name,
            "agent_version": env!("CARGO_PKG_VERSION"),
            "platform": std::env::consts::OS,
            "update_interval": config.agent.update_interval,
            "log_level": config.agent.log_level.clone(),
            "capabilities": {
                "fields": emitted_fields(&config.ups),
                "i2c_bus": config.ups.i2c_bus,
                "i2c_address": config.ups.i2c_address,
            }
        }
    })
}

impl super::client::HostClient {
    pub(crate) async fn send_registration(&self, write: &mut WsSink) -> Result<()> {
        let config = self.config.read().await;
        let registration = registration_payload(&config);

        write.send(Message::Text(registration.to_string())).await?;
        info!("✅ Agent registered: {}", config.agent.id);
        Ok(())
    }

    /// Push a standalone UPS reading. A failed poll is logged and skipped;
    /// it must never tear down the telemetry loop.
    pub(crate) async fn send_telemetry(
        write: &mut WsSink,
        config: &Arc<RwLock<AgentConfig>>,
        monitor: &Arc<dyn UpsMonitor>,
        system: &Arc<tokio::sync::Mutex<sysinfo::System>>,
        started_at: std::time::Instant,
    ) -> Result<()> {
        trace!("Starting UPS poll");
        let snapshot = match monitor.read_snapshot().await {
            Ok(snap) => snap,
            Err(e) => {
                warn!("UPS telemetry poll failed, skipping this cycle: {}", e);
                return Ok(());
            }
        };

        let (cpu_usage, memory_usage) = {
            let mut sys = system.lock().await;
            sys.refresh_cpu();
            sys.refresh_memory();
            let cpu = sys.global_cpu_info().cpu_usage() as f64;
            let mem = (sys.used_memory() as f64 / sys.total_memory() as f64) * 100.0;
            (cpu, mem)
        };

        let config_read = config.read().await;
        let timestamp = chrono::Utc::now().timestamp_millis();
        let data = serde_json::json!({
            "type": "ups_telemetry",
            "data": {
                "agentId": config_read.agent.id,
                "timestamp": timestamp,
                "ups": &snapshot,
                "agentHealth": {
                    "cpuUsage": cpu_usage,
                    "memoryUsage": memory_usage,
                    "agentUptime": started_at.elapsed().as_secs_f64(),
                }
            }
        });

        trace!("Sending WebSocket message (timestamp: {})", timestamp);
        write.send(Message::Text(data.to_string())).await?;

        debug!(
            "Sent UPS telemetry: {}% charge, {:.3} V",
            snapshot.charge_percent, snapshot.battery_voltage
        );
        Ok(())
    }

    /// Handle the host's per-cycle loop packet: augment (best effort) and
    /// send it back. The reply carries the whole record; the host decides
    /// what to persist.
    pub(crate) async fn handle_loop_packet(
        &self,
        data: &serde_json::Value,
        write: &mut WsSink,
    ) -> Result<()> {
        let mut packet: LoopPacket = match data.as_object() {
            Some(map) => map.clone(),
            None => {
                warn!("loop_packet data is not an object, ignoring");
                return Ok(());
            }
        };

        let settings = self.config.read().await.ups.clone();
        let augmented = augment_or_passthrough(self.monitor.as_ref(), &settings, &mut packet).await;

        let config = self.config.read().await;
        let reply = serde_json::json!({
            "type": "loop_packet",
            "data": {
                "agentId": config.agent.id,
                "timestamp": chrono::Utc::now().timestamp_millis(),
                "augmented": augmented,
                "packet": packet,
            }
        });
        drop(config);

        write.send(Message::Text(reply.to_string())).await?;
        debug!("Replied to loop packet (augmented: {})", augmented);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::ups::types::*;
    use crate::ups::UpsError;

    struct FixedMonitor(UpsSnapshot);

    #[async_trait]
    impl UpsMonitor for FixedMonitor {
        async fn read_snapshot(&self) -> Result<UpsSnapshot, UpsError> {
            Ok(self.0.clone())
        }
    }

    struct UnreachableMonitor;

    #[async_trait]
    impl UpsMonitor for UnreachableMonitor {
        async fn read_snapshot(&self) -> Result<UpsSnapshot, UpsError> {
            Err(UpsError::Unreachable {
                bus: 1,
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    }

    fn snapshot() -> UpsSnapshot {
        UpsSnapshot {
            charge_percent: 85,
            battery_voltage: 4.1,
            battery_current: 0.21,
            battery_temperature: 24.0,
            io_voltage: 5.12,
            io_current: 0.4,
            battery: BatteryState::ChargingFromIn,
            power_input: PowerInput::Present,
            power_input_io: PowerInput::NotPresent,
            faults: FaultStatus {
                button_power_off: false,
                forced_power_off: false,
                forced_sys_power_off: false,
                watchdog_reset: false,
                battery_profile_invalid: false,
                charging_temp: ChargingTempFault::Normal,
            },
        }
    }

    fn host_packet() -> LoopPacket {
        let mut packet = LoopPacket::new();
        packet.insert("dateTime".into(), json!(1627900000));
        packet.insert("outTemp".into(), json!(17.2));
        packet
    }

    #[tokio::test]
    async fn successful_poll_augments_packet() {
        let monitor = FixedMonitor(snapshot());
        let settings = UpsSettings::default();
        let mut packet = host_packet();

        let augmented = augment_or_passthrough(&monitor, &settings, &mut packet).await;

        assert!(augmented);
        assert_eq!(packet["ups_charge"], json!(85));
        assert_eq!(packet["ups_power_present"], json!(true));
    }

    #[test]
    fn registration_keeps_fractional_interval() {
        let mut config = AgentConfig::default();
        config.agent.update_interval = 12.5;

        let payload = registration_payload(&config);

        assert_eq!(payload["data"]["update_interval"], json!(12.5));
        assert_eq!(
            payload["data"]["capabilities"]["fields"],
            json!(emitted_fields(&config.ups))
        );
    }

    #[tokio::test]
    async fn unreachable_ups_leaves_packet_unmodified() {
        let monitor = UnreachableMonitor;
        let settings = UpsSettings::default();
        let mut packet = host_packet();
        let before = packet.clone();

        let augmented = augment_or_passthrough(&monitor, &settings, &mut packet).await;

        assert!(!augmented);
        assert_eq!(packet, before);
    }
}
