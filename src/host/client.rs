//! Host link: connection lifecycle, reconnect backoff, and message dispatch.

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::EnvFilter;

use crate::app::logging::{filter_for_level, RELOAD_HANDLE};
use crate::config::types::AgentConfig;
use crate::ups::monitor::UpsMonitor;

/// Type alias for the WebSocket write half (used across host submodules).
pub(crate) type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    Message,
>;

// If nothing arrives for this long the connection is assumed half-open.
const CONNECTION_HEALTH_TIMEOUT_SECS: u64 = 60;

pub struct HostClient {
    pub(crate) config: Arc<RwLock<AgentConfig>>,
    pub(crate) monitor: Arc<dyn UpsMonitor>,
    pub(crate) running: Arc<RwLock<bool>>,
    pub(crate) started_at: std::time::Instant,
    pub(crate) system: Arc<tokio::sync::Mutex<sysinfo::System>>,
}

impl HostClient {
    pub fn new(config: AgentConfig, monitor: Arc<dyn UpsMonitor>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            monitor,
            running: Arc::new(RwLock::new(false)),
            started_at: std::time::Instant::now(),
            system: Arc::new(tokio::sync::Mutex::new(sysinfo::System::new_all())),
        }
    }

    /// While the host is unreachable the UPS keeps being polled so a draining
    /// battery still ends up in the logs. Nothing is persisted locally.
    async fn offline_battery_check(&self) {
        let low_charge_warn = self.config.read().await.ups.low_charge_warn;

        match self.monitor.read_snapshot().await {
            Ok(snap) => {
                if !snap.power_present() && snap.charge_percent <= low_charge_warn {
                    warn!(
                        "🔋 Host unreachable and battery low: {}% ({:.3} V), input power absent",
                        snap.charge_percent, snap.battery_voltage
                    );
                }
            }
            Err(e) => debug!("Offline UPS check failed: {}", e),
        }
    }

    pub async fn run(&self) -> Result<()> {
        *self.running.write().await = true;
        let mut retry_count = 0;

        loop {
            if !*self.running.read().await {
                break;
            }

            match self.connect_and_communicate().await {
                Ok(_) => {
                    info!("WebSocket connection closed normally");
                    retry_count = 0;
                }
                Err(e) => error!("WebSocket error: {}", e),
            }

            if *self.running.read().await {
                let config = self.config.read().await;
                // Capped backoff: the UPS data is low-rate, no point hammering
                let base_interval = config.host.reconnect_interval;
                let wait_time = match retry_count {
                    0 => base_interval,
                    1 => base_interval * 2.0,
                    2 => base_interval * 4.0,
                    _ => base_interval * 6.0,
                };
                let update_interval = config.agent.update_interval;
                drop(config);
                retry_count = (retry_count + 1).min(3);

                info!("Reconnecting in {:.1}s... (attempt {})", wait_time, retry_count);

                // During the wait keep an eye on the battery at the normal cadence
                let wait_duration = Duration::from_secs_f64(wait_time);
                let check_interval = Duration::from_secs_f64(update_interval);
                let start = std::time::Instant::now();

                while start.elapsed() < wait_duration {
                    if !*self.running.read().await {
                        break;
                    }

                    self.offline_battery_check().await;

                    let remaining = wait_duration.saturating_sub(start.elapsed());
                    let sleep_time = check_interval.min(remaining);
                    if sleep_time > Duration::ZERO {
                        time::sleep(sleep_time).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_communicate(&self) -> Result<()> {
        let config = self.config.read().await;
        info!("Connecting to weather host: {}", config.host.server_url);
        trace!("Connection timeout: {}s", config.host.connection_timeout);

        let timeout_duration = Duration::from_secs_f64(config.host.connection_timeout);
        let connect_future = connect_async(&config.host.server_url);

        let (ws_stream, _) = tokio::time::timeout(timeout_duration, connect_future)
            .await
            .context("Connection timeout")??;
        drop(config);
        info!("✅ WebSocket connected");

        let (write, read) = ws_stream.split();
        let write = Arc::new(tokio::sync::Mutex::new(write));

        {
            let mut w = write.lock().await;
            self.send_registration(&mut w).await?;
        }

        // Standalone telemetry pushes between host-driven loop packets
        let config = Arc::clone(&self.config);
        let monitor = Arc::clone(&self.monitor);
        let running = Arc::clone(&self.running);
        let system = Arc::clone(&self.system);
        let started_at = self.started_at;
        let write_clone = Arc::clone(&write);

        let telemetry_sender = tokio::spawn(async move {
            while *running.read().await {
                let mut w = write_clone.lock().await;
                if let Err(e) =
                    Self::send_telemetry(&mut w, &config, &monitor, &system, started_at).await
                {
                    error!("Failed to send telemetry: {}", e);
                    break;
                }
                drop(w);

                let interval = config.read().await.agent.update_interval;
                time::sleep(Duration::from_secs_f64(interval)).await;
            }
        });

        let mut last_message_received = std::time::Instant::now();

        let mut read = read;
        loop {
            if !*self.running.read().await {
                info!("Shutdown requested, closing WebSocket");
                break;
            }

            let elapsed = last_message_received.elapsed();
            if elapsed.as_secs() > CONNECTION_HEALTH_TIMEOUT_SECS {
                warn!(
                    "Connection health check failed: no message received for {}s, reconnecting",
                    elapsed.as_secs()
                );
                break;
            }

            // Read with timeout to periodically check shutdown flag and health
            let timeout = time::timeout(Duration::from_secs(1), read.next()).await;

            match timeout {
                Ok(Some(msg)) => match msg {
                    Ok(Message::Text(text)) => {
                        last_message_received = std::time::Instant::now();
                        let mut w = write.lock().await;
                        if let Err(e) = self.handle_message(&text, &mut w).await {
                            error!("Failed to handle message: {}", e);
                        }
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                        last_message_received = std::time::Instant::now();
                        debug!("Received keepalive ping/pong");
                    }
                    Ok(Message::Close(_)) => {
                        info!("Host closed connection");
                        break;
                    }
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {
                        last_message_received = std::time::Instant::now();
                    }
                },
                Ok(None) => {
                    info!("WebSocket stream ended");
                    break;
                }
                Err(_) => {
                    // Timeout; loop back for the shutdown/health checks
                    continue;
                }
            }
        }

        telemetry_sender.abort();
        match telemetry_sender.await {
            Ok(_) => debug!("Telemetry sender task completed"),
            Err(e) if e.is_cancelled() => debug!("Telemetry sender task cancelled"),
            Err(e) => error!("Telemetry sender task error: {}", e),
        }
        Ok(())
    }

    async fn handle_message(&self, text: &str, write: &mut WsSink) -> Result<()> {
        trace!("Received message: {} bytes", text.len());
        let message: serde_json::Value = serde_json::from_str(text)?;

        if let Some(msg_type) = message.get("type").and_then(|v| v.as_str()) {
            match msg_type {
                // The host's per-cycle callback: augment the record and reply
                "loop_packet" => {
                    if let Some(data) = message.get("data") {
                        self.handle_loop_packet(data, write).await?;
                    }
                }
                "ping" => {
                    let pong = serde_json::json!({
                        "type": "pong",
                        "timestamp": chrono::Utc::now().timestamp_millis()
                    });
                    write.send(Message::Text(pong.to_string())).await?;
                }
                "registered" => {
                    info!("Agent successfully registered with weather host");

                    if let Some(config) = message.get("configuration") {
                        info!("Applying configuration from host");

                        if let Some(interval) = config.get("update_interval").and_then(|v| v.as_f64()) {
                            self.set_update_interval(interval).await;
                            info!("Applied update_interval: {}s", interval);
                        }

                        if let Some(level) = config.get("log_level").and_then(|v| v.as_str()) {
                            self.set_log_level(level).await;
                            info!("Applied log_level: {}", level);
                        }
                    }
                }
                _ => {
                    debug!("Received message type: {}", msg_type);
                }
            }
        }

        Ok(())
    }

    async fn set_update_interval(&self, interval: f64) {
        if interval <= 0.0 {
            warn!("Ignoring non-positive update_interval from host: {}", interval);
            return;
        }
        self.config.write().await.agent.update_interval = interval;
    }

    async fn set_log_level(&self, level: &str) {
        self.config.write().await.agent.log_level = level.to_uppercase();
        if let Some(handle) = RELOAD_HANDLE.get() {
            let filter = filter_for_level(level);
            if let Err(e) = handle.reload(EnvFilter::new(filter)) {
                error!("Failed to reload log level: {}", e);
            }
        }
    }

    pub async fn stop(&self) {
        *self.running.write().await = false;
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::ups::types::UpsSnapshot;
    use crate::ups::UpsError;

    struct NoUps;

    #[async_trait]
    impl UpsMonitor for NoUps {
        async fn read_snapshot(&self) -> Result<UpsSnapshot, UpsError> {
            Err(UpsError::Unreachable {
                bus: 1,
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    }

    // stop() must terminate the run loop so the signal handlers (Ctrl+C and
    // SIGTERM both call it) can shut the agent down cleanly.
    #[tokio::test]
    async fn stop_terminates_run_loop() {
        let mut config = AgentConfig::default();
        // Nothing listens here; run() stays in the reconnect cycle
        config.host.server_url = "ws://127.0.0.1:1".to_string();
        config.host.reconnect_interval = 0.05;
        config.host.connection_timeout = 0.5;
        config.agent.update_interval = 0.05;

        let client = Arc::new(HostClient::new(config, Arc::new(NoUps)));

        let runner = Arc::clone(&client);
        let handle = tokio::spawn(async move { runner.run().await });

        time::sleep(Duration::from_millis(150)).await;
        client.stop().await;

        let result = time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("run loop did not terminate after stop()")
            .expect("run task panicked");
        assert!(result.is_ok());
    }
}
