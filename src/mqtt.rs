use std::sync::Arc;
use std::time::Duration;

use paho_mqtt as mqtt;

use crate::config::MqttConfig;

const KEEP_ALIVE_SECS: u64 = 60;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const DISCONNECT_TIMEOUT_SECS: u64 = 5;
const MQTT_MIN_RETRY_INTERVAL_SECS: u64 = 1;
const MQTT_MAX_RETRY_INTERVAL_SECS: u64 = 60;
const QOS_AT_MOST_ONCE: i32 = 0;

pub trait Publisher {
    fn publish(&self, topic: &str, payload: &str, retained: bool) -> Result<(), mqtt::Error>;
}

/// Receives connection state changes from the client's network thread
pub trait ConnectionObserver: Send + Sync {
    fn connected(&self, server_uri: &str);
    fn connection_lost(&self, server_uri: &str);
}

pub struct LoggingObserver;

impl ConnectionObserver for LoggingObserver {
    fn connected(&self, server_uri: &str) {
        log::info!("Connected to mqtt server {server_uri}");
    }

    fn connection_lost(&self, server_uri: &str) {
        log::warn!("Lost connection to mqtt server {server_uri}, reconnecting");
    }
}

#[derive(Clone)]
pub struct MqttPublisher {
    client: mqtt::AsyncClient,
}

impl MqttPublisher {
    /// Connects once; the client keeps the session alive and reconnects on its own afterwards
    pub fn connect(
        cfg: &MqttConfig,
        observer: Arc<dyn ConnectionObserver>,
    ) -> Result<Self, mqtt::Error> {
        let server_uri = cfg.server_uri();
        let create_opts = mqtt::CreateOptionsBuilder::new()
            .server_uri(&server_uri)
            .client_id(&cfg.client_id)
            .finalize();
        let client = mqtt::AsyncClient::new(create_opts)?;

        client.set_connected_callback({
            let observer = Arc::clone(&observer);
            let server_uri = server_uri.clone();
            move |_cli: &mqtt::AsyncClient| observer.connected(&server_uri)
        });
        client.set_connection_lost_callback({
            let server_uri = server_uri.clone();
            move |_cli: &mqtt::AsyncClient| observer.connection_lost(&server_uri)
        });

        let conn_opts = mqtt::ConnectOptionsBuilder::with_mqtt_version(mqtt::MQTT_VERSION_3_1_1)
            .keep_alive_interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .automatic_reconnect(
                Duration::from_secs(MQTT_MIN_RETRY_INTERVAL_SECS),
                Duration::from_secs(MQTT_MAX_RETRY_INTERVAL_SECS)
            )
            .clean_session(true)
            .user_name(&cfg.auth.user)
            .password(&cfg.auth.password)
            .finalize();

        log::info!("Connecting to mqtt server {server_uri} as '{}'", cfg.client_id);
        client.connect(conn_opts).wait()?;
        Ok(Self { client })
    }

    pub fn disconnect(&self) {
        if !self.client.is_connected() {
            return;
        }
        match self.client.disconnect(None).wait_for(Duration::from_secs(DISCONNECT_TIMEOUT_SECS)) {
            Ok(_) => log::info!("Disconnected from mqtt server"),
            Err(e) => log::warn!("Error when disconnecting from mqtt server: {e}"),
        }
    }
}

impl Publisher for MqttPublisher {
    // Only queues the message; delivery is not awaited.
    fn publish(&self, topic: &str, payload: &str, retained: bool) -> Result<(), mqtt::Error> {
        let msg = if retained {
            mqtt::Message::new_retained(topic, payload, QOS_AT_MOST_ONCE)
        } else {
            mqtt::Message::new(topic, payload, QOS_AT_MOST_ONCE)
        };
        self.client.try_publish(msg).map(|_| ())
    }
}
