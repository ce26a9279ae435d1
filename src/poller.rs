use std::fmt::Display;
use std::thread;
use std::time::Duration;

use paho_mqtt as mqtt;
use snafu::{ResultExt, Whatever};

use crate::accuweather::{Location, WeatherProvider};
use crate::config::MqttConfig;
use crate::hass::{self, CONDITIONS_SUFFIX, IS_DAY_TIME_SUFFIX, SENSORS, TEMPERATURE_SUFFIX};
use crate::mqtt::Publisher;

pub trait Clock {
    /// Waits for `period`. Returns `false` when no further tick should run.
    fn sleep(&mut self, period: Duration) -> bool;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&mut self, period: Duration) -> bool {
        thread::sleep(period);
        true
    }
}

pub struct Poller<'a, W: WeatherProvider, P: Publisher> {
    provider: W,
    publisher: P,
    location: Location,
    mqtt_cfg: &'a MqttConfig,
    interval: Duration,
}

impl<'a, W: WeatherProvider, P: Publisher> Poller<'a, W, P> {
    pub fn new(
        provider: W,
        publisher: P,
        location: Location,
        mqtt_cfg: &'a MqttConfig,
        interval: Duration,
    ) -> Self {
        Self {
            provider,
            publisher,
            location,
            mqtt_cfg,
            interval,
        }
    }

    pub fn publish_discovery(&self) -> Result<(), Whatever> {
        for sensor in SENSORS {
            let topic = sensor.config_topic(&self.mqtt_cfg.discovery_prefix);
            let discovery = sensor.discovery(&self.mqtt_cfg.state_prefix);
            let msg = serde_json::to_string(&discovery)
                .with_whatever_context(|e| format!("Error when serializing discovery message: {e}"))?;
            log::trace!("Sending message to {topic}: {msg}");
            self.publisher.publish(&topic, &msg, true)
                .with_whatever_context(|e| {
                    format!("Error when creating entity '{}': {e}", sensor.display_name)
                })?;
            log::info!("Published discovery config for '{}' ({})", sensor.display_name, sensor.component);
        }
        Ok(())
    }

    pub fn publish_state<V: Display>(&self, topic_suffix: &str, value: V) -> Result<(), mqtt::Error> {
        let topic = hass::state_topic(&self.mqtt_cfg.state_prefix, topic_suffix);
        let value = value.to_string();
        log::trace!("Sending message to {topic}: {value}");
        self.publisher.publish(&topic, &value, false)
    }

    /// Fetches once and publishes every reading. A failed fetch publishes nothing.
    pub fn poll_once(&self) {
        log::debug!("Fetching current conditions for {}", self.location.location_key);
        let conditions = match self.provider.current_conditions(&self.location.location_key) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Error when fetching current conditions, retrying next interval: {e}");
                return;
            }
        };
        log::info!(
            "{}: {}°C, {}, day time: {}",
            self.location.city_name,
            conditions.temperature_celsius,
            conditions.condition_text,
            conditions.is_daytime,
        );

        let states: [(&str, &dyn Display); 3] = [
            (TEMPERATURE_SUFFIX, &conditions.temperature_celsius),
            (CONDITIONS_SUFFIX, &conditions.condition_text),
            (IS_DAY_TIME_SUFFIX, &hass::on_off(conditions.is_daytime)),
        ];
        for (suffix, value) in states {
            if let Err(e) = self.publish_state(suffix, value) {
                log::warn!("Cannot publish {suffix} state: {e}");
            }
        }
    }

    /// Publishes discovery once, then polls immediately and after every interval
    pub fn run<C: Clock>(&self, clock: &mut C) -> Result<(), Whatever> {
        self.publish_discovery()?;
        loop {
            self.poll_once();
            log::debug!("Waiting {}s until next refresh", self.interval.as_secs());
            if !clock.sleep(self.interval) {
                return Ok(());
            }
        }
    }
}
