use std::fmt;

use serde::Serialize;

pub const DEVICE_ID: &str = "accuweather_weather_publisher";
pub const DEVICE_NAME: &str = "AccuWeather Weather";
pub const DEVICE_MANUFACTURER: &str = "AccuWeather";
pub const DEVICE_MODEL: &str = "MQTT Publisher";

pub const TEMPERATURE_SUFFIX: &str = "temperature";
pub const CONDITIONS_SUFFIX: &str = "conditions";
pub const IS_DAY_TIME_SUFFIX: &str = "is_day_time";

pub const PAYLOAD_ON: &str = "on";
pub const PAYLOAD_OFF: &str = "off";

pub const SENSORS: &[SensorDescriptor] = &[
    SensorDescriptor {
        component: Component::Sensor,
        display_name: "AccuWeather Temperature",
        unique_id_suffix: TEMPERATURE_SUFFIX,
        state_topic_suffix: TEMPERATURE_SUFFIX,
        device_class: Some("temperature"),
        unit_of_measurement: Some("°C"),
        payloads: None,
    },
    SensorDescriptor {
        component: Component::Sensor,
        display_name: "AccuWeather Conditions",
        unique_id_suffix: CONDITIONS_SUFFIX,
        state_topic_suffix: CONDITIONS_SUFFIX,
        device_class: Some("enum"),
        unit_of_measurement: None,
        payloads: None,
    },
    SensorDescriptor {
        component: Component::BinarySensor,
        display_name: "AccuWeather Is Day Time",
        unique_id_suffix: IS_DAY_TIME_SUFFIX,
        state_topic_suffix: IS_DAY_TIME_SUFFIX,
        device_class: Some("light"),
        unit_of_measurement: None,
        payloads: Some(BinaryPayloads { on: PAYLOAD_ON, off: PAYLOAD_OFF }),
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Sensor,
    BinarySensor,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Sensor => f.write_str("sensor"),
            Component::BinarySensor => f.write_str("binary_sensor"),
        }
    }
}

/// On/off literals of a binary sensor. Kept as a pair so one cannot be set without the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryPayloads {
    pub on: &'static str,
    pub off: &'static str,
}

#[derive(Debug)]
pub struct SensorDescriptor {
    pub component: Component,
    pub display_name: &'static str,
    pub unique_id_suffix: &'static str,
    pub state_topic_suffix: &'static str,
    pub device_class: Option<&'static str>,
    pub unit_of_measurement: Option<&'static str>,
    pub payloads: Option<BinaryPayloads>,
}

impl SensorDescriptor {
    pub fn config_topic(&self, discovery_prefix: &str) -> String {
        format!(
            "{discovery_prefix}/{}/{DEVICE_ID}/{}/config",
            self.component,
            self.unique_id_suffix,
        )
    }

    pub fn discovery(&self, state_prefix: &str) -> Discovery {
        Discovery {
            name: self.display_name.to_string(),
            state_topic: state_topic(state_prefix, self.state_topic_suffix),
            unique_id: format!("{DEVICE_ID}_{}", self.unique_id_suffix),
            force_update: true,
            device: Device::default(),
            unit_of_measurement: self.unit_of_measurement.map(str::to_string),
            device_class: self.device_class.map(str::to_string),
            payload_on: self.payloads.map(|p| p.on.to_string()),
            payload_off: self.payloads.map(|p| p.off.to_string()),
        }
    }
}

pub fn state_topic(state_prefix: &str, suffix: &str) -> String {
    format!("{state_prefix}/{suffix}")
}

pub fn on_off(value: bool) -> &'static str {
    if value { PAYLOAD_ON } else { PAYLOAD_OFF }
}

#[derive(Debug, Serialize)]
pub struct Discovery {
    pub name: String,
    pub state_topic: String,
    pub unique_id: String,
    pub force_update: bool,
    pub device: Device,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Device {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            identifiers: vec![DEVICE_ID.to_string()],
            name: DEVICE_NAME.to_string(),
            manufacturer: DEVICE_MANUFACTURER.to_string(),
            model: DEVICE_MODEL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{on_off, Component, SENSORS};

    #[test]
    fn test_config_topics() {
        let topics: Vec<_> = SENSORS.iter()
            .map(|s| s.config_topic("homeassistant"))
            .collect();
        assert_eq!(topics, vec![
            "homeassistant/sensor/accuweather_weather_publisher/temperature/config",
            "homeassistant/sensor/accuweather_weather_publisher/conditions/config",
            "homeassistant/binary_sensor/accuweather_weather_publisher/is_day_time/config",
        ]);
    }

    #[test]
    fn test_temperature_discovery_payload() {
        let payload = serde_json::to_value(SENSORS[0].discovery("home/accuweather")).unwrap();
        assert_eq!(payload, json!({
            "name": "AccuWeather Temperature",
            "state_topic": "home/accuweather/temperature",
            "unique_id": "accuweather_weather_publisher_temperature",
            "force_update": true,
            "device": {
                "identifiers": ["accuweather_weather_publisher"],
                "name": "AccuWeather Weather",
                "manufacturer": "AccuWeather",
                "model": "MQTT Publisher"
            },
            "unit_of_measurement": "°C",
            "device_class": "temperature"
        }));
    }

    #[test]
    fn test_binary_payloads_come_in_pairs() {
        for sensor in SENSORS {
            let payload = serde_json::to_value(sensor.discovery("home/accuweather")).unwrap();
            let has_on = payload.get("payload_on").is_some();
            let has_off = payload.get("payload_off").is_some();
            assert_eq!(has_on, has_off, "{}", sensor.display_name);
            assert_eq!(has_on, sensor.component == Component::BinarySensor);
        }
    }

    #[test]
    fn test_day_time_discovery_payload() {
        let payload = serde_json::to_value(SENSORS[2].discovery("home/accuweather")).unwrap();
        assert_eq!(payload["payload_on"], Value::from("on"));
        assert_eq!(payload["payload_off"], Value::from("off"));
        assert_eq!(payload["device_class"], Value::from("light"));
        assert!(payload.get("unit_of_measurement").is_none());
    }

    #[test]
    fn test_on_off() {
        assert_eq!(on_off(true), "on");
        assert_eq!(on_off(false), "off");
    }
}
