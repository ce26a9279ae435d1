use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use snafu::prelude::*;

pub const DEFAULT_CITY_NAME: &str = "Tarnów";
pub const DEFAULT_LANGUAGE: &str = "pl-pl";
pub const DEFAULT_BASE_URL: &str = "http://dataservice.accuweather.com";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_MQTT_CLIENT_ID: &str = "accuweather_publisher";
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";
pub const DEFAULT_STATE_PREFIX: &str = "home/accuweather";
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("Cannot open config file {}: {source}", path.display()))]
    ReadFile { path: PathBuf, source: std::io::Error },

    #[snafu(display("Error when parsing config file {}: {source}", path.display()))]
    ParseFile { path: PathBuf, source: serde_yaml::Error },

    #[snafu(display("{key} is not set"))]
    Missing { key: &'static str },

    #[snafu(display("REFRESH_INTERVAL_SECONDS must be greater than zero"))]
    InvalidInterval,

    #[snafu(display("ACCUWEATHER_TIMEOUT_SECONDS must be greater than zero"))]
    InvalidTimeout,
}

/// Command line flags. Every flag can also be given through its environment variable.
#[derive(Parser, Debug, Default)]
#[command(version, about = "Publishes AccuWeather current conditions to MQTT")]
pub struct Args {
    /// Optional YAML file with the same settings; flags and environment win over it
    #[arg(long, env = "ACCUWEATHER2MQTT_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "ACCUWEATHER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "ACCUWEATHER_CITY_NAME")]
    pub city_name: Option<String>,

    /// Skips the city lookup when set
    #[arg(long, env = "ACCUWEATHER_LOCATION_KEY")]
    pub location_key: Option<String>,

    #[arg(long, env = "ACCUWEATHER_LANGUAGE")]
    pub language: Option<String>,

    #[arg(long, env = "ACCUWEATHER_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, env = "ACCUWEATHER_TIMEOUT_SECONDS")]
    pub http_timeout: Option<u64>,

    #[arg(long, env = "MQTT_BROKER_ADDRESS")]
    pub mqtt_address: Option<String>,

    #[arg(long, env = "MQTT_BROKER_PORT")]
    pub mqtt_port: Option<u16>,

    #[arg(long, env = "MQTT_USERNAME")]
    pub mqtt_username: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub mqtt_password: Option<String>,

    #[arg(long, env = "MQTT_CLIENT_ID")]
    pub mqtt_client_id: Option<String>,

    #[arg(long, env = "HASS_DISCOVERY_PREFIX")]
    pub discovery_prefix: Option<String>,

    #[arg(long, env = "MQTT_STATE_PREFIX")]
    pub state_prefix: Option<String>,

    /// Seconds between two fetches of current conditions
    #[arg(long, env = "REFRESH_INTERVAL_SECONDS")]
    pub refresh_interval: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub accuweather: AccuWeatherFileConfig,
    pub mqtt: MqttFileConfig,
    pub refresh_interval: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AccuWeatherFileConfig {
    pub api_key: Option<String>,
    pub city_name: Option<String>,
    pub location_key: Option<String>,
    pub language: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
pub struct MqttFileConfig {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub discovery_prefix: Option<String>,
    pub state_prefix: Option<String>,
}

impl FileConfig {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)
            .context(ReadFileSnafu { path })?;
        serde_yaml::from_reader(BufReader::new(file))
            .context(ParseFileSnafu { path })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub accuweather: AccuWeatherConfig,
    pub mqtt: MqttConfig,
    pub refresh_interval: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccuWeatherConfig {
    pub api_key: String,
    pub city_name: String,
    pub location_key: Option<String>,
    pub language: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MqttConfig {
    pub address: String,
    pub port: u16,
    pub auth: MqttAuth,
    pub client_id: String,
    pub discovery_prefix: String,
    pub state_prefix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MqttAuth {
    pub user: String,
    pub password: String,
}

impl MqttConfig {
    pub fn server_uri(&self) -> String {
        format!("tcp://{}:{}", self.address, self.port)
    }
}

impl Config {
    pub fn load(args: Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        Self::from_layers(args, file)
    }

    /// Merges flags/environment over the file, then over built-in defaults
    pub fn from_layers(args: Args, file: FileConfig) -> Result<Self, ConfigError> {
        let FileConfig { accuweather: aw, mqtt, refresh_interval } = file;

        let refresh_interval = args.refresh_interval
            .or(refresh_interval)
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS);
        ensure!(refresh_interval > 0, InvalidIntervalSnafu);
        let http_timeout = args.http_timeout
            .or(aw.timeout)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        ensure!(http_timeout > 0, InvalidTimeoutSnafu);

        Ok(Config {
            accuweather: AccuWeatherConfig {
                api_key: required(args.api_key, aw.api_key, "ACCUWEATHER_API_KEY")?,
                city_name: layered(args.city_name, aw.city_name)
                    .unwrap_or_else(|| DEFAULT_CITY_NAME.to_string()),
                location_key: layered(args.location_key, aw.location_key),
                language: layered(args.language, aw.language)
                    .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
                base_url: layered(args.base_url, aw.base_url)
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                timeout: Duration::from_secs(http_timeout),
            },
            mqtt: MqttConfig {
                address: required(args.mqtt_address, mqtt.address, "MQTT_BROKER_ADDRESS")?,
                port: args.mqtt_port.or(mqtt.port).unwrap_or(DEFAULT_MQTT_PORT),
                auth: MqttAuth {
                    user: required(args.mqtt_username, mqtt.username, "MQTT_USERNAME")?,
                    password: required(args.mqtt_password, mqtt.password, "MQTT_PASSWORD")?,
                },
                client_id: layered(args.mqtt_client_id, mqtt.client_id)
                    .unwrap_or_else(|| DEFAULT_MQTT_CLIENT_ID.to_string()),
                discovery_prefix: layered(args.discovery_prefix, mqtt.discovery_prefix)
                    .unwrap_or_else(|| DEFAULT_DISCOVERY_PREFIX.to_string()),
                state_prefix: layered(args.state_prefix, mqtt.state_prefix)
                    .unwrap_or_else(|| DEFAULT_STATE_PREFIX.to_string()),
            },
            refresh_interval: Duration::from_secs(refresh_interval),
        })
    }
}

// Empty strings count as unset, so `ACCUWEATHER_LOCATION_KEY=` falls through.
fn layered(top: Option<String>, bottom: Option<String>) -> Option<String> {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    non_empty(top).or_else(|| non_empty(bottom))
}

fn required(
    top: Option<String>,
    bottom: Option<String>,
    key: &'static str,
) -> Result<String, ConfigError> {
    layered(top, bottom).context(MissingSnafu { key })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::CommandFactory;

    use super::{Args, Config, ConfigError, FileConfig};

    fn full_args() -> Args {
        Args {
            api_key: Some("secret".to_string()),
            mqtt_address: Some("broker.local".to_string()),
            mqtt_username: Some("hass".to_string()),
            mqtt_password: Some("pass".to_string()),
            ..Args::default()
        }
    }

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_layers(full_args(), FileConfig::default()).unwrap();
        assert_eq!(config.accuweather.api_key, "secret");
        assert_eq!(config.accuweather.city_name, "Tarnów");
        assert_eq!(config.accuweather.location_key, None);
        assert_eq!(config.accuweather.language, "pl-pl");
        assert_eq!(config.accuweather.base_url, "http://dataservice.accuweather.com");
        assert_eq!(config.accuweather.timeout, Duration::from_secs(10));
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.server_uri(), "tcp://broker.local:1883");
        assert_eq!(config.mqtt.client_id, "accuweather_publisher");
        assert_eq!(config.mqtt.discovery_prefix, "homeassistant");
        assert_eq!(config.mqtt.state_prefix, "home/accuweather");
        assert_eq!(config.refresh_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_missing_api_key() {
        let args = Args { api_key: None, ..full_args() };
        match Config::from_layers(args, FileConfig::default()) {
            Err(ConfigError::Missing { key }) => assert_eq!(key, "ACCUWEATHER_API_KEY"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_empty_password_is_missing() {
        let args = Args { mqtt_password: Some(String::new()), ..full_args() };
        match Config::from_layers(args, FileConfig::default()) {
            Err(ConfigError::Missing { key }) => assert_eq!(key, "MQTT_PASSWORD"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_empty_location_key_is_unset() {
        let args = Args { location_key: Some("".to_string()), ..full_args() };
        let config = Config::from_layers(args, FileConfig::default()).unwrap();
        assert_eq!(config.accuweather.location_key, None);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let args = Args { refresh_interval: Some(0), ..full_args() };
        assert!(matches!(
            Config::from_layers(args, FileConfig::default()),
            Err(ConfigError::InvalidInterval)
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let args = Args { http_timeout: Some(0), ..full_args() };
        assert!(matches!(
            Config::from_layers(args, FileConfig::default()),
            Err(ConfigError::InvalidTimeout)
        ));
        let file: FileConfig = serde_yaml::from_str("accuweather:\n  timeout: 0\n").unwrap();
        assert!(matches!(
            Config::from_layers(full_args(), file),
            Err(ConfigError::InvalidTimeout)
        ));
    }

    #[test]
    fn test_args_override_file() {
        let file: FileConfig = serde_yaml::from_str(
            r#"
accuweather:
  api_key: from-file
  city_name: Kraków
  location_key: "274455"
mqtt:
  address: file-broker
  port: 8883
  username: file-user
  password: file-pass
refresh_interval: 60
"#,
        ).unwrap();
        let args = Args {
            api_key: None,
            city_name: Some("Tarnów".to_string()),
            mqtt_port: Some(1884),
            ..full_args()
        };
        let config = Config::from_layers(args, file).unwrap();
        assert_eq!(config.accuweather.api_key, "from-file");
        assert_eq!(config.accuweather.city_name, "Tarnów");
        assert_eq!(config.accuweather.location_key.as_deref(), Some("274455"));
        assert_eq!(config.mqtt.address, "broker.local");
        assert_eq!(config.mqtt.port, 1884);
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_file_rejects_unknown_keys() {
        assert!(serde_yaml::from_str::<FileConfig>("mqtt:\n  adress: typo\n").is_err());
    }
}
