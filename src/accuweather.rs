use reqwest::blocking::Client as HttpClient;
use reqwest::StatusCode;
use serde::Deserialize;
use snafu::prelude::*;

use crate::config::AccuWeatherConfig;

#[derive(Debug, Snafu)]
pub enum AccuWeatherError {
    // The url carries the api key, so `source` must not hold it.
    #[snafu(display("Request to {endpoint} failed: {source}"))]
    Request { endpoint: &'static str, source: reqwest::Error },

    #[snafu(display("{endpoint} responded with status {status}"))]
    Status { endpoint: &'static str, status: StatusCode },

    #[snafu(display("Malformed {endpoint} response: {source}"))]
    Malformed { endpoint: &'static str, source: serde_json::Error },

    #[snafu(display("No location found for '{city}'"))]
    NoMatch { city: String },

    #[snafu(display("No current conditions for location {location_key}"))]
    EmptyConditions { location_key: String },
}

const CITY_SEARCH: &str = "city search";
const CURRENT_CONDITIONS: &str = "current conditions";

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub city_name: String,
    pub location_key: String,
}

/// One snapshot of the weather, read as a whole or not at all
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub temperature_celsius: f64,
    pub condition_text: String,
    pub is_daytime: bool,
}

pub trait WeatherProvider {
    fn search_city(&self, city_name: &str) -> Result<String, AccuWeatherError>;
    fn current_conditions(&self, location_key: &str) -> Result<CurrentConditions, AccuWeatherError>;
}

#[derive(Deserialize)]
struct CitySearchRecord {
    #[serde(rename = "Key")]
    key: String,
}

#[derive(Deserialize)]
struct ConditionsRecord {
    #[serde(rename = "Temperature")]
    temperature: Temperature,
    #[serde(rename = "WeatherText")]
    weather_text: String,
    #[serde(rename = "IsDayTime")]
    is_day_time: bool,
}

#[derive(Deserialize)]
struct Temperature {
    #[serde(rename = "Metric")]
    metric: Measurement,
}

#[derive(Deserialize)]
struct Measurement {
    #[serde(rename = "Value")]
    value: f64,
}

/// Takes the first, highest ranked match of a city search
pub fn parse_location_key(city_name: &str, body: &str) -> Result<String, AccuWeatherError> {
    let records: Vec<CitySearchRecord> = serde_json::from_str(body)
        .context(MalformedSnafu { endpoint: CITY_SEARCH })?;
    records.into_iter()
        .next()
        .map(|r| r.key)
        .context(NoMatchSnafu { city: city_name })
}

pub fn parse_current_conditions(
    location_key: &str,
    body: &str,
) -> Result<CurrentConditions, AccuWeatherError> {
    let records: Vec<ConditionsRecord> = serde_json::from_str(body)
        .context(MalformedSnafu { endpoint: CURRENT_CONDITIONS })?;
    let record = records.into_iter()
        .next()
        .context(EmptyConditionsSnafu { location_key })?;
    Ok(CurrentConditions {
        temperature_celsius: record.temperature.metric.value,
        condition_text: record.weather_text,
        is_daytime: record.is_day_time,
    })
}

pub struct AccuWeatherClient {
    http: HttpClient,
    api_key: String,
    language: String,
    base_url: String,
}

impl AccuWeatherClient {
    pub fn new(cfg: &AccuWeatherConfig) -> Result<Self, reqwest::Error> {
        let http = HttpClient::builder()
            .timeout(cfg.timeout)
            .build()?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            language: cfg.language.clone(),
            base_url: cfg.base_url.clone(),
        })
    }

    fn get(
        &self,
        endpoint: &'static str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<String, AccuWeatherError> {
        log::debug!("Requesting {endpoint}: {url}");
        let resp = self.http.get(url)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("language", self.language.as_str()),
                ("details", "false"),
            ])
            .query(query)
            .send()
            .map_err(reqwest::Error::without_url)
            .context(RequestSnafu { endpoint })?;
        let status = resp.status();
        ensure!(status.is_success(), StatusSnafu { endpoint, status });
        let body = resp.text()
            .map_err(reqwest::Error::without_url)
            .context(RequestSnafu { endpoint })?;
        log::trace!("Received {endpoint} response: {body}");
        Ok(body)
    }
}

impl WeatherProvider for AccuWeatherClient {
    fn search_city(&self, city_name: &str) -> Result<String, AccuWeatherError> {
        let url = format!("{}/locations/v1/cities/search", self.base_url);
        let body = self.get(CITY_SEARCH, &url, &[("q", city_name)])?;
        parse_location_key(city_name, &body)
    }

    fn current_conditions(&self, location_key: &str) -> Result<CurrentConditions, AccuWeatherError> {
        let url = format!("{}/currentconditions/v1/{location_key}", self.base_url);
        let body = self.get(CURRENT_CONDITIONS, &url, &[])?;
        parse_current_conditions(location_key, &body)
    }
}

/// Uses the configured location key as-is, otherwise looks the city up once
pub fn resolve_location<W: WeatherProvider>(
    provider: &W,
    cfg: &AccuWeatherConfig,
) -> Result<Location, AccuWeatherError> {
    let location_key = match &cfg.location_key {
        Some(key) => {
            log::info!("Using configured location key {key}");
            key.clone()
        }
        None => {
            log::info!("Searching location key for '{}'", cfg.city_name);
            let key = provider.search_city(&cfg.city_name)?;
            log::info!("Found location key for '{}': {key}", cfg.city_name);
            key
        }
    };
    Ok(Location {
        city_name: cfg.city_name.clone(),
        location_key,
    })
}
