use std::process;
use std::sync::Arc;

use clap::Parser;
use snafu::{ResultExt, Whatever};

mod accuweather;
use accuweather::{resolve_location, AccuWeatherClient};
mod config;
use crate::config::{Args, Config};
mod hass;
mod mqtt;
use crate::mqtt::{LoggingObserver, MqttPublisher};
mod poller;
use poller::{Poller, SystemClock};

fn main() -> Result<(), Whatever> {
    env_logger::init();

    let args = Args::parse();
    let config = Config::load(args)
        .with_whatever_context(|e| format!("Invalid configuration: {e}"))?;

    let weather = AccuWeatherClient::new(&config.accuweather)
        .with_whatever_context(|e| format!("Error creating http client: {e}"))?;
    let location = resolve_location(&weather, &config.accuweather)
        .with_whatever_context(|e| {
            format!("Cannot continue without a location key, check the city name or API key: {e}")
        })?;

    let publisher = MqttPublisher::connect(&config.mqtt, Arc::new(LoggingObserver))
        .with_whatever_context(|e| format!("Unable to connect to mqtt server: {e}"))?;

    ctrlc::set_handler({
        let publisher = publisher.clone();
        move || {
            log::info!("Interrupted, shutting down");
            publisher.disconnect();
            process::exit(0);
        }
    })
    .with_whatever_context(|e| format!("Cannot install interrupt handler: {e}"))?;

    let poller = Poller::new(
        weather,
        publisher.clone(),
        location,
        &config.mqtt,
        config.refresh_interval,
    );
    let res = poller.run(&mut SystemClock);
    publisher.disconnect();
    res
}
