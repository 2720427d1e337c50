use std::sync::Arc;

use anyhow::{Context, Result};
use cityweather::{WeatherAppConfig, WeatherService, logging, web};

#[tokio::main]
async fn main() -> Result<()> {
    let config = WeatherAppConfig::load()?;
    logging::init(&config.logging)?;

    let service = WeatherService::from_config(&config)?;

    let city = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if city.is_empty() {
        return web::run(Arc::new(service), &config.server).await;
    }

    match service.get_weather(&city).await {
        Ok(result) => {
            let json = serde_json::to_string_pretty(&result)
                .with_context(|| "Failed to serialize forecast")?;
            println!("{json}");
            Ok(())
        }
        Err(e) => {
            let message = e.user_message();
            tracing::error!("{}", e);
            eprintln!("{}: {}", message.heading, message.message);
            std::process::exit(1);
        }
    }
}
