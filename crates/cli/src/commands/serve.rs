//! `sourcewell serve`: start the HTTP gateway.

use std::path::Path;

use super::load_config;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("sourcewell gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Index:     {} at {}", config.search.index, config.search.endpoint);
    println!("   Vision:    {}", if config.vision.enabled { "enabled" } else { "disabled" });

    sourcewell_gateway::start(config).await?;

    Ok(())
}
