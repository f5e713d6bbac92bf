//! `sourcewell config`: configuration helpers.

use std::path::Path;

use sourcewell_config::AppConfig;

use super::{config_file, load_config};

pub fn print_default() {
    println!("{}", AppConfig::default_toml());
}

pub fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path)?;
    // Keys stay out of terminal scrollback
    for key in [
        &mut config.openai.api_key,
        &mut config.search.api_key,
        &mut config.vision.api_key,
    ] {
        if key.is_some() {
            *key = Some("[REDACTED]".into());
        }
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub fn path(config_path: Option<&Path>) {
    println!("{}", config_file(config_path).display());
}

/// Settings that parse but leave the gateway unable to start or degraded.
fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    if !config.has_api_key() {
        warnings.push("No model API key (set openai.api_key, SOURCEWELL_API_KEY or OPENAI_API_KEY)");
    }
    if config.search.endpoint.is_empty() {
        warnings.push("No search.endpoint: the gateway will refuse to start");
    }
    if config.vision.enabled && config.storage.base_url.is_empty() {
        warnings.push("Vision enabled without storage.base_url: no page images will be sent");
    }
    warnings
}

pub fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating {}", config_file(config_path).display());
    let config = load_config(config_path)?;

    println!("   Config parsed and validated");
    for w in &warnings(&config) {
        println!("   warning: {w}");
    }
    println!();
    println!("   Chat model:   {}", config.openai.chat_model);
    println!("   Vision model: {}", config.openai.vision_model);
    println!("   Index:        {}", config.search.index);
    println!("   Tokenizer:    {}", config.approach.tokenizer);
    println!("   Gateway:      {}:{}", config.gateway.host, config.gateway.port);

    Ok(())
}
