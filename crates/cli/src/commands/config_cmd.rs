//! `fbot config`: inspect the effective configuration.

use std::path::Path;

pub async fn validate(config_path: Option<&Path>) -> anyhow::Result<()> {
    println!("Validating configuration...");

    let config = match super::load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e:#}");
            return Err(e);
        }
    };
    println!("   Config parsed successfully");

    let mut warnings = Vec::new();
    if !config.has_api_key() {
        warnings.push("No API key set (set FBOT_API_KEY or OPENAI_API_KEY)");
    }
    if config.search.api_key.is_none() {
        warnings.push("No search.api_key, web search is disabled (set TAVILY_API_KEY)");
    }
    if config.knowledge.docs_dir.as_ref().is_none_or(|d| !d.is_dir()) {
        warnings.push("knowledge.docs_dir is missing, knowledge questions will be declined");
    }

    if warnings.is_empty() {
        println!("   All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   warning: {w}");
        }
    }

    println!();
    println!("   Provider:  {}", config.default_provider);
    println!("   Model:     {}", config.default_model);
    println!("   Router:    {}", config.router_model());
    println!("   Gateway:   {}:{}", config.gateway.host, config.gateway.port);
    println!("   Storage:   {}", config.storage.database_url);
    println!("   On busy:   {:?}", config.orchestrator.on_busy);

    Ok(())
}

/// Print the effective configuration as TOML. Secrets are redacted.
pub async fn show(config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    let redacted = Some("[REDACTED]".to_string());
    if config.api_key.is_some() {
        config.api_key = redacted.clone();
    }
    if config.search.api_key.is_some() {
        config.search.api_key = redacted.clone();
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = redacted.clone();
        }
    }

    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub async fn path(config_path: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", super::config_path(config_path).display());
    Ok(())
}
