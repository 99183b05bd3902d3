//! `fbot serve`: start the HTTP gateway.

use std::path::Path;

pub async fn run(config_path: Option<&Path>, port_override: Option<u16>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("FBot Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {} ({})", config.default_provider, config.default_model);
    println!("   Storage:   {}", config.storage.database_url);

    fbot_gateway::start(config).await.map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}
