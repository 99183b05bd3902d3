//! `fbot onboard`: first-time setup.

use fbot_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config_path = super::config_path(config_path);

    println!("FBot, first-time setup");
    println!("======================\n");

    if let Some(dir) = config_path.parent().filter(|d| !d.exists()) {
        std::fs::create_dir_all(dir)?;
        println!("  Created config directory: {}", dir.display());
    }

    let docs_dir = AppConfig::config_dir().join("docs");
    if !docs_dir.exists() {
        std::fs::create_dir_all(&docs_dir)?;
        println!("  Created knowledge directory: {}", docs_dir.display());
    }

    if config_path.exists() {
        println!("\n  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("  Created config.toml at: {}", config_path.display());
    println!("\n  Next steps:");
    println!("   1. Edit {} and add your API key", config_path.display());
    println!("   2. Put school documents (.md, .txt) in {}", docs_dir.display());
    println!("      and set knowledge.docs_dir to that path");
    println!("   3. Run: fbot chat\n");

    Ok(())
}
