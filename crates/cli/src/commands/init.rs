//! `ragchat init`: first-time setup.

use ragchat_config::AppConfig;
use std::path::Path;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    }

    if write_default_config(&config_path)? {
        println!("Created config.toml at: {}", config_path.display());
        println!("\nNext steps:");
        println!("   1. Set api_key (or export OPENAI_API_KEY)");
        println!("   2. Point [search].index_path at a JSON document file");
        println!("   3. Run: ragchat ask \"What does the handbook say about PTO?\"\n");
    } else {
        println!("Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run init.");
    }

    Ok(())
}

/// Write the default config unless a file already exists. Returns whether
/// a file was written.
fn write_default_config(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}
