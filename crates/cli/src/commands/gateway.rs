//! `ragchat gateway`: start the HTTP server.

use ragchat_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("ragchat gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Approach:  {:?}", config.approach);
    println!("   Routes:    POST /chat, POST /chat/stream, GET /health");

    ragchat_gateway::start(config).await?;

    Ok(())
}
