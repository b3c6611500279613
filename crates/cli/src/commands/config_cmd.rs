//! `ragchat config`: configuration management commands.

use ragchat_chat::context::token_limit;
use ragchat_config::AppConfig;

/// Problems that do not stop loading but will fail requests.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.has_api_key() {
        warnings.push("No API key set (set RAGCHAT_API_KEY or OPENAI_API_KEY)".to_string());
    }

    for model in [&config.chat.model, &config.vision.model] {
        if token_limit(model).is_err() {
            warnings.push(format!("No token limit known for model '{model}'"));
        }
    }

    if config.vision.vectorize_endpoint.is_some() && config.vision.vectorize_key.is_none() {
        warnings.push(
            "vision.vectorize_endpoint is set without a key (set RAGCHAT_VISION_KEY)".to_string(),
        );
    }

    if let Some(path) = &config.search.index_path {
        if !path.exists() {
            warnings.push(format!("Search index not found: {}", path.display()));
        }
    } else {
        warnings.push("No search index configured ([search].index_path)".to_string());
    }

    warnings
}

/// `model` or `model (deployment name)`.
fn describe_model(model: &str, deployment: Option<&str>) -> String {
    match deployment {
        Some(deployment) => format!("{model} (deployment {deployment})"),
        None => model.to_string(),
    }
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   Config parsed successfully");

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("   All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   warning: {w}");
        }
    }

    println!();
    println!("   Approach:  {:?}", config.approach);
    println!(
        "   Model:     {}",
        describe_model(&config.chat.model, config.chat.deployment.as_deref())
    );
    println!(
        "   Vision:    {}",
        describe_model(&config.vision.model, config.vision.deployment.as_deref())
    );
    println!("   Endpoint:  {}", config.api_url);
    println!("   Gateway:   {}:{}", config.gateway.host, config.gateway.port);

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.api_key.is_some() {
        config.api_key = Some("[REDACTED]".into());
    }
    if config.vision.vectorize_key.is_some() {
        config.vision.vectorize_key = Some("[REDACTED]".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
