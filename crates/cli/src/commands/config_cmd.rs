//! `glossa config` — Configuration management commands.

use glossa_config::AppConfig;

const REDACTED: &str = "[REDACTED]";

/// Copy of `config` that is safe to print.
fn redacted(config: &AppConfig) -> AppConfig {
    let mut config = config.clone();
    if config.api_key.is_some() {
        config.api_key = Some(REDACTED.into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some(REDACTED.into());
        }
    }
    config
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() {
                warnings.push("No API key set (set DEEPSEEK_API_KEY or GLOSSA_API_KEY)");
            }
            if config.translation.max_rejections == Some(0) {
                warnings.push("max_rejections = 0 behaves like 1 (gives up on the first rejection)");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:   {}", config.default_provider);
            println!("   Reasoning:  {}", config.models.reasoning);
            println!("   Tool model: {}", config.models.tool);
            println!("   Target:     {}", config.translation.target_language);
            println!("   Max turns:  {}", config.agent.max_turns);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&redacted(&config))?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glossa_config::ProviderConfig;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_path();
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn show_never_prints_keys() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-secret".into());
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-other".into()),
                api_url: None,
            },
        );

        let printed = toml::to_string_pretty(&redacted(&config)).unwrap();
        assert!(!printed.contains("sk-secret"));
        assert!(!printed.contains("sk-other"));
        assert!(printed.contains(REDACTED));
    }
}
