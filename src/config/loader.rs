//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ProxyConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteKind;

    #[test]
    fn parses_ordered_environments_and_routes() {
        let raw = r#"
            state_file = "custom-state.json"

            [listener]
            http_address = "127.0.0.1:8080"

            [upstream]
            insecure_skip_verify = true

            [[environments]]
            name = "development"
            origin = "https://devapp.example.com"

            [[environments.routes]]
            prefix = "/"
            kind = "spa"
            target = "https://localhost:3000"

            [[environments.routes]]
            prefix = "/api"
            kind = "forward"
            target = "https://devservices.example.com"

            [[environments.routes]]
            prefix = "/api/chatws"
            kind = "websocket"
            target = "https://devservices.example.com/chatws"
        "#;

        let config: ProxyConfig = toml::from_str(raw).unwrap();
        assert!(config.upstream.insecure_skip_verify);
        assert_eq!(config.state_file, "custom-state.json");

        let env = &config.environments[0];
        assert_eq!(env.name, "development");
        let prefixes: Vec<_> = env.routes.iter().map(|r| r.prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["/", "/api", "/api/chatws"]);
        assert_eq!(env.routes[2].kind, RouteKind::Websocket);
        assert!(validate_config(&config).is_ok());
    }
}
