//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every environment can always resolve a route
//! - Detect inconsistent listener/TLS settings
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ProxyConfig -> Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a config.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no environments defined")]
    NoEnvironments,

    #[error("duplicate environment name: {0}")]
    DuplicateEnvironment(String),

    #[error("environment {0} has no \"/\" route to fall back to")]
    MissingRootRoute(String),

    #[error("environment {env} has a route with an empty prefix")]
    EmptyPrefix { env: String },

    #[error("https_address is set but no [listener.tls] section is configured")]
    HttpsWithoutTls,
}

/// Validate a parsed configuration, collecting every problem.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.environments.is_empty() {
        errors.push(ValidationError::NoEnvironments);
    }

    let mut seen = HashSet::new();
    for env in &config.environments {
        if !seen.insert(env.name.as_str()) {
            errors.push(ValidationError::DuplicateEnvironment(env.name.clone()));
        }
        if !env.routes.iter().any(|r| r.prefix == "/") {
            errors.push(ValidationError::MissingRootRoute(env.name.clone()));
        }
        if env.routes.iter().any(|r| r.prefix.is_empty()) {
            errors.push(ValidationError::EmptyPrefix {
                env: env.name.clone(),
            });
        }
    }

    if config.listener.https_address.is_some() && config.listener.tls.is_none() {
        errors.push(ValidationError::HttpsWithoutTls);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
