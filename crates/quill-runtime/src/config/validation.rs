//! Configuration validation utilities.

use quill_transport::Verifier;

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    ApplicationConfig, BackendConfig, DispatchConfig, HttpConfig, LoggingConfig, QuillConfig,
    RetryConfig, ServerConfig, StateConfig,
};

const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

/// Validates the entire configuration.
pub fn validate_config(config: &QuillConfig) -> ConfigResult<()> {
    validate_application(&config.application)?;
    validate_server(&config.server)?;
    validate_state(&config.state)?;
    validate_dispatch(&config.dispatch)?;
    validate_http(&config.http)?;
    validate_logging(&config.logging)?;
    Ok(())
}

fn validate_application(app: &ApplicationConfig) -> ConfigResult<()> {
    if app.id.get() == 0 {
        return Err(ConfigError::missing_field("application.id"));
    }
    if app.public_key.trim().is_empty() {
        return Err(ConfigError::missing_field("application.public_key"));
    }
    Verifier::from_hex(&app.public_key)
        .map_err(|e| ConfigError::InvalidPublicKey(e.to_string()))?;
    if app.token.trim().is_empty() {
        return Err(ConfigError::missing_field("application.token"));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> ConfigResult<()> {
    if server.host.is_empty() {
        return Err(ConfigError::missing_field("server.host"));
    }
    if server.port == 0 {
        return Err(ConfigError::InvalidPort(server.port));
    }
    if !server.path.starts_with('/') {
        return Err(ConfigError::validation("server.path must start with '/'"));
    }
    Ok(())
}

fn validate_state(state: &StateConfig) -> ConfigResult<()> {
    if state.component_ttl_secs == 0 {
        return Err(ConfigError::validation(
            "state.component_ttl_secs must be greater than 0",
        ));
    }
    if state.operation_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "state.operation_timeout_ms must be greater than 0",
        ));
    }
    match &state.backend {
        BackendConfig::Memory => {}
        BackendConfig::Sqlite { path } => {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::missing_field("state.backend.path"));
            }
        }
        BackendConfig::Redis { url, .. } => validate_url(url, &["redis://", "rediss://"])?,
    }
    Ok(())
}

fn validate_dispatch(dispatch: &DispatchConfig) -> ConfigResult<()> {
    if dispatch.blocking_workers == 0 {
        return Err(ConfigError::validation(
            "dispatch.blocking_workers must be greater than 0",
        ));
    }
    if dispatch.deletion_queue_size == 0 {
        return Err(ConfigError::validation(
            "dispatch.deletion_queue_size must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_http(http: &HttpConfig) -> ConfigResult<()> {
    validate_url(&http.api_base, &["http://", "https://"])?;
    if http.timeout_ms == 0 {
        return Err(ConfigError::validation("http.timeout_ms must be greater than 0"));
    }
    validate_retry_config(&http.retry)
}

/// Validates retry configuration.
fn validate_retry_config(retry: &RetryConfig) -> ConfigResult<()> {
    if retry.initial_delay_ms == 0 {
        return Err(ConfigError::validation(
            "Initial retry delay must be greater than 0",
        ));
    }

    if retry.max_delay_ms < retry.initial_delay_ms {
        return Err(ConfigError::validation(
            "Max retry delay must be greater than or equal to initial delay",
        ));
    }

    if retry.backoff_multiplier.is_nan() || retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::validation(
            "Backoff multiplier must be at least 1.0",
        ));
    }

    if retry.backoff_multiplier > MAX_BACKOFF_MULTIPLIER {
        return Err(ConfigError::validation(format!(
            "Backoff multiplier must be at most {MAX_BACKOFF_MULTIPLIER}"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if let Some(module) = logging.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid logging filter module: {module:?}"
        )));
    }
    Ok(())
}

fn validate_url(url: &str, schemes: &[&str]) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("url"));
    }
    if !schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {schemes:?}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::Snowflake;

    // Public half of `SigningKey::from_bytes(&[7; 32])`.
    const PUBLIC_KEY: &str = "ea4a6c63e29c520abef5507b132ec5f9954776aebebe7b92421eea691446d22c";

    fn valid() -> QuillConfig {
        let mut config = QuillConfig::default();
        config.application = ApplicationConfig {
            id: Snowflake::new(42),
            public_key: PUBLIC_KEY.into(),
            token: "token".into(),
        };
        config
    }

    #[test]
    fn complete_config_is_valid() {
        validate_config(&valid()).unwrap();
    }

    #[test]
    fn defaults_lack_credentials() {
        let result = validate_config(&QuillConfig::default());
        assert!(matches!(result, Err(ConfigError::MissingField { field }) if field == "application.id"));
    }

    #[test]
    fn rejects_bad_public_keys() {
        let mut config = valid();
        config.application.public_key = "not hex".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn rejects_port_zero_and_zero_timeouts() {
        let mut config = valid();
        config.server.port = 0;
        assert!(matches!(validate_config(&config), Err(ConfigError::InvalidPort(0))));

        let mut config = valid();
        config.http.timeout_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.state.operation_timeout_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_bad_retry_settings() {
        let mut config = valid();
        config.http.retry.max_delay_ms = 10;
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.http.retry.backoff_multiplier = 0.5;
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.http.retry.backoff_multiplier = 1e6;
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.http.retry.backoff_multiplier = f64::INFINITY;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn redis_url_scheme() {
        let mut config = valid();
        config.state.backend = BackendConfig::Redis {
            url: "http://localhost".into(),
            key_prefix: None,
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }
}
