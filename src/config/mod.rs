use std::env;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ServiceKind;

/// Signing secret used when `JWT_SECRET` is not configured in development.
///
/// NOT ACCEPTABLE FOR PRODUCTION: anyone who knows this value can mint tokens for
/// any user. Staging and production refuse to start without `JWT_SECRET`.
pub const DEVELOPMENT_JWT_SECRET: &str = "agendita-development-secret-not-for-production";

/// Longest accepted token lifetime (one year)
pub const MAX_JWT_EXPIRY_HOURS: u64 = 24 * 365;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be configured when running in {0:?} mode")]
    MissingJwtSecret(Environment),

    #[error("DATABASE_URL is required for the postgres storage backend")]
    MissingDatabaseUrl,

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub security: SecurityConfig,
    pub database: DatabaseConfig,
    pub services: ServicesConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    Configured,
    DevelopmentDefault,
}

#[derive(Clone)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub secret_source: SecretSource,
    pub jwt_expiry_hours: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

// The secret must never reach a log line.
impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"<redacted>")
            .field("secret_source", &self.secret_source)
            .field("jwt_expiry_hours", &self.jwt_expiry_hours)
            .field("enable_cors", &self.enable_cors)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub storage: StorageBackend,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone)]
pub struct ServicesConfig {
    pub host: String,
    pub gateway_port: u16,
    pub users_port: u16,
    pub notes_port: u16,
    pub tasks_port: u16,
    pub events_port: u16,
    pub users_url: String,
    pub notes_url: String,
    pub tasks_url: String,
    pub events_url: String,
}

impl ServicesConfig {
    pub fn port(&self, service: ServiceKind) -> u16 {
        match service {
            ServiceKind::Gateway => self.gateway_port,
            ServiceKind::Users => self.users_port,
            ServiceKind::Notes => self.notes_port,
            ServiceKind::Tasks => self.tasks_port,
            ServiceKind::Events => self.events_port,
        }
    }

    /// Base URL the gateway and other services use to reach `service`
    pub fn base_url(&self, service: ServiceKind) -> Option<&str> {
        match service {
            ServiceKind::Gateway => None,
            ServiceKind::Users => Some(&self.users_url),
            ServiceKind::Notes => Some(&self.notes_url),
            ServiceKind::Tasks => Some(&self.tasks_url),
            ServiceKind::Events => Some(&self.events_url),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub request_timeout_secs: u64,
    pub max_request_size_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (environment, map in tests)
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific keys
        let config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        };

        config.with_overrides(&lookup)
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }

    fn with_overrides<F>(mut self, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Security
        match lookup("JWT_SECRET").filter(|s| !s.trim().is_empty()) {
            Some(secret) => {
                self.security.jwt_secret = secret;
                self.security.secret_source = SecretSource::Configured;
            }
            None if self.environment != Environment::Development => {
                return Err(ConfigError::MissingJwtSecret(self.environment));
            }
            None => {}
        }
        if let Some(v) = lookup("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v
                .trim()
                .parse()
                .ok()
                .filter(|hours| (1..=MAX_JWT_EXPIRY_HOURS).contains(hours))
                .ok_or(ConfigError::InvalidValue {
                    key: "JWT_EXPIRY_HOURS",
                    value: v.clone(),
                })?;
        }
        if let Some(v) = lookup("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Database
        if let Some(url) = lookup("DATABASE_URL").filter(|s| !s.is_empty()) {
            self.database.url = Some(url);
            self.database.storage = StorageBackend::Postgres;
        }
        if let Some(v) = lookup("STORAGE_BACKEND") {
            self.database.storage = match v.as_str() {
                "memory" => StorageBackend::Memory,
                "postgres" => StorageBackend::Postgres,
                _ => return Err(ConfigError::InvalidValue { key: "STORAGE_BACKEND", value: v }),
            };
        }
        if self.database.storage == StorageBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Some(v) = lookup("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }

        // Services
        if let Some(v) = lookup("BIND_HOST") {
            self.services.host = v;
        }
        let ports = [
            ("GATEWAY_PORT", &mut self.services.gateway_port),
            ("USERS_PORT", &mut self.services.users_port),
            ("NOTES_PORT", &mut self.services.notes_port),
            ("TASKS_PORT", &mut self.services.tasks_port),
            ("EVENTS_PORT", &mut self.services.events_port),
        ];
        for (key, slot) in ports {
            if let Some(v) = lookup(key) {
                *slot = v
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue { key, value: v.clone() })?;
            }
        }
        let urls = [
            ("USERS_SERVICE_URL", &mut self.services.users_url),
            ("NOTES_SERVICE_URL", &mut self.services.notes_url),
            ("TASKS_SERVICE_URL", &mut self.services.tasks_url),
            ("EVENTS_SERVICE_URL", &mut self.services.events_url),
        ];
        for (key, slot) in urls {
            if let Some(v) = lookup(key) {
                url::Url::parse(&v).map_err(|_| ConfigError::InvalidValue { key, value: v.clone() })?;
                *slot = v.trim_end_matches('/').to_string();
            }
        }

        // Gateway
        if let Some(v) = lookup("GATEWAY_REQUEST_TIMEOUT_SECS") {
            self.gateway.request_timeout_secs = v.parse().unwrap_or(self.gateway.request_timeout_secs);
        }
        if let Some(v) = lookup("GATEWAY_MAX_REQUEST_SIZE_BYTES") {
            self.gateway.max_request_size_bytes = v.parse().unwrap_or(self.gateway.max_request_size_bytes);
        }

        Ok(self)
    }

    fn local_services() -> ServicesConfig {
        ServicesConfig {
            host: "0.0.0.0".to_string(),
            gateway_port: 8000,
            users_port: 8080,
            notes_port: 9090,
            tasks_port: 8071,
            events_port: 9091,
            users_url: "http://localhost:8080".to_string(),
            notes_url: "http://localhost:9090".to_string(),
            tasks_url: "http://localhost:8071".to_string(),
            events_url: "http://localhost:9091".to_string(),
        }
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            security: SecurityConfig {
                jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
                secret_source: SecretSource::DevelopmentDefault,
                jwt_expiry_hours: 24 * 7, // 1 week
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            database: DatabaseConfig {
                url: None,
                storage: StorageBackend::Memory,
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
            },
            services: Self::local_services(),
            gateway: GatewayConfig {
                request_timeout_secs: 30,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            security: SecurityConfig {
                jwt_secret: String::new(),
                secret_source: SecretSource::Configured,
                jwt_expiry_hours: 24,
                enable_cors: true,
                cors_origins: vec!["https://staging.agendita.app".to_string()],
            },
            database: DatabaseConfig {
                url: None,
                storage: StorageBackend::Memory,
                max_connections: 20,
                connection_timeout: 10,
                run_migrations: true,
            },
            services: Self::local_services(),
            gateway: GatewayConfig {
                request_timeout_secs: 15,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            security: SecurityConfig {
                jwt_secret: String::new(),
                secret_source: SecretSource::Configured,
                jwt_expiry_hours: 4,
                enable_cors: true,
                cors_origins: vec!["https://app.agendita.app".to_string()],
            },
            database: DatabaseConfig {
                url: None,
                storage: StorageBackend::Memory,
                max_connections: 50,
                connection_timeout: 5,
                run_migrations: false,
            },
            services: Self::local_services(),
            gateway: GatewayConfig {
                request_timeout_secs: 10,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_source(|key| map.get(key).cloned())
    }

    #[test]
    fn development_falls_back_to_default_secret() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.security.jwt_secret, DEVELOPMENT_JWT_SECRET);
        assert_eq!(config.security.secret_source, SecretSource::DevelopmentDefault);
        assert_eq!(config.database.storage, StorageBackend::Memory);
    }

    #[test]
    fn production_requires_secret() {
        let err = config_from(&[("APP_ENV", "production")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingJwtSecret(Environment::Production)));

        let err = config_from(&[("APP_ENV", "staging"), ("JWT_SECRET", "   ")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingJwtSecret(Environment::Staging)));

        let config = config_from(&[("APP_ENV", "prod"), ("JWT_SECRET", "s3cr3t")]).unwrap();
        assert_eq!(config.security.secret_source, SecretSource::Configured);
        assert_eq!(config.security.jwt_expiry_hours, 4);
    }

    #[test]
    fn token_lifetime_is_bounded() {
        let config = config_from(&[("JWT_EXPIRY_HOURS", "48")]).unwrap();
        assert_eq!(config.security.jwt_expiry_hours, 48);

        for bad in ["0", "-1", "forever", "9223372036854775807"] {
            let err = config_from(&[("JWT_EXPIRY_HOURS", bad)]).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { key: "JWT_EXPIRY_HOURS", .. }));
        }
    }

    #[test]
    fn database_url_selects_postgres() {
        let config = config_from(&[("DATABASE_URL", "postgres://u:p@localhost:5432/postgres")]).unwrap();
        assert_eq!(config.database.storage, StorageBackend::Postgres);

        let err = config_from(&[("STORAGE_BACKEND", "postgres")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDatabaseUrl));

        let err = config_from(&[("STORAGE_BACKEND", "sqlite")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "STORAGE_BACKEND", .. }));
    }

    #[test]
    fn service_overrides_apply() {
        let config = config_from(&[
            ("NOTES_PORT", "7000"),
            ("NOTES_SERVICE_URL", "http://notes.internal:7000/"),
            ("SECURITY_CORS_ORIGINS", "https://a.example, https://b.example,"),
        ])
        .unwrap();
        assert_eq!(config.services.port(ServiceKind::Notes), 7000);
        assert_eq!(config.services.base_url(ServiceKind::Notes), Some("http://notes.internal:7000"));
        assert_eq!(config.security.cors_origins, vec!["https://a.example", "https://b.example"]);

        assert!(config_from(&[("USERS_PORT", "not-a-port")]).is_err());
        assert!(config_from(&[("TASKS_SERVICE_URL", "::nope")]).is_err());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = config_from(&[("JWT_SECRET", "super-secret-value")]).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("<redacted>"));
    }
}
