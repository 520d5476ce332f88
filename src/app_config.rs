// Centralized configuration management for reviewflow-backend
// Load ALL env vars ONCE at startup

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Global application configuration loaded once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    // For tests, load .env file first
    #[cfg(test)]
    dotenv::dotenv().ok();

    AppConfig::from_env().expect("Failed to load configuration")
});

/// Accessor used throughout the crate
pub fn config() -> &'static AppConfig {
    &CONFIG
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    // Server
    pub bind_address: String,
    pub port: u16,
    pub environment: Environment,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_min_connections: u32,
    pub database_connect_timeout: u64,
    pub database_idle_timeout: u64,
    pub database_max_lifetime: u64,

    // Redis
    pub redis_url: String,
    pub redis_connection_timeout: u64,

    // JWT
    pub jwt_secret: String,
    pub jwt_expiry_seconds: u64,
    pub jwt_issuer: String,

    // Security
    pub bcrypt_cost: u32,
    pub cors_allowed_origins: Vec<String>,

    // Stripe
    pub stripe: StripeConfig,

    // Twilio (SMS channel)
    pub twilio: TwilioConfig,

    // Email channel
    pub email: EmailConfig,

    // URL shortener collaborator
    pub shortener_api_url: String,
    pub shortener_timeout_seconds: u64,

    // Campaign dispatch sweep
    pub sweep_interval_seconds: u64,

    // Frontend
    pub frontend_url: String,

    pub disable_embedded_migrations: bool,
}

/// Environment type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" => Environment::Test,
            "staging" | "stage" => Environment::Staging,
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Stripe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_url: String,
    pub timeout_seconds: u64,
}

/// Twilio configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub api_url: String,
    pub timeout_seconds: u64,
}

/// Email configuration (Resend)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub resend_api_key: String,
    pub resend_api_url: String,
    pub from_email: String,
    pub from_name: String,
    pub timeout_seconds: u64,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let get_required = |key: &str| -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
        };

        let get_or_default = |key: &str, default: &str| -> String {
            env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let parse_or_default = |key: &str, default: &str| -> Result<u32, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u32".to_string())
            })
        };

        let parse_u64_or_default = |key: &str, default: &str| -> Result<u64, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u64".to_string())
            })
        };

        let parse_bool_or_default = |key: &str, default: &str| -> bool {
            get_or_default(key, default).to_lowercase() == "true"
        };

        let bind_address = get_or_default("BIND_ADDRESS", "0.0.0.0:8080");
        let port = bind_address
            .rsplit(':')
            .next()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let jwt_secret = get_required("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                "Secret must be at least 32 characters long".to_string(),
            ));
        }

        let cors_allowed_origins = get_or_default("CORS_ALLOWED_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(AppConfig {
            bind_address,
            port,
            environment: Environment::from(get_or_default("ENVIRONMENT", "development")),

            database_url: get_required("DATABASE_URL")?,
            database_max_connections: parse_or_default("DATABASE_MAX_CONNECTIONS", "10")?,
            database_min_connections: parse_or_default("DATABASE_MIN_CONNECTIONS", "1")?,
            database_connect_timeout: parse_u64_or_default("DATABASE_CONNECT_TIMEOUT", "10")?,
            database_idle_timeout: parse_u64_or_default("DATABASE_IDLE_TIMEOUT", "600")?,
            database_max_lifetime: parse_u64_or_default("DATABASE_MAX_LIFETIME", "1800")?,

            redis_url: get_or_default("REDIS_URL", "redis://127.0.0.1:6379"),
            redis_connection_timeout: parse_u64_or_default("REDIS_CONNECTION_TIMEOUT", "5")?,

            jwt_secret,
            jwt_expiry_seconds: parse_u64_or_default("JWT_EXPIRY_SECONDS", "3600")?,
            jwt_issuer: get_or_default("JWT_ISSUER", "reviewflow"),

            bcrypt_cost: parse_or_default("BCRYPT_COST", "12")?,
            cors_allowed_origins,

            stripe: StripeConfig {
                secret_key: get_required("STRIPE_SECRET_KEY")?,
                webhook_secret: get_required("STRIPE_WEBHOOK_SECRET")?,
                api_url: get_or_default("STRIPE_API_URL", "https://api.stripe.com"),
                timeout_seconds: parse_u64_or_default("STRIPE_TIMEOUT_SECONDS", "10")?,
            },

            twilio: TwilioConfig {
                account_sid: get_required("TWILIO_ACCOUNT_SID")?,
                auth_token: get_required("TWILIO_AUTH_TOKEN")?,
                from_number: get_required("TWILIO_FROM_NUMBER")?,
                api_url: get_or_default("TWILIO_API_URL", "https://api.twilio.com"),
                timeout_seconds: parse_u64_or_default("TWILIO_TIMEOUT_SECONDS", "10")?,
            },

            email: EmailConfig {
                resend_api_key: get_required("RESEND_API_KEY")?,
                resend_api_url: get_or_default(
                    "RESEND_API_URL",
                    "https://api.resend.com/emails",
                ),
                from_email: get_or_default("EMAIL_FROM", "outreach@reviewflow.dev"),
                from_name: get_or_default("EMAIL_FROM_NAME", "Reviewflow"),
                timeout_seconds: parse_u64_or_default("EMAIL_TIMEOUT_SECONDS", "10")?,
            },

            shortener_api_url: get_or_default("SHORTENER_API_URL", ""),
            shortener_timeout_seconds: parse_u64_or_default("SHORTENER_TIMEOUT_SECONDS", "5")?,

            sweep_interval_seconds: parse_u64_or_default("SWEEP_INTERVAL_SECONDS", "60")?,

            frontend_url: get_or_default("FRONTEND_URL", "http://localhost:3000"),

            disable_embedded_migrations: parse_bool_or_default(
                "DISABLE_EMBEDDED_MIGRATIONS",
                "false",
            ),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}
