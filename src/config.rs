//! Application configuration read from environment variables

use std::path::PathBuf;
use std::str::FromStr;

/// Secret used when `JWT_SECRET` is not set. Refused in production.
pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub refresh_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    pub bcrypt_cost: u32,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub allowed_origins: Vec<String>,
    pub seed_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3001,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            refresh_secret: DEFAULT_JWT_SECRET.to_string(),
            access_token_minutes: 15,
            refresh_token_days: 7,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            upload_dir: PathBuf::from("uploads/pictures"),
            max_upload_bytes: 5 * 1024 * 1024,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            seed_file: None,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Build the configuration from the process environment, falling back to
    /// development defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret);
        // Refresh tokens share the access secret unless told otherwise.
        let refresh_secret =
            std::env::var("REFRESH_TOKEN_SECRET").unwrap_or_else(|_| jwt_secret.clone());

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .or_else(|| std::env::var("FRONTEND_ORIGIN").ok().map(|o| vec![o]))
            .unwrap_or(defaults.allowed_origins);

        Self {
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port),
            jwt_secret,
            refresh_secret,
            access_token_minutes: env_or("ACCESS_TOKEN_MINUTES", defaults.access_token_minutes),
            refresh_token_days: env_or("REFRESH_TOKEN_DAYS", defaults.refresh_token_days),
            bcrypt_cost: env_or("BCRYPT_COST", defaults.bcrypt_cost),
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            allowed_origins,
            seed_file: std::env::var("SEED_FILE").ok().map(PathBuf::from),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Reject settings that must never reach production.
    pub fn validate(&self) -> Result<(), String> {
        if self.is_production()
            && (self.jwt_secret.is_empty() || self.jwt_secret == DEFAULT_JWT_SECRET)
        {
            return Err(
                "JWT_SECRET must be set to a secure, unique value in production".to_string(),
            );
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(format!("BCRYPT_COST must be within 4..=31, got {}", self.bcrypt_cost));
        }
        Ok(())
    }
}
