use std::path::PathBuf;

/// Logging settings read from `ENVIRONMENT`, `LOG_LEVEL` and `LOG_DIR`.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub production: bool,
    pub level: String,
    pub dir: PathBuf,
}

impl LogConfig {
    pub fn from_env() -> Self {
        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        Self::new(
            environment == "production",
            std::env::var("LOG_LEVEL").ok(),
            std::env::var("LOG_DIR").ok(),
        )
    }

    pub fn new(production: bool, level: Option<String>, dir: Option<String>) -> Self {
        let level = level.unwrap_or_else(|| {
            if production {
                "info".to_string()
            } else {
                "debug".to_string()
            }
        });
        Self {
            production,
            level,
            dir: PathBuf::from(dir.unwrap_or_else(|| "logs".to_string())),
        }
    }

    /// Directive used when `RUST_LOG` is not set.
    pub fn default_directive(&self) -> String {
        format!(
            "museum_tour_backend={},tower_http=debug,axum=debug",
            self.level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_defaults_by_environment() {
        assert_eq!(LogConfig::new(true, None, None).level, "info");
        assert_eq!(LogConfig::new(false, None, None).level, "debug");
        assert_eq!(LogConfig::new(true, Some("warn".into()), None).level, "warn");
    }

    #[test]
    fn test_default_directive_targets_crate() {
        let config = LogConfig::new(false, Some("trace".into()), Some("/tmp/x".into()));
        assert_eq!(
            config.default_directive(),
            "museum_tour_backend=trace,tower_http=debug,axum=debug"
        );
        assert_eq!(config.dir, PathBuf::from("/tmp/x"));
    }
}
