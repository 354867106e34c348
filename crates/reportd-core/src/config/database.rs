use serde::{Deserialize, Serialize};

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL for the primary store.
    pub url: String,

    /// Connection pool size.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Pool checkout timeout in seconds.
    #[serde(default = "default_pool_timeout")]
    pub pool_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            pool_size: default_pool_size(),
            pool_timeout_secs: default_pool_timeout(),
        }
    }
}

fn default_pool_size() -> u32 {
    10
}

fn default_pool_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_database_config() {
        let config = DatabaseConfig::default();
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.pool_timeout_secs, 30);
    }

    #[test]
    fn test_parse_database_config() {
        let toml = r#"
            url = "postgres://localhost/reports"
            pool_size = 40
        "#;

        let config: DatabaseConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.url, "postgres://localhost/reports");
        assert_eq!(config.pool_size, 40);
        assert_eq!(config.pool_timeout_secs, 30);
    }
}
