use std::env;

/// Load .env file if it exists (called automatically when using `from_env`)
pub fn load_dotenv() {
    // Silently ignore errors (file might not exist)
    let _ = dotenvy::dotenv();
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord bot token
    pub discord_token: String,
    /// Fallback guild for role syncs triggered outside a guild (DM tips)
    pub home_guild_id: Option<u64>,
    /// Dashboard host (default: 127.0.0.1)
    pub dashboard_host: String,
    /// Dashboard port (default: 3000)
    pub dashboard_port: u16,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// This function automatically loads a .env file from the project root if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();

        Self::from_env_inner()
    }

    /// Internal method to load from env without loading .env
    fn from_env_inner() -> Result<Self, ConfigError> {
        let discord_token = env::var("DISCORD_TOKEN")
            .map_err(|_| ConfigError::MissingVar("DISCORD_TOKEN".to_string()))?;

        Ok(Self {
            discord_token,
            home_guild_id: env::var("HOME_GUILD_ID").ok().and_then(|v| v.parse().ok()),
            dashboard_host: env::var("DASHBOARD_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            dashboard_port: env::var("DASHBOARD_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
        })
    }

    /// Get the HTTP bind address for the dashboard
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.dashboard_host, self.dashboard_port)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env vars are process-global; serialize the tests that touch them.
    static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn test_config_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe {
            env::remove_var("DISCORD_TOKEN");
            env::remove_var("HOME_GUILD_ID");
            env::remove_var("DASHBOARD_HOST");
            env::remove_var("DASHBOARD_PORT");

            env::set_var("DISCORD_TOKEN", "test-token");
        }

        let config = Config::from_env_inner().unwrap();

        assert_eq!(config.discord_token, "test-token");
        assert!(config.home_guild_id.is_none());
        assert_eq!(config.dashboard_host, "127.0.0.1");
        assert_eq!(config.dashboard_port, 3000);
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_config_custom_values() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe {
            env::set_var("DISCORD_TOKEN", "tok");
            env::set_var("HOME_GUILD_ID", "123456789012345678");
            env::set_var("DASHBOARD_HOST", "0.0.0.0");
            env::set_var("DASHBOARD_PORT", "8080");
        }

        let config = Config::from_env_inner().unwrap();

        assert_eq!(config.home_guild_id, Some(123456789012345678));
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_config_missing_token() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe {
            env::remove_var("DISCORD_TOKEN");
        }

        let result = Config::from_env_inner();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("DISCORD_TOKEN"));
    }
}
