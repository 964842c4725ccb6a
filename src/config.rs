use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Fixed development key, only used when ENCRYPTION_KEY is unset outside production
const DEV_ENCRYPTION_KEY: [u8; 32] = *b"messmate-development-key-000000!";

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
}

/// In-process cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub default_ttl_secs: u64,
}

/// Token bucket configuration applied per client
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub capacity: f64,
    pub refill_per_sec: f64,
}

/// Session and secret configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub session_ttl_hours: i64,
    pub encryption_key: [u8; 32],
}

/// Outbound email provider configuration
#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub from: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
    pub email: EmailConfig,
    pub log_level: String,
    pub http_port: u16,
    pub ws_port: Option<u16>,
    pub environment: String,
    pub public_base_url: String,
    pub audit_log_dir: PathBuf,
    pub housekeeping_interval_secs: u64,
}

/// Read an optional variable, failing if it is set but unparsable
fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, String> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("{} has an invalid value: {}", name, raw)),
        _ => Ok(None),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = parse_var::<u32>("DATABASE_MAX_CONNECTIONS")?.unwrap_or(10);
        let acquire_timeout_secs = parse_var::<u64>("DATABASE_ACQUIRE_TIMEOUT_SECS")?.unwrap_or(30);
        let idle_timeout_secs = parse_var::<u64>("DATABASE_IDLE_TIMEOUT_SECS")?.unwrap_or(600); // 10 minutes
        let max_lifetime_secs = parse_var::<u64>("DATABASE_MAX_LIFETIME_SECS")?.unwrap_or(1800); // 30 minutes
        let test_before_acquire = parse_var::<bool>("DATABASE_TEST_BEFORE_ACQUIRE")?.unwrap_or(true);

        if max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            url,
            max_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
            test_before_acquire,
        })
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/messmate".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Result<Self, String> {
        let max_entries = parse_var::<u64>("CACHE_MAX_ENTRIES")?.unwrap_or(10_000);
        let default_ttl_secs = parse_var::<u64>("CACHE_DEFAULT_TTL_SECS")?.unwrap_or(300);

        if max_entries == 0 {
            return Err("CACHE_MAX_ENTRIES must be greater than 0".to_string());
        }
        if default_ttl_secs == 0 {
            return Err("CACHE_DEFAULT_TTL_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            max_entries,
            default_ttl_secs,
        })
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            default_ttl_secs: 300,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Result<Self, String> {
        let capacity = parse_var::<f64>("RATE_LIMIT_CAPACITY")?.unwrap_or(60.0);
        let refill_per_sec = parse_var::<f64>("RATE_LIMIT_REFILL_PER_SEC")?.unwrap_or(1.0);

        let config = Self {
            capacity,
            refill_per_sec,
        };
        config.validate()?;
        Ok(config)
    }

    /// A bucket below one token would refuse every request
    pub fn validate(&self) -> Result<(), String> {
        if !(self.capacity >= 1.0) {
            return Err("RATE_LIMIT_CAPACITY must be at least 1".to_string());
        }
        if !(self.refill_per_sec > 0.0 && self.refill_per_sec.is_finite()) {
            return Err("RATE_LIMIT_REFILL_PER_SEC must be a positive number".to_string());
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 60.0,
            refill_per_sec: 1.0,
        }
    }
}

impl AuthConfig {
    pub fn from_env(is_production: bool) -> Result<Self, String> {
        let session_ttl_hours = parse_var::<i64>("SESSION_TTL_HOURS")?.unwrap_or(720);
        if session_ttl_hours <= 0 {
            return Err("SESSION_TTL_HOURS must be greater than 0".to_string());
        }

        let encryption_key = match non_empty_var("ENCRYPTION_KEY") {
            Some(hex_key) => parse_key(&hex_key)?,
            None if is_production => {
                return Err("ENCRYPTION_KEY is required in production".to_string());
            }
            None => DEV_ENCRYPTION_KEY,
        };

        Ok(Self {
            session_ttl_hours,
            encryption_key,
        })
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 720,
            encryption_key: DEV_ENCRYPTION_KEY,
        }
    }
}

/// Decode a 64 character hex string into a 32 byte key
fn parse_key(hex_key: &str) -> Result<[u8; 32], String> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|e| format!("ENCRYPTION_KEY must be hex encoded: {}", e))?;
    bytes
        .try_into()
        .map_err(|_| "ENCRYPTION_KEY must decode to exactly 32 bytes".to_string())
}

impl EmailConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: non_empty_var("EMAIL_API_URL"),
            api_key: non_empty_var("EMAIL_API_KEY"),
            from: non_empty_var("EMAIL_FROM")
                .unwrap_or_else(|| "Messmate <no-reply@messmate.local>".to_string()),
        }
    }

    /// Whether outbound delivery is configured
    pub fn is_configured(&self) -> bool {
        self.api_url.is_some()
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let http_port = parse_var::<u16>("HTTP_PORT")?.unwrap_or(8080);
        let ws_port = parse_var::<u16>("WS_PORT")?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        let environment = environment.to_lowercase();
        if !valid_environments.contains(&environment.as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        if ws_port == Some(http_port) {
            return Err("WS_PORT must differ from HTTP_PORT".to_string());
        }

        let auth = AuthConfig::from_env(environment == "production")?;

        let housekeeping_interval_secs =
            parse_var::<u64>("HOUSEKEEPING_INTERVAL_SECS")?.unwrap_or(60);
        if housekeeping_interval_secs == 0 {
            return Err("HOUSEKEEPING_INTERVAL_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            database,
            cache: CacheConfig::from_env()?,
            rate_limit: RateLimitConfig::from_env()?,
            auth,
            email: EmailConfig::from_env(),
            log_level: log_level.to_lowercase(),
            http_port,
            ws_port,
            environment,
            public_base_url: non_empty_var("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{}", http_port)),
            audit_log_dir: PathBuf::from(
                non_empty_var("AUDIT_LOG_DIR").unwrap_or_else(|| "./logs".to_string()),
            ),
            housekeeping_interval_secs,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Get database URL (convenience method)
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_secs(self.housekeeping_interval_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            auth: AuthConfig::default(),
            email: EmailConfig {
                api_url: None,
                api_key: None,
                from: "Messmate <no-reply@messmate.local>".to_string(),
            },
            log_level: "info".to_string(),
            http_port: 8080,
            ws_port: None,
            environment: "development".to_string(),
            public_base_url: "http://localhost:8080".to_string(),
            audit_log_dir: PathBuf::from("./logs"),
            housekeeping_interval_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout_secs, 30);
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.http_port, 8080);
        assert!(config.is_development());
        assert!(!config.is_production());
        assert!(!config.email.is_configured());
    }

    #[test]
    fn test_rate_limit_config_needs_a_whole_token() {
        assert!(RateLimitConfig::default().validate().is_ok());

        let below_one = RateLimitConfig {
            capacity: 0.5,
            refill_per_sec: 1.0,
        };
        assert!(below_one.validate().is_err());

        let no_refill = RateLimitConfig {
            capacity: 10.0,
            refill_per_sec: 0.0,
        };
        assert!(no_refill.validate().is_err());

        let nan = RateLimitConfig {
            capacity: f64::NAN,
            refill_per_sec: 1.0,
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_parse_key_accepts_64_hex_chars() {
        let key = parse_key(&"ab".repeat(32)).unwrap();
        assert_eq!(key, [0xab; 32]);
    }

    #[test]
    fn test_parse_key_rejects_wrong_length() {
        assert!(parse_key("abcd").is_err());
        assert!(parse_key("zz").is_err());
    }
}
