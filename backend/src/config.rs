use std::env;
use std::path::PathBuf;
use std::time::Duration;

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

/// How overlapping prize rank ranges are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrizeOverlapPolicy {
    /// Overlaps are a Conflict at creation time and at award time
    Reject,
    /// A user already won by an earlier (lower `rank_from`) prize is skipped
    FirstMatchWins,
}

impl PrizeOverlapPolicy {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "reject" => Ok(PrizeOverlapPolicy::Reject),
            "first_match_wins" => Ok(PrizeOverlapPolicy::FirstMatchWins),
            _ => Err(format!(
                "Invalid PRIZE_OVERLAP_POLICY: {}. Must be one of: reject, first_match_wins",
                s
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrizeOverlapPolicy::Reject => "reject",
            PrizeOverlapPolicy::FirstMatchWins => "first_match_wins",
        }
    }
}

/// Invite code / invitation settings
#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Attempts per redemption before a transaction conflict is surfaced
    pub redemption_max_attempts: u32,
    pub code_length: usize,
    /// Attempts to find an unused code before generation fails closed
    pub code_generation_attempts: u32,
    pub invitation_ttl_hours: i64,
}

/// Job worker settings
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub poll_interval_ms: u64,
    pub batch_size: i64,
    pub max_attempts: i32,
    /// RUNNING jobs untouched for this long are reclaimed
    pub lease_secs: u64,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub access: AccessConfig,
    pub jobs: JobConfig,
    pub prize_overlap_policy: PrizeOverlapPolicy,
    pub audit_log_dir: Option<PathBuf>,
    pub log_level: String,
    pub log_format: String,
    pub environment: String,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = env_parse("DATABASE_MAX_CONNECTIONS", 10u32);
        let acquire_timeout_secs = env_parse("DATABASE_ACQUIRE_TIMEOUT_SECS", 30u64);
        let idle_timeout_secs = env_parse("DATABASE_IDLE_TIMEOUT_SECS", 600u64); // 10 minutes
        let max_lifetime_secs = env_parse("DATABASE_MAX_LIFETIME_SECS", 1800u64); // 30 minutes
        let test_before_acquire = env_parse("DATABASE_TEST_BEFORE_ACQUIRE", true);

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
            url: "postgresql://localhost/pool_finalizer".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

impl AccessConfig {
    pub fn from_env() -> Result<Self, String> {
        let config = Self {
            redemption_max_attempts: env_parse("REDEMPTION_MAX_ATTEMPTS", 3u32),
            code_length: env_parse("INVITE_CODE_LENGTH", 8usize),
            code_generation_attempts: env_parse("CODE_GENERATION_ATTEMPTS", 10u32),
            invitation_ttl_hours: env_parse("INVITATION_TTL_HOURS", 168i64),
        };

        if config.redemption_max_attempts == 0 {
            return Err("REDEMPTION_MAX_ATTEMPTS must be greater than 0".to_string());
        }
        if !(4..=32).contains(&config.code_length) {
            return Err("INVITE_CODE_LENGTH must be between 4 and 32".to_string());
        }
        if config.code_generation_attempts == 0 {
            return Err("CODE_GENERATION_ATTEMPTS must be greater than 0".to_string());
        }
        if config.invitation_ttl_hours <= 0 {
            return Err("INVITATION_TTL_HOURS must be greater than 0".to_string());
        }

        Ok(config)
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            redemption_max_attempts: 3,
            code_length: 8,
            code_generation_attempts: 10,
            invitation_ttl_hours: 168, // 7 days
        }
    }
}

impl JobConfig {
    pub fn from_env() -> Result<Self, String> {
        let config = Self {
            poll_interval_ms: env_parse("JOB_POLL_INTERVAL_MS", 1000u64),
            batch_size: env_parse("JOB_BATCH_SIZE", 10i64),
            max_attempts: env_parse("JOB_MAX_ATTEMPTS", 5i32),
            lease_secs: env_parse("JOB_LEASE_SECS", 300u64),
        };

        if config.poll_interval_ms == 0 {
            return Err("JOB_POLL_INTERVAL_MS must be greater than 0".to_string());
        }
        if config.batch_size <= 0 {
            return Err("JOB_BATCH_SIZE must be greater than 0".to_string());
        }
        if config.max_attempts <= 0 {
            return Err("JOB_MAX_ATTEMPTS must be greater than 0".to_string());
        }
        if config.lease_secs == 0 {
            return Err("JOB_LEASE_SECS must be greater than 0".to_string());
        }

        Ok(config)
    }

    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            batch_size: 10,
            max_attempts: 5,
            lease_secs: 300,
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;
        let access = AccessConfig::from_env()?;
        let jobs = JobConfig::from_env()?;

        let prize_overlap_policy = match env::var("PRIZE_OVERLAP_POLICY") {
            Ok(value) => PrizeOverlapPolicy::from_str(&value)?,
            Err(_) => PrizeOverlapPolicy::Reject,
        };

        let audit_log_dir = env::var("AUDIT_LOG_DIR").ok().map(PathBuf::from);

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&log_format.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_FORMAT: {}. Must be one of: {:?}",
                log_format, valid_log_formats
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        Ok(Self {
            database,
            access,
            jobs,
            prize_overlap_policy,
            audit_log_dir,
            log_level: log_level.to_lowercase(),
            log_format: log_format.to_lowercase(),
            environment: environment.to_lowercase(),
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

    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }

    /// Get database URL (convenience method)
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            access: AccessConfig::default(),
            jobs: JobConfig::default(),
            prize_overlap_policy: PrizeOverlapPolicy::Reject,
            audit_log_dir: None,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            environment: "development".to_string(),
        }
    }
}
