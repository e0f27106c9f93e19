use chrono::{FixedOffset, Local, Offset};
use std::env;
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

/// Token verification settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub token_max_age_secs: i64,
}

/// Tunables of the detection pipeline
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Trailing window read by the baseline calculator and pattern detector
    pub window_days: i64,
    /// Fixed divisor turning the window total into a weekly average
    pub baseline_weeks: u32,
    pub cooldown_days: i64,
    /// Offset used for "local time" (week start, Monday digest, time-of-day)
    pub utc_offset: FixedOffset,
}

/// Which narrative strategy the engine uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrativeProvider {
    Template,
    Ai,
}

impl NarrativeProvider {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "template" => Ok(NarrativeProvider::Template),
            "ai" => Ok(NarrativeProvider::Ai),
            _ => Err(format!(
                "Invalid NARRATIVE_PROVIDER: {}. Must be one of: [\"template\", \"ai\"]",
                s
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NarrativeProvider::Template => "template",
            NarrativeProvider::Ai => "ai",
        }
    }
}

/// Narrative generator configuration
#[derive(Debug, Clone)]
pub struct NarrativeConfig {
    pub provider: NarrativeProvider,
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_ms: u64,
    pub seed: u64,
}

/// Background detection scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Zero disables the scheduler
    pub interval_secs: u64,
    pub concurrency: usize,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub detection: DetectionConfig,
    pub narrative: NarrativeConfig,
    pub scheduler: SchedulerConfig,
    pub log_level: String,
    pub http_port: u16,
    pub environment: String,
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = parse_env::<u32>("DATABASE_MAX_CONNECTIONS").unwrap_or(10);
        let acquire_timeout_secs = parse_env::<u64>("DATABASE_ACQUIRE_TIMEOUT_SECS").unwrap_or(30);
        let idle_timeout_secs = parse_env::<u64>("DATABASE_IDLE_TIMEOUT_SECS").unwrap_or(600); // 10 minutes
        let max_lifetime_secs = parse_env::<u64>("DATABASE_MAX_LIFETIME_SECS").unwrap_or(1800); // 30 minutes
        let test_before_acquire = parse_env::<bool>("DATABASE_TEST_BEFORE_ACQUIRE").unwrap_or(true);

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
            url: "postgresql://localhost/reflect".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

const DEV_AUTH_SECRET: &str = "reflect-development-secret";

impl AuthConfig {
    pub fn from_env(is_production: bool) -> Result<Self, String> {
        let secret = match env::var("AUTH_SECRET") {
            Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ if is_production => {
                return Err("AUTH_SECRET environment variable is required in production".to_string())
            }
            _ => DEV_AUTH_SECRET.to_string(),
        };

        let token_max_age_secs = parse_env::<i64>("AUTH_TOKEN_MAX_AGE_SECS").unwrap_or(86_400);
        if token_max_age_secs <= 0 {
            return Err("AUTH_TOKEN_MAX_AGE_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            secret,
            token_max_age_secs,
        })
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: DEV_AUTH_SECRET.to_string(),
            token_max_age_secs: 86_400,
        }
    }
}

impl DetectionConfig {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let window_days = parse_env::<i64>("DETECTION_WINDOW_DAYS").unwrap_or(defaults.window_days);
        let baseline_weeks = parse_env::<u32>("BASELINE_WEEKS").unwrap_or(defaults.baseline_weeks);
        let cooldown_days = parse_env::<i64>("COOLDOWN_DAYS").unwrap_or(defaults.cooldown_days);

        let utc_offset = match parse_env::<i32>("LOCAL_UTC_OFFSET_MINUTES") {
            Some(minutes) => FixedOffset::east_opt(minutes * 60).ok_or_else(|| {
                format!("LOCAL_UTC_OFFSET_MINUTES out of range: {}", minutes)
            })?,
            None => defaults.utc_offset,
        };

        if window_days <= 0 {
            return Err("DETECTION_WINDOW_DAYS must be greater than 0".to_string());
        }
        if baseline_weeks == 0 {
            return Err("BASELINE_WEEKS must be greater than 0".to_string());
        }
        if cooldown_days < 0 {
            return Err("COOLDOWN_DAYS must not be negative".to_string());
        }

        Ok(Self {
            window_days,
            baseline_weeks,
            cooldown_days,
            utc_offset,
        })
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::days(self.window_days)
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::days(self.cooldown_days)
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            window_days: 90,
            baseline_weeks: 12, // ~12 weeks in 90 days
            cooldown_days: 21,
            utc_offset: Local::now().offset().fix(),
        }
    }
}

impl NarrativeConfig {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let provider = match env::var("NARRATIVE_PROVIDER") {
            Ok(p) => NarrativeProvider::from_str(p.trim())?,
            Err(_) => defaults.provider,
        };
        let api_url = env::var("NARRATIVE_API_URL").unwrap_or(defaults.api_url);
        let api_key = env::var("NARRATIVE_API_KEY")
            .map(|k| k.trim().to_string())
            .unwrap_or_default();
        let model = env::var("NARRATIVE_MODEL").unwrap_or(defaults.model);
        let timeout_ms = parse_env::<u64>("NARRATIVE_TIMEOUT_MS").unwrap_or(defaults.timeout_ms);
        let seed = parse_env::<u64>("NARRATIVE_SEED").unwrap_or(defaults.seed);

        if provider == NarrativeProvider::Ai && api_key.is_empty() {
            return Err("NARRATIVE_API_KEY is required when NARRATIVE_PROVIDER=ai".to_string());
        }
        if timeout_ms == 0 {
            return Err("NARRATIVE_TIMEOUT_MS must be greater than 0".to_string());
        }

        Ok(Self {
            provider,
            api_url,
            api_key,
            model,
            timeout_ms,
            seed,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            provider: NarrativeProvider::Template,
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_ms: 8_000,
            seed: 0,
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Result<Self, String> {
        let interval_secs = parse_env::<u64>("SCHEDULER_INTERVAL_SECS").unwrap_or(0);
        let concurrency = parse_env::<usize>("SCHEDULER_CONCURRENCY").unwrap_or(4);

        if concurrency == 0 {
            return Err("SCHEDULER_CONCURRENCY must be greater than 0".to_string());
        }

        Ok(Self {
            interval_secs,
            concurrency,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.interval_secs > 0
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 0,
            concurrency: 4,
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let http_port = parse_env::<u16>("HTTP_PORT").unwrap_or(8080);

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
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }
        let environment = environment.to_lowercase();

        let database = DatabaseConfig::from_env()?;
        let auth = AuthConfig::from_env(environment == "production")?;
        let detection = DetectionConfig::from_env()?;
        let narrative = NarrativeConfig::from_env()?;
        let scheduler = SchedulerConfig::from_env()?;

        Ok(Self {
            database,
            auth,
            detection,
            narrative,
            scheduler,
            log_level: log_level.to_lowercase(),
            http_port,
            environment,
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
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            detection: DetectionConfig::default(),
            narrative: NarrativeConfig::default(),
            scheduler: SchedulerConfig::default(),
            log_level: "info".to_string(),
            http_port: 8080,
            environment: "development".to_string(),
        }
    }
}
