use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub escalation: EscalationConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub username: String,
    pub password: String,
    pub server: String,
    pub port: u32,
    pub database: String,
}

/// Escalation tuning. Thresholds are deployment configuration, not code:
/// a ticket left untouched longer than its priority's threshold is picked
/// up by the next scan.
#[derive(Clone, Debug)]
pub struct EscalationConfig {
    pub scan_interval_minutes: u64,
    pub critical_minutes: i64,
    pub high_minutes: i64,
    pub medium_minutes: i64,
    pub low_minutes: i64,
    pub allow_reopen: bool,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            scan_interval_minutes: 5,
            critical_minutes: 2 * 60,
            high_minutes: 8 * 60,
            medium_minutes: 24 * 60,
            low_minutes: 72 * 60,
            allow_reopen: false,
        }
    }
}

fn get_str(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let defaults = EscalationConfig::default();
        Ok(AppConfig {
            server: ServerConfig {
                host: get_str("SERVER_HOST", "127.0.0.1"),
                port: get_parsed("SERVER_PORT", 8080),
            },
            database: DatabaseConfig {
                username: get_str("TABLES_USERNAME", "tickets"),
                password: get_str("TABLES_PASSWORD", ""),
                server: get_str("TABLES_SERVER", "localhost"),
                port: get_parsed("TABLES_PORT", 5432),
                database: get_str("TABLES_DATABASE", "ticketserver"),
            },
            escalation: EscalationConfig {
                scan_interval_minutes: get_parsed(
                    "ESCALATION_SCAN_INTERVAL_MINUTES",
                    defaults.scan_interval_minutes,
                ),
                critical_minutes: get_parsed(
                    "ESCALATION_CRITICAL_MINUTES",
                    defaults.critical_minutes,
                ),
                high_minutes: get_parsed("ESCALATION_HIGH_MINUTES", defaults.high_minutes),
                medium_minutes: get_parsed("ESCALATION_MEDIUM_MINUTES", defaults.medium_minutes),
                low_minutes: get_parsed("ESCALATION_LOW_MINUTES", defaults.low_minutes),
                allow_reopen: get_bool("TICKETS_ALLOW_REOPEN", defaults.allow_reopen),
            },
        })
    }

    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.database.username,
            self.database.password,
            self.database.server,
            self.database.port,
            self.database.database
        )
    }
}
