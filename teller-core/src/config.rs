use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct TellerConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub socket_path: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8791,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Capacity given to registry-seeded default agents.
    pub default_agent_capacity: i32,
    /// Starting satisfaction rating for seeded default agents.
    pub default_agent_rating: f64,
    /// Interval between background sweep cycles.
    pub sweep_interval_seconds: u64,
    /// Idle minutes after which a non-terminal session is abandoned.
    pub abandon_after_minutes: i64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_agent_capacity: 10,
            default_agent_rating: 4.5,
            sweep_interval_seconds: 60,
            abandon_after_minutes: 30,
        }
    }
}

impl TellerConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }
}
