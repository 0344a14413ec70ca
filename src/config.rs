//! 代理配置（TOML） / Broker configuration (TOML)
//!
//! ```toml
//! [server]
//! listen_addr = "127.0.0.1:10083"
//!
//! [logging]
//! level = "info"
//!
//! [[topics]]
//! name = "orders"
//! partitions = 4
//! strategy = "hash"
//! subscription = "exclusive"
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::mq::TopicDefinition;

const VALID_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// 监听地址 / Address the TCP transport binds to.
    pub listen_addr: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings { listen_addr: SocketAddr::from(([127, 0, 0, 1], 10083)) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings { level: "info".to_string() }
    }
}

impl LoggingSettings {
    pub fn level_filter(&self) -> anyhow::Result<LevelFilter> {
        self.level
            .parse::<LevelFilter>()
            .map_err(|_| anyhow::anyhow!("invalid logging level {:?}, expected one of: {}", self.level, VALID_LEVELS.join(", ")))
    }
}

/// 代理配置
///
/// Broker configuration. Topic definitions are handed to `Broker::new`
/// as-is so that all topic errors are reported together there.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub topics: Vec<TopicDefinition>,
}

impl BrokerConfig {
    /// 从 TOML 文件加载配置 / Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", path.display(), e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: BrokerConfig =
            toml::from_str(content).map_err(|e| anyhow::anyhow!("failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.listen_addr.port() == 0 {
            anyhow::bail!("server port cannot be 0");
        }
        self.logging.level_filter()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = BrokerConfig::from_toml_str(
            r#"
            [server]
            listen_addr = "0.0.0.0:7001"

            [logging]
            level = "debug"

            [[topics]]
            name = "orders"
            partitions = 4

            [[topics]]
            name = "events"
            partitions = 2
            strategy = "round_robin"
            subscription = "per_group"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.listen_addr.port(), 7001);
        assert_eq!(config.logging.level_filter().unwrap(), LevelFilter::Debug);
        assert_eq!(config.topics.len(), 2);
        assert_eq!(config.topics[0].strategy, "hash");
        assert_eq!(config.topics[0].subscription, "exclusive");
        assert_eq!(config.topics[1].strategy, "round_robin");
        assert_eq!(config.topics[1].subscription, "per_group");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = BrokerConfig::from_toml_str("").unwrap();
        assert_eq!(config, BrokerConfig::default());
        assert_eq!(config.server.listen_addr.to_string(), "127.0.0.1:10083");
    }

    #[test]
    fn rejects_unknown_level() {
        let err = BrokerConfig::from_toml_str("[logging]\nlevel = \"loud\"").unwrap_err();
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn rejects_port_zero() {
        assert!(BrokerConfig::from_toml_str("[server]\nlisten_addr = \"127.0.0.1:0\"").is_err());
    }

    #[test]
    fn unknown_strategy_survives_parsing() {
        let config = BrokerConfig::from_toml_str("[[topics]]\nname = \"t\"\npartitions = 1\nstrategy = \"sticky\"").unwrap();
        assert_eq!(config.topics[0].strategy, "sticky");
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!("memq-broker-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[[topics]]\nname = \"t\"\npartitions = 3\n").unwrap();
        let config = BrokerConfig::from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.topics[0].partitions, 3);
        assert!(BrokerConfig::from_file(&path).is_err());
    }
}
