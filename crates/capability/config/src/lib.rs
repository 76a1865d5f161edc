//! 应用运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    /// 设置后使用 Postgres 存储
    pub database_url: Option<String>,
    /// 未配置数据库时，从该 JSON 文件加载内存存储
    pub seed_file: Option<String>,
    /// 启动时打开所有仪器端口
    pub auto_open: bool,
    /// 打开端口时是否同时启用输出
    pub outputs_enabled: bool,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr =
            env::var("RELAY_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8090".to_string());
        let database_url = read_optional("RELAY_DATABASE_URL");
        let seed_file = read_optional("RELAY_SEED_FILE");
        let auto_open = read_bool_with_default("RELAY_AUTO_OPEN", false)?;
        let outputs_enabled = read_bool_with_default("RELAY_OUTPUTS_ENABLED", true)?;

        Ok(Self {
            http_addr,
            database_url,
            seed_file,
            auto_open,
            outputs_enabled,
        })
    }
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> Result<bool, ConfigError> {
    let value = match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => return Ok(default),
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid(key.to_string(), value)),
    }
}
