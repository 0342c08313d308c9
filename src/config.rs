use chrono_tz::Tz;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::database::types::DocumentType;
use crate::services::number_format::NumberFormat;

pub const DEFAULT_INVOICE_NUMBER_FORMAT: &str = "INV-{{SEQUENCE:6}}";
pub const DEFAULT_ESTIMATE_NUMBER_FORMAT: &str = "EST-{{SEQUENCE:6}}";
pub const DEFAULT_PAYMENT_NUMBER_FORMAT: &str = "PAY-{{SEQUENCE:6}}";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub timezone: Option<String>,
    pub max_body_bytes: Option<usize>,
    pub invoice_number_format: Option<String>,
    pub estimate_number_format: Option<String>,
    pub payment_number_format: Option<String>,
    /// Сколько кандидатов перебирает аллокатор при обнаруженной коллизии номера.
    pub allocation_retry_limit: Option<u32>,
    /// Сколько раз повторяется создание документа целиком (новая транзакция).
    pub create_retry_attempts: Option<u32>,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;

        let mut config: Config = cfg.try_deserialize()?;

        if config.timezone.is_none() {
            config.timezone = Some("UTC".to_string());
        }

        config.validate()?;

        Ok(config)
    }

    /// Конфигурация для тестов и CLI без обращения к окружению.
    pub fn local(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            timezone: Some("UTC".to_string()),
            max_body_bytes: None,
            invoice_number_format: None,
            estimate_number_format: None,
            payment_number_format: None,
            allocation_retry_limit: None,
            create_retry_attempts: None,
        }
    }

    /// Временная зона, в которой рендерится `DATE_FORMAT`.
    pub fn get_timezone(&self) -> Result<Tz, chrono_tz::ParseError> {
        let tz_str = self.timezone.as_deref().unwrap_or("UTC");
        tz_str.parse::<Tz>()
    }

    /// Шаблон номера по умолчанию для типа документа.
    pub fn number_format_for(&self, document_type: DocumentType) -> &str {
        let configured = match document_type {
            DocumentType::Invoice => self.invoice_number_format.as_deref(),
            DocumentType::Estimate => self.estimate_number_format.as_deref(),
            DocumentType::Payment => self.payment_number_format.as_deref(),
        };

        configured.unwrap_or(match document_type {
            DocumentType::Invoice => DEFAULT_INVOICE_NUMBER_FORMAT,
            DocumentType::Estimate => DEFAULT_ESTIMATE_NUMBER_FORMAT,
            DocumentType::Payment => DEFAULT_PAYMENT_NUMBER_FORMAT,
        })
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if !self
            .host
            .chars()
            .all(|c| c.is_alphanumeric() || ".:-_".contains(c))
        {
            return Err(config::ConfigError::Message(
                "Invalid host format".to_string(),
            ));
        }

        if self.port < 1024 {
            return Err(config::ConfigError::Message(
                "Port must be 1024 or higher for security reasons".to_string(),
            ));
        }

        if let Some(tz_str) = &self.timezone {
            if tz_str.parse::<Tz>().is_err() {
                return Err(config::ConfigError::Message(format!(
                    "Invalid timezone: {}",
                    tz_str
                )));
            }
        }

        // 1KB..100MB
        if let Some(limit) = self.max_body_bytes {
            let min = 1024;
            let max = 100 * 1024 * 1024;
            if limit < min || limit > max {
                return Err(config::ConfigError::Message(format!(
                    "max_body_bytes must be between {} and {} bytes",
                    min, max
                )));
            }
        }

        for document_type in DocumentType::ALL {
            let template = self.number_format_for(document_type);
            if let Err(e) = NumberFormat::parse(template) {
                return Err(config::ConfigError::Message(format!(
                    "Invalid {} number format `{}`: {}",
                    document_type, template, e
                )));
            }
        }

        if let Some(limit) = self.allocation_retry_limit {
            if !(1..=100).contains(&limit) {
                return Err(config::ConfigError::Message(
                    "allocation_retry_limit must be between 1 and 100".to_string(),
                ));
            }
        }

        if let Some(attempts) = self.create_retry_attempts {
            if !(1..=20).contains(&attempts) {
                return Err(config::ConfigError::Message(
                    "create_retry_attempts must be between 1 and 20".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl Config {
    pub fn effective_max_body_bytes(&self) -> usize {
        self.max_body_bytes.unwrap_or(1024 * 1024)
    }

    pub fn effective_allocation_retry_limit(&self) -> u32 {
        self.allocation_retry_limit.unwrap_or(5)
    }

    pub fn effective_create_retry_attempts(&self) -> u32 {
        self.create_retry_attempts.unwrap_or(3)
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub connect_timeout_secs: Option<u64>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
    pub sql_log: Option<bool>,
}

impl DatabaseSettings {
    pub fn default_from_url(url: String) -> Self {
        Self {
            url,
            max_connections: parse_env_var("DATABASE_MAX_CONNECTIONS"),
            min_connections: parse_env_var("DATABASE_MIN_CONNECTIONS"),
            connect_timeout_secs: parse_env_var("DATABASE_CONNECT_TIMEOUT_SECS"),
            acquire_timeout_secs: parse_env_var("DATABASE_ACQUIRE_TIMEOUT_SECS"),
            idle_timeout_secs: parse_env_var("DATABASE_IDLE_TIMEOUT_SECS"),
            sql_log: parse_env_var("DATABASE_SQL_LOG"),
        }
    }

    /// SQLite в памяти живёт, пока жив единственный коннект пула.
    pub fn in_memory_sqlite() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: Some(1),
            min_connections: Some(1),
            connect_timeout_secs: None,
            acquire_timeout_secs: None,
            idle_timeout_secs: None,
            sql_log: Some(false),
        }
    }
}

fn parse_env_var<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    env::var(key).ok().and_then(|value| value.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_formats_follow_document_type() {
        let config = Config::local("127.0.0.1", 8080);
        assert_eq!(config.number_format_for(DocumentType::Invoice), "INV-{{SEQUENCE:6}}");
        assert_eq!(config.number_format_for(DocumentType::Payment), "PAY-{{SEQUENCE:6}}");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unparseable_number_format() {
        let mut config = Config::local("127.0.0.1", 8080);
        config.estimate_number_format = Some("EST-{{SEQUENCE:abc}}".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_low_port_and_bad_timezone() {
        let config = Config::local("127.0.0.1", 80);
        assert!(config.validate().is_err());

        let mut config = Config::local("127.0.0.1", 8080);
        config.timezone = Some("Mars/Olympus".to_string());
        assert!(config.validate().is_err());
    }
}
