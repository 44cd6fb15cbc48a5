//! Configuration loading and representation.
//!
//! Everything comes from the process environment, optionally seeded from a
//! `.env` file. Parsing goes through a key-lookup function so it can be
//! exercised without touching the real environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SMTP_PORT: u16 = 465;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub bind_addr: SocketAddr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Managed Postgres in production requires TLS.
    pub require_tls: bool,
}

/// SMTP settings for low-stock alerts. Only built when every required
/// variable is present.
#[derive(Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS (`true`) or STARTTLS (`false`).
    pub secure: bool,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub http: HttpConfig,
    /// `None` means no `DATABASE_URL`: the API falls back to an in-memory store.
    pub database: Option<DatabaseConfig>,
    pub mail: Option<MailConfig>,
}

impl AppConfig {
    /// Load from the process environment. Callers load `.env` beforehand.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
        let ip: IpAddr = parse_or("BIND_ADDR", get("BIND_ADDR"), DEFAULT_BIND_ADDR)?;
        let http = HttpConfig {
            bind_addr: SocketAddr::new(ip, port),
        };

        let production = get("APP_ENV")
            .or_else(|| get("NODE_ENV"))
            .is_some_and(|env| env.eq_ignore_ascii_case("production"));

        let database = match get("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_or(
                    "DB_MAX_CONNECTIONS",
                    get("DB_MAX_CONNECTIONS"),
                    DEFAULT_DB_MAX_CONNECTIONS,
                )?,
                acquire_timeout: Duration::from_secs(parse_or(
                    "DB_ACQUIRE_TIMEOUT_SECS",
                    get("DB_ACQUIRE_TIMEOUT_SECS"),
                    DEFAULT_DB_ACQUIRE_TIMEOUT_SECS,
                )?),
                require_tls: production,
            }),
            None => None,
        };

        let mail = Self::mail_from(&get)?;

        Ok(Self {
            http,
            database,
            mail,
        })
    }

    fn mail_from<G>(get: &G) -> Result<Option<MailConfig>, ConfigError>
    where
        G: Fn(&str) -> Option<String>,
    {
        let (Some(host), Some(username), Some(password), Some(to)) = (
            get("SMTP_HOST"),
            get("SMTP_USER"),
            get("SMTP_PASS"),
            get("ALERT_TO_EMAIL").or_else(|| get("SMTP_TO")),
        ) else {
            return Ok(None);
        };

        let port = parse_or("SMTP_PORT", get("SMTP_PORT"), DEFAULT_SMTP_PORT)?;
        let secure = match get("SMTP_SECURE") {
            Some(raw) => parse_bool("SMTP_SECURE", &raw)?,
            None => port == DEFAULT_SMTP_PORT,
        };
        let from = get("SMTP_FROM").unwrap_or_else(|| username.clone());

        Ok(Some(MailConfig {
            host,
            port,
            secure,
            username,
            password,
            from,
            to,
        }))
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.parse().map_err(|e: T::Err| invalid(key, &raw, e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(invalid(key, raw, "expected true or false")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.http.bind_addr, "0.0.0.0:3000".parse().unwrap());
        assert!(cfg.database.is_none());
        assert!(cfg.mail.is_none());
    }

    #[test]
    fn database_settings_and_tls_in_production() {
        let cfg = load(&[
            ("DATABASE_URL", "postgres://u:p@localhost/stock"),
            ("DB_MAX_CONNECTIONS", "4"),
            ("NODE_ENV", "production"),
            ("PORT", "8080"),
        ])
        .unwrap();
        let db = cfg.database.unwrap();
        assert_eq!(db.max_connections, 4);
        assert_eq!(db.acquire_timeout, Duration::from_secs(10));
        assert!(db.require_tls);
        assert_eq!(cfg.http.bind_addr.port(), 8080);
    }

    #[test]
    fn invalid_port_is_an_error() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn blank_values_are_unset() {
        let cfg = load(&[("DATABASE_URL", "   ")]).unwrap();
        assert!(cfg.database.is_none());
    }

    #[test]
    fn mail_requires_every_credential() {
        let partial = load(&[("SMTP_HOST", "smtp.example.com"), ("SMTP_USER", "bot")]).unwrap();
        assert!(partial.mail.is_none());

        let cfg = load(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USER", "bot@example.com"),
            ("SMTP_PASS", "secret"),
            ("SMTP_TO", "lab@example.com"),
        ])
        .unwrap();
        let mail = cfg.mail.unwrap();
        assert_eq!(mail.port, 465);
        assert!(mail.secure);
        assert_eq!(mail.from, "bot@example.com");
        assert_eq!(mail.to, "lab@example.com");
        assert!(!format!("{mail:?}").contains("secret"));
    }

    #[test]
    fn smtp_secure_follows_port_unless_set() {
        let base = [
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USER", "bot@example.com"),
            ("SMTP_PASS", "secret"),
            ("ALERT_TO_EMAIL", "lab@example.com"),
            ("SMTP_PORT", "587"),
        ];
        let mail = load(&base).unwrap().mail.unwrap();
        assert!(!mail.secure);

        let mut forced = base.to_vec();
        forced.push(("SMTP_SECURE", "true"));
        assert!(load(&forced).unwrap().mail.unwrap().secure);

        let mut bad = base.to_vec();
        bad.push(("SMTP_SECURE", "maybe"));
        assert!(load(&bad).is_err());
    }
}
