use std::net::SocketAddr;

use anyhow::{bail, Context};
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: PgConnectOptions,
    pub max_connections: u32,
    pub listen_addr: SocketAddr,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Fails when the signing secret
    /// or the database location is missing, or when a numeric setting does
    /// not parse.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> anyhow::Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} must be set"))
        };

        let database = match lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
            Some(url) => url
                .parse::<PgConnectOptions>()
                .context("DATABASE_URL is not a valid postgres url")?,
            None => {
                let mut opts = PgConnectOptions::new()
                    .host(&required("DB_HOST")?)
                    .port(parse_or("DB_PORT", lookup("DB_PORT"), 5432)?)
                    .username(&required("DB_USER")?)
                    .database(&required("DB_NAME")?);
                if let Some(password) = lookup("DB_PASSWORD") {
                    opts = opts.password(&password);
                }
                opts
            }
        };

        let ttl_minutes: i64 = parse_or("JWT_TTL_MINUTES", lookup("JWT_TTL_MINUTES"), 10)?;
        if ttl_minutes <= 0 {
            bail!("JWT_TTL_MINUTES must be positive");
        }

        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "roleguard".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "roleguard-users".into()),
            ttl_minutes,
        };

        let max_connections = parse_or("DB_MAX_CONNECTIONS", lookup("DB_MAX_CONNECTIONS"), 10)?;

        let host = lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or("APP_PORT", lookup("APP_PORT"), 8080)?;
        let listen_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .with_context(|| format!("APP_HOST {host:?} is not a valid address"))?;

        Ok(Self {
            database,
            max_connections,
            listen_addr,
            jwt,
        })
    }
}

/// Absent or blank means `default`; anything else must parse.
fn parse_or<T>(key: &str, value: Option<String>, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} has an invalid value {raw:?}")),
    }
}
