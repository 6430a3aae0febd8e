use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    /// Token lifetime in days.
    pub expiry_days: u64,
}

/// Server configuration, read from the environment (and `.env` if present).
///
/// | Env var           | Default                 |
/// |-------------------|-------------------------|
/// | `DATABASE_URL`    | `qaforum.db`            |
/// | `HOST`            | `0.0.0.0`               |
/// | `PORT`            | `8080`                  |
/// | `CORS_ORIGIN`     | `http://localhost:3000` |
/// | `JWT_SECRET`      | dev-only secret         |
/// | `JWT_EXPIRY_DAYS` | `30`                    |
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub jwt: JwtConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not set, using the development secret");
            DEV_JWT_SECRET.to_string()
        });

        Self {
            database_url: try_load("DATABASE_URL", "qaforum.db"),
            host: try_load("HOST", "0.0.0.0"),
            port: try_load("PORT", "8080"),
            cors_origin: try_load("CORS_ORIGIN", "http://localhost:3000"),
            jwt: JwtConfig {
                secret,
                expiry_days: try_load("JWT_EXPIRY_DAYS", "30"),
            },
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
        default
            .parse()
            .unwrap_or_else(|_| panic!("default for {key} must parse"))
    })
}
