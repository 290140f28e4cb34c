use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_audience: Option<String>,
    pub jwt_issuer: Option<String>,
    pub identity_userinfo_url: Option<String>,
    pub privileged_roles: Vec<String>,
    pub max_upload_mb: u64,
    pub uploads_dir: String,
    pub api_rps: u32,
    pub public_rps: u32,
    pub cors_origins: Vec<String>,
    pub draft_retention_days: i64,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            jwt_audience: env::var("JWT_AUDIENCE").ok(),
            jwt_issuer: env::var("JWT_ISSUER").ok(),
            identity_userinfo_url: env::var("IDENTITY_USERINFO_URL").ok(),
            privileged_roles: split_list(
                &env::var("PRIVILEGED_ROLES").unwrap_or_else(|_| "SACHBEARBEITER,ADMIN".into()),
            ),
            max_upload_mb: get_env_parse_or("MAX_UPLOAD_MB", 10)?,
            uploads_dir: env::var("UPLOADS_DIR").unwrap_or_else(|_| "./uploads".to_string()),
            api_rps: get_env_parse_or("API_RPS", 100)?,
            public_rps: get_env_parse_or("PUBLIC_RPS", 50)?,
            cors_origins: split_list(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".into())),
            draft_retention_days: get_env_parse_or("DRAFT_RETENTION_DAYS", 30)?,
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        })
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }

    pub fn is_privileged(&self, role: &str) -> bool {
        self.privileged_roles
            .iter()
            .any(|r| r.eq_ignore_ascii_case(role))
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<&'static Config> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(get_config())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
