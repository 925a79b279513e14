use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    /// Base URL candidates open their test links against.
    pub webapp_url: String,
    pub public_rps: u32,
    pub admin_rps: u32,
    /// Per-question limit applied when a link does not specify one.
    pub default_question_timer_seconds: i32,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            webapp_url: get_env("WEBAPP_URL")?,
            public_rps: get_env_parse("PUBLIC_RPS")?,
            admin_rps: get_env_parse("ADMIN_RPS")?,
            default_question_timer_seconds: env::var("DEFAULT_QUESTION_TIMER_SECONDS")
                .ok()
                .map(|raw| {
                    raw.parse().map_err(|e| {
                        Error::Config(format!("Invalid value for DEFAULT_QUESTION_TIMER_SECONDS: {}", e))
                    })
                })
                .transpose()?
                .unwrap_or(10),
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
