//! Application configuration

mod app_config;

pub use app_config::{AppConfig, DatabaseBlockConfig, HttpBlockConfig, LogFormat, LoggingConfig};
