use clap::Parser;
use shrinkray_shortener::worker::DEFAULT_QUEUE_CAPACITY;
use shrinkray_shortener::WorkerSettings;
use shrinkray_storage::StorageConfig;
use shrinkray_telemetry::LogFormat;
use std::path::PathBuf;

pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const FILE_STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const BASE_URL_ENV: &str = "BASE_URL";
pub const LOG_FORMAT_ENV: &str = "SHRINKRAY_LOG_FORMAT";
pub const DELETION_QUEUE_CAPACITY_ENV: &str = "SHRINKRAY_DELETION_QUEUE_CAPACITY";
pub const ERROR_QUEUE_CAPACITY_ENV: &str = "SHRINKRAY_ERROR_QUEUE_CAPACITY";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Parser)]
#[command(name = "shrinkray-shortener")]
pub struct CLI {
    /// PostgreSQL DSN; takes precedence over the file path when non-empty.
    #[arg(long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    /// JSON-lines file used when no DSN is given.
    #[arg(long, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<PathBuf>,

    /// Public prefix of generated short links.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormat::Plain
    )]
    pub log_format: LogFormat,

    #[arg(
        long,
        env = DELETION_QUEUE_CAPACITY_ENV,
        default_value_t = DEFAULT_QUEUE_CAPACITY
    )]
    pub deletion_queue_capacity: usize,

    #[arg(
        long,
        env = ERROR_QUEUE_CAPACITY_ENV,
        default_value_t = DEFAULT_QUEUE_CAPACITY
    )]
    pub error_queue_capacity: usize,
}

impl CLI {
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            database_dsn: self.database_dsn.clone(),
            file_storage_path: self.file_storage_path.clone(),
        }
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings::builder()
            .request_capacity(self.deletion_queue_capacity)
            .error_capacity(self.error_queue_capacity)
            .build()
    }
}
