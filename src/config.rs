use crate::logging::LogFormat;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Payment-request service: contacts, invitations and IOUs over HTTP.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address the HTTP API listens on.
    #[arg(long, env = "IOU_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "IOU_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// JSON file of users (`email`, `display_name`, `token`) to register at startup.
    #[arg(long, env = "IOU_SEED")]
    pub seed: Option<PathBuf>,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, env = "IOU_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "IOU_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}
