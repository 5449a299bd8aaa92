use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Origins of the bundled web frontend during local development.
pub const DEFAULT_CORS_ORIGINS: [&str; 4] = [
    "http://localhost:5173",
    "http://127.0.0.1:5173",
    "http://localhost",
    "http://127.0.0.1",
];

#[derive(Debug, Clone, Parser)]
#[command(name = "premium-server")]
#[command(about = "Serve insurance premium category predictions over HTTP")]
pub struct Config {
    /// Path to the classifier artifact (.json)
    #[arg(
        long = "model",
        env = "PREMIUM_MODEL_PATH",
        default_value = "model/artifacts/premium_category.json"
    )]
    pub model_path: PathBuf,

    /// Address to listen on
    #[arg(long, env = "PREMIUM_BIND", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    /// Allowed CORS origin; repeat the flag or pass a comma-separated list
    #[arg(
        long = "cors-origin",
        env = "PREMIUM_CORS_ORIGINS",
        value_delimiter = ',',
        default_values = DEFAULT_CORS_ORIGINS
    )]
    pub cors_origins: Vec<String>,

    /// Replace classifier error text in 500 responses with a generic message
    #[arg(
        long,
        env = "PREMIUM_REDACT_ERRORS",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub redact_errors: bool,
}
