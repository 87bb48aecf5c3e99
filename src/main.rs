use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid RUST_LOG filter")?;
    fmt().with_env_filter(filter).init();

    let cfg = usergate::config::Config::from_env().context("Invalid configuration")?;

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "usergate::startup",
        "usergate starting: RUST_LOG='{}', bind={}:{}, token_scheme={:?}, admin_bootstrap={}",
        rust_log, cfg.bind_addr, cfg.http_port, cfg.token_scheme, cfg.admin_password.is_some()
    );

    usergate::server::run_with_config(cfg).await
}
