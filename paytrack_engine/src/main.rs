//! Entry point for the Paytrack Engine binary.
//!
//! Running this binary starts an HTTP server exposing the ledger.
//! Records are kept as JSON files in `PAYTRACK_DATA_DIR` (default
//! `data`) and the server binds to `PAYTRACK_BIND_ADDR` (default
//! `127.0.0.1:3000`).  Log verbosity follows `RUST_LOG`.

use anyhow::Result;
use paytrack_engine::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "paytrack_engine=info".to_string()),
        )
        .init();

    let config = Config::from_env()?;
    paytrack_engine::api::serve(config).await
}
