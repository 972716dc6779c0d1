//! Runtime configuration for the HTTP shell.
//!
//! * `PAYTRACK_DATA_DIR`: directory holding the slot files
//!   (default `data`).
//! * `PAYTRACK_BIND_ADDR`: address the server listens on
//!   (default `127.0.0.1:3000`).

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = lookup("PAYTRACK_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let bind_addr = lookup("PAYTRACK_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse()
            .with_context(|| format!("PAYTRACK_BIND_ADDR is not a socket address: {bind_addr}"))?;

        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            bind_addr,
        })
    }
}
