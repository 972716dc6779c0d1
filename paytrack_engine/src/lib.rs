//! Paytrack Engine library crate.
//!
//! This crate tracks freelance income: employers, the work logged for
//! them and the payments received.  The reconciliation logic lives in
//! [`engine`] (status derivation, manual payments and oldest-first
//! allocation of lump payments) and [`reports`] (portfolio totals and
//! earned/received series).  [`ledger::Ledger`] is the record store
//! that ties them to a [`store::SlotStore`].  The HTTP shell in
//! [`api`] is only compiled with the `api` feature.

pub mod amounts;
pub mod engine;
pub mod error;
pub mod ids;
pub mod interchange;
pub mod ledger;
pub mod models;
pub mod reports;
pub mod store;

#[cfg(feature = "api")]
pub mod api;
#[cfg(feature = "api")]
pub mod config;

pub use error::{ErrorKind, LedgerError, Result};
pub use ledger::Ledger;
