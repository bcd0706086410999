//! Command line side of obclient: the config file, on-disk client and token
//! records, account listing and the subcommands built on `obclient-oauth`.

pub mod accounts;
pub mod commands;
pub mod config;
pub mod probe;
pub mod store;

pub use crate::accounts::{Account, AccountLister, AccountsPrinter, AccountsRequest};
pub use crate::config::{Config, ConfigError, DEFAULT_CONFIG_PATH};
pub use crate::store::{FileStore, Record, StoreError};
