//! Port traits for every collaborator outside the core.

pub mod account_port;
pub mod config_port;
pub mod execution_port;
pub mod instrument_port;
pub mod market_data_port;
pub mod reconciliation_port;
pub mod trade_log_port;
