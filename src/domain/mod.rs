//! Core domain types and logic.

pub mod bar;
pub mod bar_window;
pub mod indicator;
pub mod snapshot;
pub mod strategy;
pub mod session;
pub mod signal;
pub mod instrument;
pub mod sizing;
pub mod order;
pub mod governor;
pub mod trade;
pub mod engine;
pub mod config;
pub mod config_validation;
pub mod error;
