//! Sigil - market-structure signal classifier with confidence scoring and
//! forward self-evaluation.

pub mod config;
pub mod error;
pub mod services;
pub mod types;

pub use config::SignalConfig;
pub use error::{Result, SignalError};
pub use services::SignalEngine;
