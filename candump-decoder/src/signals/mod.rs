//! Signal database and DBC parser
//!
//! This module contains the DBC parser and the signal database it fills.

pub mod dbc;
pub mod database;

// Re-export key types for convenience
pub use database::{
    ByteOrder, DatabaseStats, MessageDefinition, MultiplexerInfo, SignalDatabase,
    SignalDefinition, ValueType,
};
