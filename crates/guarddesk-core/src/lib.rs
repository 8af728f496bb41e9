//! Core types, config, and errors for Guard Desk.

pub mod config;
pub mod error;
pub mod types;
