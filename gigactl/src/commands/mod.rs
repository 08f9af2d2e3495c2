//! Command implementations for gigactl

pub mod analyze;
pub mod chat;
pub mod embed;
pub mod models;
pub mod tokens;
