pub mod api;
pub mod commands;
pub mod config;
pub mod error_table;
pub mod errors;
pub mod logging;
pub mod metadata;
