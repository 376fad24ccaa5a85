//! CLI subcommands

pub mod chat;
pub mod models;
pub mod predict;
