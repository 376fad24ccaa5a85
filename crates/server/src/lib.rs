//! HTTP prediction service over the ridewise pipeline

pub mod api;
pub mod config;
