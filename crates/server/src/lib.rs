//! HTTP server for the agricultural market intelligence service

pub mod api;
pub mod config;
pub mod state;
