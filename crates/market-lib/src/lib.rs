//! Market intelligence library for agricultural commodity prices
//!
//! This crate provides the core functionality for:
//! - Weekly commodity price forecasting with a simulation fallback
//! - Plant disease classification from leaf images
//! - The historical market dataset, its exports and dashboard series
//! - A rule-based market chat assistant
//! - Accounts and sessions
//! - Health checks and observability

pub mod artifacts;
pub mod auth;
pub mod catalog;
pub mod chat;
pub mod classifier;
pub mod dashboard;
pub mod forecast;
pub mod health;
pub mod history;
pub mod models;
pub mod observability;

pub use catalog::PriceRangeCatalog;
pub use chat::ChatResponder;
pub use classifier::DiseaseClassifier;
pub use forecast::{ForecastError, PriceForecaster};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use history::MarketHistory;
pub use models::*;
pub use observability::{MarketMetrics, StructuredLogger};
