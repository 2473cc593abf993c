pub mod auth;
pub mod cache;
pub mod configuration;
pub mod error;
pub mod logger;
pub mod middleware;
pub mod pool;
pub mod routes;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod validators;
