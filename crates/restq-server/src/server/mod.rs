pub mod config;
pub mod http;
pub mod service;
pub mod shutdown;
pub mod telemetry;
