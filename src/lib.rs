//! Analytics gateway - request routing for analytics services
//!
//! This library provides the service registry, health monitoring, circuit
//! breaking, response caching and priority dispatch that sit between callers
//! and a fleet of analytics backends.

pub mod breaker;
pub mod cache;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod health;
pub mod logging;
pub mod queue;
pub mod registry;
pub mod routing;
