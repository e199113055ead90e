//! Forge Deployer Library
//!
//! Declarative provisioning and deployment of sites on Laravel Forge.

pub mod app;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod http;
pub mod logs;
pub mod nginx;
pub mod sync;
pub mod utils;
