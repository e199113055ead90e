//! Forge API gateway

pub mod api;
pub mod certificates;
pub mod client;
pub mod daemons;
pub mod nginx;
pub mod servers;
pub mod sites;

pub use api::ForgeApi;
pub use client::{ClientOptions, HttpClient};
