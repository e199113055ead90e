//! Remote state lookup

pub mod resolver;
