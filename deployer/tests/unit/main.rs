//! Integration tests for forge-deployer

mod test_config;
mod test_engine;
