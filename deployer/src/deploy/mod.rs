//! Reconciliation engine

pub mod executor;
pub mod fsm;
pub mod pipeline;
pub mod poll;
pub mod report;
pub mod script;

pub use executor::{ReconcileOptions, Reconciler};
pub use report::{DeploymentReport, SiteFailure, SiteOutcome, Step};
