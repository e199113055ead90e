//! Deployment document: schema, secrets and loading

pub mod env;
pub mod loader;
pub mod model;
pub mod schema;
pub mod secrets;

pub use loader::DeploymentLoader;
pub use model::{DaemonSpec, DeploymentSpec, EnvVars, ProjectType, ServerProvisioning, SiteSpec};
pub use secrets::SecretMap;
