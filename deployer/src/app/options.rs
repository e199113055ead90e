//! Application configuration options

use std::path::PathBuf;

use secrecy::SecretString;

use crate::deploy::ReconcileOptions;
use crate::http::ClientOptions;

/// Default deployment document name
pub const DEFAULT_DEPLOYMENT_FILE: &str = "forge-deploy.yml";

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Forge API token
    pub token: SecretString,

    /// Paths of the run
    pub paths: PathOptions,

    /// `NAME=VALUE` secret list
    pub secrets: SecretString,

    /// Forge API client options
    pub api: ClientOptions,

    /// Reconciler options
    pub reconcile: ReconcileOptions,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            token: SecretString::from(String::new()),
            paths: PathOptions::default(),
            secrets: SecretString::from(String::new()),
            api: ClientOptions::default(),
            reconcile: ReconcileOptions::default(),
        }
    }
}

/// File locations
#[derive(Debug, Clone)]
pub struct PathOptions {
    /// Checked-out repository; document relative paths start here
    pub workspace: PathBuf,

    /// Deployment document, relative to the workspace
    pub deployment_file: PathBuf,

    /// Nginx templates, `<workspace>/nginx_templates` when unset
    pub templates_dir: Option<PathBuf>,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("./"),
            deployment_file: PathBuf::from(DEFAULT_DEPLOYMENT_FILE),
            templates_dir: None,
        }
    }
}

impl PathOptions {
    pub fn deployment_path(&self) -> PathBuf {
        self.workspace.join(&self.deployment_file)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.templates_dir
            .clone()
            .unwrap_or_else(|| self.workspace.join("nginx_templates"))
    }
}
