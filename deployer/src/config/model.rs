//! Fully resolved deployment model
//!
//! Produced once by the loader; immutable for the rest of the run.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Home directory of the `forge` user on every Forge server
pub const FORGE_HOME: &str = "/home/forge";

/// The whole deployment document
#[derive(Debug, Clone)]
pub struct DeploymentSpec {
    pub server_name: String,
    pub github_repository: String,
    pub github_branch: String,
    /// How to create the server when it does not exist yet
    pub server: Option<ServerProvisioning>,
    pub sites: Vec<SiteSpec>,
}

impl DeploymentSpec {
    pub fn domains(&self) -> Vec<String> {
        self.sites.iter().map(|s| s.site_domain.clone()).collect()
    }
}

/// Server creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerProvisioning {
    pub provider: String,
    pub server_type: String,
    pub credential_id: Option<u64>,
    pub region: Option<String>,
    pub size: Option<String>,
    pub ip_address: Option<String>,
    pub private_ip_address: Option<String>,
    pub php_version: Option<String>,
    pub database_type: Option<String>,
}

/// Project type passed through to Forge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectType {
    Php,
    Other(String),
}

impl ProjectType {
    pub fn parse(value: &str) -> Self {
        match value {
            "php" => ProjectType::Php,
            other => ProjectType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProjectType::Php => "php",
            ProjectType::Other(other) => other,
        }
    }
}

/// A daemon to keep running for a site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSpec {
    pub command: String,
}

/// One desired site, with every default already applied
#[derive(Debug, Clone)]
pub struct SiteSpec {
    pub site_domain: String,
    /// Effective branch (site override or document default)
    pub github_branch: String,
    /// Relative to the site home, empty for the home itself
    pub root_dir: String,
    /// Relative to `root_dir`
    pub web_dir: String,
    pub project_type: ProjectType,
    pub php_version: Option<String>,
    pub deployment_commands: Vec<String>,
    /// `env_file` merged with the inline `environment`
    pub environment: EnvVars,
    pub aliases: Vec<String>,
    pub nginx_template: String,
    pub nginx_template_variables: BTreeMap<String, String>,
    /// Absolute path of the custom nginx file
    pub nginx_custom_config: Option<PathBuf>,
    pub certificate: bool,
    pub clone_repository: bool,
    pub daemons: Vec<DaemonSpec>,
    /// `None` leaves the scheduler job untouched
    pub laravel_scheduler: Option<bool>,
}

impl SiteSpec {
    /// Site directory on the server, where the repository lives
    pub fn site_dir(&self) -> String {
        join_path(&[FORGE_HOME, &self.site_domain, &self.root_dir])
    }

    /// Web directory as Forge expects it in the site payload, e.g. `/public`
    pub fn web_directory(&self) -> String {
        join_path(&["/", &self.root_dir, &self.web_dir])
    }

    /// Domains a certificate for this site must cover
    pub fn certificate_domains(&self) -> Vec<String> {
        let mut domains = vec![self.site_domain.clone()];
        domains.extend(self.aliases.iter().cloned());
        domains
    }
}

/// Normalize a configured directory to a relative form without `.` segments
pub fn relative_dir(dir: &str) -> String {
    dir.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn join_path(parts: &[&str]) -> String {
    let absolute = parts.first().is_some_and(|p| p.starts_with('/'));
    let joined = parts
        .iter()
        .flat_map(|p| p.split('/'))
        .filter(|p| !p.is_empty() && *p != ".")
        .collect::<Vec<_>>()
        .join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Ordered environment variables with last-writer-wins inserts
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvVars {
    entries: Vec<(String, String)>,
}

impl EnvVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a variable, keeping its first position
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Merge `other` over `self`; `other` wins on collisions
    pub fn extend(&mut self, other: EnvVars) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// `KEY=VALUE` lines in Forge's env format
    pub fn to_env_string(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Debug for EnvVars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Values may carry secrets
        f.debug_set().entries(self.keys()).finish()
    }
}
