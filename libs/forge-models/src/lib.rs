//! Laravel Forge API models
//!
//! Shapes of the request bodies and response objects used by the deployer.
//! Only the fields the deployer reads are modelled; unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// Numeric identifier assigned by Forge to every object
pub type ForgeId = u64;

// ---------------------------------------------------------------------------
// Servers
// ---------------------------------------------------------------------------

/// A provisioned server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: ForgeId,
    pub name: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub php_version: Option<String>,
    /// Becomes true once provisioning has finished
    #[serde(default)]
    pub is_ready: bool,
}

/// Server creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServerRequest {
    pub name: String,
    pub provider: String,
    #[serde(rename = "type")]
    pub server_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<ForgeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub php_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Sites
// ---------------------------------------------------------------------------

/// A site hosted on a server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Site {
    pub id: ForgeId,
    /// The site domain
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub directory: Option<String>,
    /// `installing` while Forge sets the site up, `installed` afterwards
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub php_version: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub repository_branch: Option<String>,
    #[serde(default)]
    pub repository_status: Option<String>,
    /// Non-null while a deployment is queued or running
    #[serde(default)]
    pub deployment_status: Option<String>,
}

impl Site {
    /// Whether Forge has finished installing the site
    pub fn is_installed(&self) -> bool {
        self.status.as_deref() == Some("installed")
    }
}

/// Site creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSiteRequest {
    pub domain: String,
    pub project_type: String,
    pub aliases: Vec<String>,
    pub directory: String,
    pub isolated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nginx_template: Option<ForgeId>,
}

/// Repository installation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallRepositoryRequest {
    pub provider: String,
    pub repository: String,
    pub branch: String,
    pub composer: bool,
}

/// Alias replacement payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasesRequest {
    pub aliases: Vec<String>,
}

/// Deployment script payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentScriptRequest {
    pub content: String,
    pub auto_source: bool,
}

/// An entry of the site's deployment history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: ForgeId,
    pub status: String,
    #[serde(default)]
    pub commit_hash: Option<String>,
}

// ---------------------------------------------------------------------------
// Nginx
// ---------------------------------------------------------------------------

/// A server-level nginx template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NginxTemplate {
    pub id: ForgeId,
    pub name: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// Nginx template payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NginxTemplateRequest {
    pub name: String,
    pub content: String,
}

/// Generic `{ "content": ... }` payload used by env and nginx endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRequest {
    pub content: String,
}

// ---------------------------------------------------------------------------
// Certificates
// ---------------------------------------------------------------------------

/// An SSL certificate attached to a site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: ForgeId,
    /// Comma-separated list of covered domains
    pub domain: String,
    pub status: String,
    #[serde(default)]
    pub active: bool,
}

impl Certificate {
    /// The domains covered by the certificate
    pub fn domains(&self) -> Vec<&str> {
        self.domain
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .collect()
    }

    pub fn is_installed(&self) -> bool {
        self.status == "installed"
    }
}

/// Let's Encrypt certificate request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LetsEncryptRequest {
    pub domains: Vec<String>,
}

// ---------------------------------------------------------------------------
// Daemons, jobs, php
// ---------------------------------------------------------------------------

/// A supervisor-managed daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Daemon {
    pub id: ForgeId,
    pub command: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Daemon creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDaemonRequest {
    pub command: String,
    pub user: String,
    pub directory: String,
    pub startsecs: u32,
}

/// A scheduled (cron) job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: ForgeId,
    pub command: String,
    #[serde(default)]
    pub frequency: Option<String>,
}

/// Job creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub command: String,
    pub frequency: String,
    pub user: String,
}

/// A PHP version installed (or installing) on a server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhpVersion {
    #[serde(default)]
    pub id: Option<ForgeId>,
    /// Short form, e.g. `php83`
    pub version: String,
    pub status: String,
}

/// `{ "version": ... }` payload used by the php endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRequest {
    pub version: String,
}
