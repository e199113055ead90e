//! Remote state resolution
//!
//! Read-only lookups telling which of the desired server and sites already
//! exist on Forge. Absence is a normal result, not an error.

use std::collections::HashMap;

use forge_models::{ForgeId, Server, Site};
use tracing::{debug, info};

use crate::errors::ApiError;
use crate::http::api::ForgeApi;

/// What Forge currently holds for one deployment
#[derive(Debug, Clone, Default)]
pub struct RemoteState {
    pub server: Option<Server>,
    /// Existing sites keyed by desired domain
    pub sites: HashMap<String, Site>,
}

/// Looks up servers and sites by name
pub struct StateResolver<'a> {
    api: &'a dyn ForgeApi,
}

impl<'a> StateResolver<'a> {
    pub fn new(api: &'a dyn ForgeApi) -> Self {
        Self { api }
    }

    /// Resolve the server and, when it exists, the desired sites on it
    pub async fn resolve(&self, server_name: &str, domains: &[String]) -> Result<RemoteState, ApiError> {
        let server = self.find_server(server_name).await?;
        let sites = match &server {
            Some(server) => self.find_sites(server.id, domains).await?,
            None => HashMap::new(),
        };
        info!(
            "Remote state: server {}, {} of {} site(s) present",
            if server.is_some() { "found" } else { "missing" },
            sites.len(),
            domains.len()
        );
        Ok(RemoteState { server, sites })
    }

    pub async fn find_server(&self, name: &str) -> Result<Option<Server>, ApiError> {
        let servers = self.api.list_servers().await?;
        debug!("{} server(s) on the account", servers.len());
        Ok(servers.into_iter().find(|s| s.name == name))
    }

    /// Sites of the server whose domain is desired; domains compare case-insensitively
    pub async fn find_sites(&self, server_id: ForgeId, domains: &[String]) -> Result<HashMap<String, Site>, ApiError> {
        let mut found = HashMap::new();
        for site in self.api.list_sites(server_id).await? {
            if let Some(domain) = domains.iter().find(|d| d.eq_ignore_ascii_case(&site.name)) {
                found.insert(domain.clone(), site);
            }
        }
        Ok(found)
    }
}
