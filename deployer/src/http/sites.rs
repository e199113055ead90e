//! Site API client

use forge_models::{
    AliasesRequest, ContentRequest, CreateSiteRequest, Deployment, DeploymentScriptRequest, ForgeId,
    InstallRepositoryRequest, Site, VersionRequest,
};
use serde_json::json;

use crate::errors::ApiError;
use crate::http::client::HttpClient;

fn site_path(server_id: ForgeId, site_id: ForgeId) -> String {
    format!("servers/{}/sites/{}", server_id, site_id)
}

impl HttpClient {
    /// List the sites of a server
    pub async fn list_sites(&self, server_id: ForgeId) -> Result<Vec<Site>, ApiError> {
        self.get_list(&format!("servers/{}/sites", server_id), "sites")
            .await
    }

    pub async fn get_site(&self, server_id: ForgeId, site_id: ForgeId) -> Result<Site, ApiError> {
        self.get_field(&site_path(server_id, site_id), "site").await
    }

    pub async fn create_site(
        &self,
        server_id: ForgeId,
        request: &CreateSiteRequest,
    ) -> Result<Site, ApiError> {
        self.post_field(&format!("servers/{}/sites", server_id), request, "site")
            .await
    }

    /// Replace the site aliases
    pub async fn set_aliases(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        aliases: &[String],
    ) -> Result<(), ApiError> {
        let request = AliasesRequest {
            aliases: aliases.to_vec(),
        };
        self.put(&site_path(server_id, site_id), &request).await
    }

    pub async fn set_site_php(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        version: &str,
    ) -> Result<(), ApiError> {
        let request = VersionRequest {
            version: version.to_string(),
        };
        self.put(&format!("{}/php", site_path(server_id, site_id)), &request)
            .await
    }

    /// Attach a git repository; Forge clones it in the background
    pub async fn install_repository(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        request: &InstallRepositoryRequest,
    ) -> Result<(), ApiError> {
        self.post(&format!("{}/git", site_path(server_id, site_id)), request)
            .await
    }

    /// Replace the site `.env` file
    pub async fn set_environment(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        content: &str,
    ) -> Result<(), ApiError> {
        let request = ContentRequest {
            content: content.to_string(),
        };
        self.put(&format!("{}/env", site_path(server_id, site_id)), &request)
            .await
    }

    pub async fn set_deployment_script(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        request: &DeploymentScriptRequest,
    ) -> Result<(), ApiError> {
        self.put(
            &format!("{}/deployment/script", site_path(server_id, site_id)),
            request,
        )
        .await
    }

    /// Queue a deployment
    pub async fn deploy_site(&self, server_id: ForgeId, site_id: ForgeId) -> Result<(), ApiError> {
        self.post(
            &format!("{}/deployment/deploy", site_path(server_id, site_id)),
            &json!({}),
        )
        .await
    }

    /// Output of the latest deployment, `None` when Forge has none
    pub async fn get_deployment_log(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
    ) -> Result<Option<String>, ApiError> {
        match self
            .get_text(&format!("{}/deployment/log", site_path(server_id, site_id)))
            .await
        {
            Ok(log) => Ok(Some(log)),
            Err(e) if e.status() == Some(404) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Deployment history, newest first
    pub async fn list_deployments(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
    ) -> Result<Vec<Deployment>, ApiError> {
        self.get_list(
            &format!("{}/deployment-history", site_path(server_id, site_id)),
            "deployments",
        )
        .await
    }
}
