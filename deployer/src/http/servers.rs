//! Server and PHP API client

use forge_models::{CreateServerRequest, ForgeId, PhpVersion, Server, VersionRequest};

use crate::errors::ApiError;
use crate::http::client::HttpClient;

impl HttpClient {
    /// List every server of the account
    pub async fn list_servers(&self) -> Result<Vec<Server>, ApiError> {
        self.get_list("servers", "servers").await
    }

    pub async fn get_server(&self, server_id: ForgeId) -> Result<Server, ApiError> {
        self.get_field(&format!("servers/{}", server_id), "server").await
    }

    /// Start provisioning a server
    pub async fn create_server(&self, request: &CreateServerRequest) -> Result<Server, ApiError> {
        self.post_field("servers", request, "server").await
    }

    /// PHP versions installed or installing on the server
    pub async fn list_php_versions(&self, server_id: ForgeId) -> Result<Vec<PhpVersion>, ApiError> {
        self.get_list(&format!("servers/{}/php", server_id), "versions")
            .await
    }

    pub async fn install_php(&self, server_id: ForgeId, version: &str) -> Result<(), ApiError> {
        let request = VersionRequest {
            version: version.to_string(),
        };
        self.post(&format!("servers/{}/php", server_id), &request)
            .await
    }
}
