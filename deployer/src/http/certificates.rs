//! Certificate API client

use forge_models::{Certificate, ForgeId, LetsEncryptRequest};
use serde_json::json;

use crate::errors::ApiError;
use crate::http::client::HttpClient;

fn certificates_path(server_id: ForgeId, site_id: ForgeId) -> String {
    format!("servers/{}/sites/{}/certificates", server_id, site_id)
}

impl HttpClient {
    pub async fn list_certificates(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
    ) -> Result<Vec<Certificate>, ApiError> {
        self.get_list(&certificates_path(server_id, site_id), "certificates")
            .await
    }

    pub async fn get_certificate(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        certificate_id: ForgeId,
    ) -> Result<Certificate, ApiError> {
        self.get_field(
            &format!("{}/{}", certificates_path(server_id, site_id), certificate_id),
            "certificate",
        )
        .await
    }

    /// Ask Let's Encrypt for a certificate covering `domains`
    pub async fn request_certificate(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        domains: &[String],
    ) -> Result<Certificate, ApiError> {
        let request = LetsEncryptRequest {
            domains: domains.to_vec(),
        };
        self.post_field(
            &format!("{}/letsencrypt", certificates_path(server_id, site_id)),
            &request,
            "certificate",
        )
        .await
    }

    pub async fn activate_certificate(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        certificate_id: ForgeId,
    ) -> Result<(), ApiError> {
        self.post(
            &format!(
                "{}/{}/activate",
                certificates_path(server_id, site_id),
                certificate_id
            ),
            &json!({}),
        )
        .await
    }
}
