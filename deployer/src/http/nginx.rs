//! Nginx template and site config API client

use forge_models::{ContentRequest, ForgeId, NginxTemplate, NginxTemplateRequest};

use crate::errors::ApiError;
use crate::http::client::HttpClient;

impl HttpClient {
    /// Server-level nginx templates
    pub async fn list_nginx_templates(&self, server_id: ForgeId) -> Result<Vec<NginxTemplate>, ApiError> {
        self.get_list(&format!("servers/{}/nginx/templates", server_id), "templates")
            .await
    }

    pub async fn get_nginx_template(
        &self,
        server_id: ForgeId,
        template_id: ForgeId,
    ) -> Result<NginxTemplate, ApiError> {
        self.get_field(
            &format!("servers/{}/nginx/templates/{}", server_id, template_id),
            "template",
        )
        .await
    }

    pub async fn create_nginx_template(
        &self,
        server_id: ForgeId,
        request: &NginxTemplateRequest,
    ) -> Result<NginxTemplate, ApiError> {
        self.post_field(
            &format!("servers/{}/nginx/templates", server_id),
            request,
            "template",
        )
        .await
    }

    pub async fn update_nginx_template(
        &self,
        server_id: ForgeId,
        template_id: ForgeId,
        request: &NginxTemplateRequest,
    ) -> Result<(), ApiError> {
        self.put(
            &format!("servers/{}/nginx/templates/{}", server_id, template_id),
            request,
        )
        .await
    }

    /// Current nginx config of a site, as plain text
    pub async fn get_nginx_config(&self, server_id: ForgeId, site_id: ForgeId) -> Result<String, ApiError> {
        self.get_text(&format!("servers/{}/sites/{}/nginx", server_id, site_id))
            .await
    }

    /// Replace the nginx config of a site
    pub async fn set_nginx_config(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        content: &str,
    ) -> Result<(), ApiError> {
        let request = ContentRequest {
            content: content.to_string(),
        };
        self.put(
            &format!("servers/{}/sites/{}/nginx", server_id, site_id),
            &request,
        )
        .await
    }
}
