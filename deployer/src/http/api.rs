//! Forge operations used by the reconciler
//!
//! The reconciler only talks to Forge through [`ForgeApi`], so tests can swap
//! the HTTP client for an in-memory server.

use async_trait::async_trait;
use forge_models::{
    Certificate, CreateDaemonRequest, CreateJobRequest, CreateServerRequest, CreateSiteRequest, Daemon,
    Deployment, DeploymentScriptRequest, ForgeId, InstallRepositoryRequest, Job, NginxTemplate,
    NginxTemplateRequest, PhpVersion, Server, Site,
};

use crate::errors::ApiError;
use crate::http::client::HttpClient;

#[async_trait]
pub trait ForgeApi: Send + Sync {
    // servers
    async fn list_servers(&self) -> Result<Vec<Server>, ApiError>;
    async fn get_server(&self, server_id: ForgeId) -> Result<Server, ApiError>;
    async fn create_server(&self, request: &CreateServerRequest) -> Result<Server, ApiError>;

    // php
    async fn list_php_versions(&self, server_id: ForgeId) -> Result<Vec<PhpVersion>, ApiError>;
    async fn install_php(&self, server_id: ForgeId, version: &str) -> Result<(), ApiError>;
    async fn set_site_php(&self, server_id: ForgeId, site_id: ForgeId, version: &str) -> Result<(), ApiError>;

    // sites
    async fn list_sites(&self, server_id: ForgeId) -> Result<Vec<Site>, ApiError>;
    async fn get_site(&self, server_id: ForgeId, site_id: ForgeId) -> Result<Site, ApiError>;
    async fn create_site(&self, server_id: ForgeId, request: &CreateSiteRequest) -> Result<Site, ApiError>;
    async fn set_aliases(&self, server_id: ForgeId, site_id: ForgeId, aliases: &[String]) -> Result<(), ApiError>;
    async fn install_repository(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        request: &InstallRepositoryRequest,
    ) -> Result<(), ApiError>;
    async fn set_environment(&self, server_id: ForgeId, site_id: ForgeId, content: &str) -> Result<(), ApiError>;
    async fn set_deployment_script(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        request: &DeploymentScriptRequest,
    ) -> Result<(), ApiError>;

    // deployments
    async fn deploy_site(&self, server_id: ForgeId, site_id: ForgeId) -> Result<(), ApiError>;
    async fn get_deployment_log(&self, server_id: ForgeId, site_id: ForgeId) -> Result<Option<String>, ApiError>;
    async fn list_deployments(&self, server_id: ForgeId, site_id: ForgeId) -> Result<Vec<Deployment>, ApiError>;

    // nginx
    async fn list_nginx_templates(&self, server_id: ForgeId) -> Result<Vec<NginxTemplate>, ApiError>;
    async fn get_nginx_template(&self, server_id: ForgeId, template_id: ForgeId) -> Result<NginxTemplate, ApiError>;
    async fn create_nginx_template(
        &self,
        server_id: ForgeId,
        request: &NginxTemplateRequest,
    ) -> Result<NginxTemplate, ApiError>;
    async fn update_nginx_template(
        &self,
        server_id: ForgeId,
        template_id: ForgeId,
        request: &NginxTemplateRequest,
    ) -> Result<(), ApiError>;
    async fn get_nginx_config(&self, server_id: ForgeId, site_id: ForgeId) -> Result<String, ApiError>;
    async fn set_nginx_config(&self, server_id: ForgeId, site_id: ForgeId, content: &str) -> Result<(), ApiError>;

    // certificates
    async fn list_certificates(&self, server_id: ForgeId, site_id: ForgeId) -> Result<Vec<Certificate>, ApiError>;
    async fn get_certificate(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        certificate_id: ForgeId,
    ) -> Result<Certificate, ApiError>;
    async fn request_certificate(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        domains: &[String],
    ) -> Result<Certificate, ApiError>;
    async fn activate_certificate(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        certificate_id: ForgeId,
    ) -> Result<(), ApiError>;

    // daemons and jobs
    async fn list_daemons(&self, server_id: ForgeId) -> Result<Vec<Daemon>, ApiError>;
    async fn create_daemon(&self, server_id: ForgeId, request: &CreateDaemonRequest) -> Result<Daemon, ApiError>;
    async fn list_jobs(&self, server_id: ForgeId) -> Result<Vec<Job>, ApiError>;
    async fn create_job(&self, server_id: ForgeId, request: &CreateJobRequest) -> Result<Job, ApiError>;
    async fn delete_job(&self, server_id: ForgeId, job_id: ForgeId) -> Result<(), ApiError>;
}

#[async_trait]
impl ForgeApi for HttpClient {
    async fn list_servers(&self) -> Result<Vec<Server>, ApiError> {
        HttpClient::list_servers(self).await
    }

    async fn get_server(&self, server_id: ForgeId) -> Result<Server, ApiError> {
        HttpClient::get_server(self, server_id).await
    }

    async fn create_server(&self, request: &CreateServerRequest) -> Result<Server, ApiError> {
        HttpClient::create_server(self, request).await
    }

    async fn list_php_versions(&self, server_id: ForgeId) -> Result<Vec<PhpVersion>, ApiError> {
        HttpClient::list_php_versions(self, server_id).await
    }

    async fn install_php(&self, server_id: ForgeId, version: &str) -> Result<(), ApiError> {
        HttpClient::install_php(self, server_id, version).await
    }

    async fn set_site_php(&self, server_id: ForgeId, site_id: ForgeId, version: &str) -> Result<(), ApiError> {
        HttpClient::set_site_php(self, server_id, site_id, version).await
    }

    async fn list_sites(&self, server_id: ForgeId) -> Result<Vec<Site>, ApiError> {
        HttpClient::list_sites(self, server_id).await
    }

    async fn get_site(&self, server_id: ForgeId, site_id: ForgeId) -> Result<Site, ApiError> {
        HttpClient::get_site(self, server_id, site_id).await
    }

    async fn create_site(&self, server_id: ForgeId, request: &CreateSiteRequest) -> Result<Site, ApiError> {
        HttpClient::create_site(self, server_id, request).await
    }

    async fn set_aliases(&self, server_id: ForgeId, site_id: ForgeId, aliases: &[String]) -> Result<(), ApiError> {
        HttpClient::set_aliases(self, server_id, site_id, aliases).await
    }

    async fn install_repository(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        request: &InstallRepositoryRequest,
    ) -> Result<(), ApiError> {
        HttpClient::install_repository(self, server_id, site_id, request).await
    }

    async fn set_environment(&self, server_id: ForgeId, site_id: ForgeId, content: &str) -> Result<(), ApiError> {
        HttpClient::set_environment(self, server_id, site_id, content).await
    }

    async fn set_deployment_script(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        request: &DeploymentScriptRequest,
    ) -> Result<(), ApiError> {
        HttpClient::set_deployment_script(self, server_id, site_id, request).await
    }

    async fn deploy_site(&self, server_id: ForgeId, site_id: ForgeId) -> Result<(), ApiError> {
        HttpClient::deploy_site(self, server_id, site_id).await
    }

    async fn get_deployment_log(&self, server_id: ForgeId, site_id: ForgeId) -> Result<Option<String>, ApiError> {
        HttpClient::get_deployment_log(self, server_id, site_id).await
    }

    async fn list_deployments(&self, server_id: ForgeId, site_id: ForgeId) -> Result<Vec<Deployment>, ApiError> {
        HttpClient::list_deployments(self, server_id, site_id).await
    }

    async fn list_nginx_templates(&self, server_id: ForgeId) -> Result<Vec<NginxTemplate>, ApiError> {
        HttpClient::list_nginx_templates(self, server_id).await
    }

    async fn get_nginx_template(&self, server_id: ForgeId, template_id: ForgeId) -> Result<NginxTemplate, ApiError> {
        HttpClient::get_nginx_template(self, server_id, template_id).await
    }

    async fn create_nginx_template(
        &self,
        server_id: ForgeId,
        request: &NginxTemplateRequest,
    ) -> Result<NginxTemplate, ApiError> {
        HttpClient::create_nginx_template(self, server_id, request).await
    }

    async fn update_nginx_template(
        &self,
        server_id: ForgeId,
        template_id: ForgeId,
        request: &NginxTemplateRequest,
    ) -> Result<(), ApiError> {
        HttpClient::update_nginx_template(self, server_id, template_id, request).await
    }

    async fn get_nginx_config(&self, server_id: ForgeId, site_id: ForgeId) -> Result<String, ApiError> {
        HttpClient::get_nginx_config(self, server_id, site_id).await
    }

    async fn set_nginx_config(&self, server_id: ForgeId, site_id: ForgeId, content: &str) -> Result<(), ApiError> {
        HttpClient::set_nginx_config(self, server_id, site_id, content).await
    }

    async fn list_certificates(&self, server_id: ForgeId, site_id: ForgeId) -> Result<Vec<Certificate>, ApiError> {
        HttpClient::list_certificates(self, server_id, site_id).await
    }

    async fn get_certificate(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        certificate_id: ForgeId,
    ) -> Result<Certificate, ApiError> {
        HttpClient::get_certificate(self, server_id, site_id, certificate_id).await
    }

    async fn request_certificate(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        domains: &[String],
    ) -> Result<Certificate, ApiError> {
        HttpClient::request_certificate(self, server_id, site_id, domains).await
    }

    async fn activate_certificate(
        &self,
        server_id: ForgeId,
        site_id: ForgeId,
        certificate_id: ForgeId,
    ) -> Result<(), ApiError> {
        HttpClient::activate_certificate(self, server_id, site_id, certificate_id).await
    }

    async fn list_daemons(&self, server_id: ForgeId) -> Result<Vec<Daemon>, ApiError> {
        HttpClient::list_daemons(self, server_id).await
    }

    async fn create_daemon(&self, server_id: ForgeId, request: &CreateDaemonRequest) -> Result<Daemon, ApiError> {
        HttpClient::create_daemon(self, server_id, request).await
    }

    async fn list_jobs(&self, server_id: ForgeId) -> Result<Vec<Job>, ApiError> {
        HttpClient::list_jobs(self, server_id).await
    }

    async fn create_job(&self, server_id: ForgeId, request: &CreateJobRequest) -> Result<Job, ApiError> {
        HttpClient::create_job(self, server_id, request).await
    }

    async fn delete_job(&self, server_id: ForgeId, job_id: ForgeId) -> Result<(), ApiError> {
        HttpClient::delete_job(self, server_id, job_id).await
    }
}
