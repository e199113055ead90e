//! Daemon and scheduled job API client

use forge_models::{CreateDaemonRequest, CreateJobRequest, Daemon, ForgeId, Job};

use crate::errors::ApiError;
use crate::http::client::HttpClient;

impl HttpClient {
    /// Daemons of the whole server
    pub async fn list_daemons(&self, server_id: ForgeId) -> Result<Vec<Daemon>, ApiError> {
        self.get_list(&format!("servers/{}/daemons", server_id), "daemons")
            .await
    }

    pub async fn create_daemon(
        &self,
        server_id: ForgeId,
        request: &CreateDaemonRequest,
    ) -> Result<Daemon, ApiError> {
        self.post_field(&format!("servers/{}/daemons", server_id), request, "daemon")
            .await
    }

    pub async fn list_jobs(&self, server_id: ForgeId) -> Result<Vec<Job>, ApiError> {
        self.get_list(&format!("servers/{}/jobs", server_id), "jobs")
            .await
    }

    pub async fn create_job(&self, server_id: ForgeId, request: &CreateJobRequest) -> Result<Job, ApiError> {
        self.post_field(&format!("servers/{}/jobs", server_id), request, "job")
            .await
    }

    pub async fn delete_job(&self, server_id: ForgeId, job_id: ForgeId) -> Result<(), ApiError> {
        self.delete(&format!("servers/{}/jobs/{}", server_id, job_id))
            .await
    }
}
