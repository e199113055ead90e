//! Main application run

use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::info;

use crate::app::options::AppOptions;
use crate::config::{DeploymentLoader, DeploymentSpec, SecretMap};
use crate::deploy::{DeploymentReport, Reconciler};
use crate::errors::AppError;
use crate::http::{ForgeApi, HttpClient};
use crate::nginx::{NginxRenderer, TemplateStore};

/// Run one deployment against Forge
pub async fn run(options: AppOptions) -> Result<DeploymentReport, AppError> {
    let client = HttpClient::new(options.token.clone(), options.api.clone())?;
    deploy(&options, Arc::new(client)).await
}

/// Load the document, then reconcile it through `api`.
///
/// Configuration errors are returned before `api` is used.
pub async fn deploy(options: &AppOptions, api: Arc<dyn ForgeApi>) -> Result<DeploymentReport, AppError> {
    let spec = load(options).await?;

    let renderer = NginxRenderer::new(TemplateStore::new(options.paths.templates_dir()));
    let reconciler = Reconciler::new(api, renderer, options.reconcile.clone());
    Ok(reconciler.run(&spec).await)
}

/// Read and validate the deployment document
pub async fn load(options: &AppOptions) -> Result<DeploymentSpec, AppError> {
    let path = options.paths.deployment_path();
    let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| AppError::Document {
            path: path.clone(),
            source,
        })?;

    let secrets = SecretMap::parse(options.secrets.expose_secret())?;
    let loader = DeploymentLoader::new(&options.paths.workspace);
    let spec = loader.load(&text, &secrets).await?;

    info!(
        "Loaded {} ({} site(s), {} secret(s))",
        path.display(),
        spec.sites.len(),
        secrets.len()
    );
    Ok(spec)
}
