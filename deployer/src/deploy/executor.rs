//! Deployment reconciler
//!
//! Drives one run: remote state and nginx configs are resolved side by side,
//! the server is found or created, then every site pipeline runs with a
//! bounded concurrency. Site results are independent values collected in
//! declaration order.

use std::sync::Arc;

use chrono::Utc;
use forge_models::{CreateServerRequest, Server};
use futures::stream::{self, StreamExt};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::{DeploymentSpec, ServerProvisioning};
use crate::deploy::fsm::SiteState;
use crate::deploy::pipeline::SitePipeline;
use crate::deploy::poll::{poll_until, PollSettings, PollStatus};
use crate::deploy::report::{DeploymentReport, SiteFailure, SiteOutcome, Step};
use crate::errors::{DeployError, TemplateError};
use crate::http::api::ForgeApi;
use crate::nginx::NginxRenderer;
use crate::sync::resolver::StateResolver;

/// Reconciler options
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Maximum number of site pipelines running at once
    pub concurrency: usize,

    /// Polling of installs, clones and certificates
    pub poll: PollSettings,

    /// Polling of deployments
    pub deploy_poll: PollSettings,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            concurrency: 2,
            poll: PollSettings::default(),
            deploy_poll: PollSettings::deployment(),
        }
    }
}

/// Reconciles a deployment document against Forge
pub struct Reconciler {
    api: Arc<dyn ForgeApi>,
    renderer: NginxRenderer,
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(api: Arc<dyn ForgeApi>, renderer: NginxRenderer, options: ReconcileOptions) -> Self {
        Self {
            api,
            renderer,
            options,
        }
    }

    /// Reconcile every site of `spec`; site failures end up in the report
    pub async fn run(&self, spec: &DeploymentSpec) -> DeploymentReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", id = %run_id, server = %spec.server_name);
        self.run_inner(run_id, spec).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, spec: &DeploymentSpec) -> DeploymentReport {
        let started_at = Utc::now();
        info!(
            "Reconciling {} site(s) on `{}`",
            spec.sites.len(),
            spec.server_name
        );

        let resolver = StateResolver::new(self.api.as_ref());
        let domains = spec.domains();
        let (remote, mut configs) = tokio::join!(
            resolver.resolve(&spec.server_name, &domains),
            self.renderer.render_all(&spec.sites),
        );

        let (server, mut sites) = match remote {
            Ok(state) => match self.ensure_server(spec, state.server).await {
                Ok(server) => (server, state.sites),
                Err(e) => return self.abort(run_id, spec, started_at, e),
            },
            Err(e) => return self.abort(run_id, spec, started_at, e.into()),
        };

        let pipeline = SitePipeline::new(self.api.as_ref(), &server, spec, &self.options);
        let pipeline = &pipeline;
        let outcomes: Vec<SiteOutcome> = stream::iter(spec.sites.iter())
            .map(move |site| {
                let existing = sites.remove(&site.site_domain);
                let nginx = configs
                    .remove(&site.site_domain)
                    .unwrap_or_else(|| {
                        Err(TemplateError::Missing {
                            name: site.nginx_template.clone(),
                        })
                    });
                let span = info_span!("site", domain = %site.site_domain);
                pipeline.run(site, existing, nginx).instrument(span)
            })
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await;

        DeploymentReport {
            run_id,
            server_name: spec.server_name.clone(),
            started_at,
            finished_at: Utc::now(),
            sites: outcomes,
        }
    }

    /// The server is found by name, or created from the provisioning block
    async fn ensure_server(
        &self,
        spec: &DeploymentSpec,
        found: Option<Server>,
    ) -> Result<Server, DeployError> {
        if let Some(server) = found {
            info!("Server `{}` found (id {})", server.name, server.id);
            return Ok(server);
        }

        let provisioning = spec.server.as_ref().ok_or_else(|| {
            DeployError::Invalid(format!(
                "server `{}` not found and no `server` block to create it",
                spec.server_name
            ))
        })?;

        let request = create_server_request(&spec.server_name, provisioning);
        let server = self.api.create_server(&request).await?;
        info!("Created server `{}` (id {})", server.name, server.id);
        if server.is_ready {
            return Ok(server);
        }

        let api = self.api.as_ref();
        let server_id = server.id;
        poll_until("server provisioning", &self.options.poll, || async move {
            let server = api.get_server(server_id).await?;
            Ok::<_, DeployError>(if server.is_ready {
                PollStatus::Done(server)
            } else {
                PollStatus::Pending
            })
        })
        .await
    }

    /// Every site fails at the `server` step
    fn abort(
        &self,
        run_id: Uuid,
        spec: &DeploymentSpec,
        started_at: chrono::DateTime<Utc>,
        cause: DeployError,
    ) -> DeploymentReport {
        error!("Server `{}` unavailable: {}", spec.server_name, cause);
        let message = cause.to_string();
        let sites = spec
            .sites
            .iter()
            .map(|site| SiteOutcome {
                domain: site.site_domain.clone(),
                state: SiteState::Failed,
                created: false,
                failure: Some(SiteFailure::new(
                    Step::Server,
                    DeployError::Invalid(message.clone()),
                )),
                elapsed: Default::default(),
            })
            .collect();

        DeploymentReport {
            run_id,
            server_name: spec.server_name.clone(),
            started_at,
            finished_at: Utc::now(),
            sites,
        }
    }
}

fn create_server_request(name: &str, provisioning: &ServerProvisioning) -> CreateServerRequest {
    CreateServerRequest {
        name: name.to_string(),
        provider: provisioning.provider.clone(),
        server_type: provisioning.server_type.clone(),
        credential_id: provisioning.credential_id,
        region: provisioning.region.clone(),
        size: provisioning.size.clone(),
        ip_address: provisioning.ip_address.clone(),
        private_ip_address: provisioning.private_ip_address.clone(),
        php_version: provisioning.php_version.clone(),
        database_type: provisioning.database_type.clone(),
    }
}
