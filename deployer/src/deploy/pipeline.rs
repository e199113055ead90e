//! Per-site reconciliation pipeline
//!
//! Steps run strictly in order; the first failing step ends the pipeline for
//! that site only. Every step checks the remote state first and only issues
//! the calls needed to converge.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Instant;

use forge_models::{
    CreateDaemonRequest, CreateJobRequest, CreateSiteRequest, Daemon, DeploymentScriptRequest, ForgeId,
    InstallRepositoryRequest, NginxTemplateRequest, Server, Site,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{DeploymentSpec, ProjectType, SiteSpec};
use crate::deploy::executor::ReconcileOptions;
use crate::deploy::fsm::{SiteEvent, SiteFsm};
use crate::deploy::poll::{poll_until, PollStatus};
use crate::deploy::report::{SiteFailure, SiteOutcome, Step};
use crate::deploy::script::{build_deploy_script, scheduler_command};
use crate::errors::{DeployError, TemplateError};
use crate::http::api::ForgeApi;
use crate::nginx::NginxConfig;

const FORGE_USER: &str = "forge";
const INSTALLED: &str = "installed";

/// Run one step, tagging its error with the step name
async fn step<T>(
    step: Step,
    fut: impl Future<Output = Result<T, DeployError>>,
) -> Result<T, SiteFailure> {
    debug!("Step `{}`", step);
    fut.await.map_err(|error| SiteFailure::new(step, error))
}

fn is_failed(status: &str) -> bool {
    status.contains("fail")
}

/// Shared context of the site pipelines of one run
pub struct SitePipeline<'a> {
    api: &'a dyn ForgeApi,
    server: &'a Server,
    deployment: &'a DeploymentSpec,
    options: &'a ReconcileOptions,
    /// Sites sharing a template must not register it twice
    templates: Mutex<()>,
}

impl<'a> SitePipeline<'a> {
    pub fn new(
        api: &'a dyn ForgeApi,
        server: &'a Server,
        deployment: &'a DeploymentSpec,
        options: &'a ReconcileOptions,
    ) -> Self {
        Self {
            api,
            server,
            deployment,
            options,
            templates: Mutex::new(()),
        }
    }

    /// Reconcile one site; never fails, the outcome carries the failure
    pub async fn run(
        &self,
        spec: &SiteSpec,
        existing: Option<Site>,
        nginx: Result<NginxConfig, TemplateError>,
    ) -> SiteOutcome {
        let started = Instant::now();
        let mut fsm = SiteFsm::new();
        let created = existing.is_none();

        let result = self.run_steps(&mut fsm, spec, existing, nginx).await;
        let event = match &result {
            Ok(()) => SiteEvent::Succeed,
            Err(failure) => SiteEvent::Fail(failure.to_string()),
        };
        if let Err(e) = fsm.process(event) {
            warn!("{}", e);
        }

        match &result {
            Ok(()) => info!("Site `{}` deployed", spec.site_domain),
            Err(failure) => error!("Site `{}` failed: {}", spec.site_domain, failure),
        }

        SiteOutcome {
            domain: spec.site_domain.clone(),
            state: fsm.state(),
            created,
            failure: result.err(),
            elapsed: started.elapsed(),
        }
    }

    async fn run_steps(
        &self,
        fsm: &mut SiteFsm,
        spec: &SiteSpec,
        existing: Option<Site>,
        nginx: Result<NginxConfig, TemplateError>,
    ) -> Result<(), SiteFailure> {
        let site = match existing {
            Some(site) => {
                transition(fsm, SiteEvent::Found, Step::Site)?;
                info!("Site `{}` found (id {})", spec.site_domain, site.id);
                step(Step::Site, self.await_site_installed(site)).await?
            }
            None => {
                transition(fsm, SiteEvent::Create, Step::Site)?;
                step(Step::Site, self.create_site(spec, nginx.as_ref().ok())).await?
            }
        };
        transition(fsm, SiteEvent::Configure, Step::Site)?;

        let site = step(Step::PhpVersionInstall, self.ensure_php(spec, site)).await?;
        let site = step(Step::Repository, self.ensure_repository(spec, site)).await?;
        step(Step::Environment, self.apply_environment(spec, &site)).await?;
        step(Step::DeploymentScript, self.apply_deployment_script(spec, &site, &[])).await?;
        step(Step::Aliases, self.apply_aliases(spec, &site)).await?;
        step(Step::Nginx, self.apply_nginx(&site, nginx)).await?;

        if spec.certificate {
            transition(fsm, SiteEvent::RequestCertificate, Step::Certificate)?;
            step(Step::Certificate, self.ensure_certificate(spec, &site)).await?;
        }

        let created = step(Step::Daemons, self.ensure_daemons(spec)).await?;
        if !created.is_empty() {
            step(
                Step::DeploymentScript,
                self.apply_deployment_script(spec, &site, &created),
            )
            .await?;
        }
        step(Step::Scheduler, self.ensure_scheduler(spec, &site)).await?;

        transition(fsm, SiteEvent::Deploy, Step::Deploy)?;
        step(Step::Deploy, self.deploy(spec, &site)).await
    }

    // ---------------------------------------------------------------- site

    async fn create_site(&self, spec: &SiteSpec, nginx: Option<&NginxConfig>) -> Result<Site, DeployError> {
        let template_id = match nginx {
            Some(config) => match config.template_name() {
                Some(name) => Some(self.register_template(name, &config.content).await?),
                None => None,
            },
            None => None,
        };

        let request = CreateSiteRequest {
            domain: spec.site_domain.clone(),
            project_type: spec.project_type.as_str().to_string(),
            aliases: spec.aliases.clone(),
            directory: spec.web_directory(),
            isolated: false,
            nginx_template: template_id,
        };
        let site = self.api.create_site(self.server.id, &request).await?;
        info!("Created site `{}` (id {})", spec.site_domain, site.id);

        self.await_site_installed(site).await
    }

    async fn await_site_installed(&self, site: Site) -> Result<Site, DeployError> {
        if site.is_installed() {
            return Ok(site);
        }
        let (server_id, site_id) = (self.server.id, site.id);
        poll_until("site installation", &self.options.poll, || async move {
            let site = self.api.get_site(server_id, site_id).await?;
            Ok::<_, DeployError>(match site.status.as_deref() {
                Some(INSTALLED) => PollStatus::Done(site),
                Some(status) if is_failed(status) => PollStatus::Failed(status.to_string()),
                _ => PollStatus::Pending,
            })
        })
        .await
    }

    /// Create or update the server-level template, returning its id
    async fn register_template(&self, name: &str, content: &str) -> Result<ForgeId, DeployError> {
        let _guard = self.templates.lock().await;
        let templates = self.api.list_nginx_templates(self.server.id).await?;
        let request = NginxTemplateRequest {
            name: name.to_string(),
            content: content.to_string(),
        };

        match templates.into_iter().find(|t| t.name == name) {
            Some(template) => {
                let current = self.api.get_nginx_template(self.server.id, template.id).await?;
                if current.content.as_deref() != Some(content) {
                    info!("Updating nginx template `{}`", name);
                    self.api
                        .update_nginx_template(self.server.id, template.id, &request)
                        .await?;
                }
                Ok(template.id)
            }
            None => {
                info!("Creating nginx template `{}`", name);
                let template = self.api.create_nginx_template(self.server.id, &request).await?;
                Ok(template.id)
            }
        }
    }

    // ----------------------------------------------------------------- php

    async fn ensure_php(&self, spec: &SiteSpec, mut site: Site) -> Result<Site, DeployError> {
        let Some(version) = spec.php_version.as_deref() else {
            return Ok(site);
        };
        if site.php_version.as_deref() == Some(version) {
            return Ok(site);
        }

        let server_id = self.server.id;
        let installed = self
            .api
            .list_php_versions(server_id)
            .await?
            .into_iter()
            .find(|v| v.version == version);

        let ready = match installed {
            Some(v) if v.status == INSTALLED => true,
            Some(v) if is_failed(&v.status) => {
                return Err(DeployError::OperationFailed {
                    operation: format!("{} install", version),
                    status: v.status,
                })
            }
            Some(_) => false,
            None => {
                info!("Installing {} on `{}`", version, self.server.name);
                self.api.install_php(server_id, version).await?;
                false
            }
        };

        if !ready {
            let operation = format!("{} install", version);
            poll_until(&operation, &self.options.poll, || async move {
                let versions = self.api.list_php_versions(server_id).await?;
                Ok::<_, DeployError>(match versions.into_iter().find(|v| v.version == version) {
                    Some(v) if v.status == INSTALLED => PollStatus::Done(()),
                    Some(v) if is_failed(&v.status) => PollStatus::Failed(v.status),
                    _ => PollStatus::Pending,
                })
            })
            .await?;
        }

        self.api.set_site_php(server_id, site.id, version).await?;
        info!("Site `{}` now runs {}", spec.site_domain, version);
        site.php_version = Some(version.to_string());
        Ok(site)
    }

    // ---------------------------------------------------------- repository

    async fn ensure_repository(&self, spec: &SiteSpec, site: Site) -> Result<Site, DeployError> {
        if !spec.clone_repository {
            return Ok(site);
        }

        let repository = &self.deployment.github_repository;
        if site.repository.as_deref() == Some(repository.as_str())
            && site.repository_status.as_deref() == Some(INSTALLED)
        {
            if site.repository_branch.as_deref() != Some(spec.github_branch.as_str()) {
                warn!(
                    "Site `{}` tracks branch {:?}, expected `{}`; leaving it untouched",
                    spec.site_domain, site.repository_branch, spec.github_branch
                );
            }
            return Ok(site);
        }

        let request = InstallRepositoryRequest {
            provider: "github".to_string(),
            repository: repository.clone(),
            branch: spec.github_branch.clone(),
            composer: false,
        };
        info!(
            "Installing repository {}@{} on `{}`",
            repository, spec.github_branch, spec.site_domain
        );
        self.api
            .install_repository(self.server.id, site.id, &request)
            .await?;

        let (server_id, site_id) = (self.server.id, site.id);
        poll_until("repository clone", &self.options.poll, || async move {
            let site = self.api.get_site(server_id, site_id).await?;
            Ok::<_, DeployError>(match site.repository_status.as_deref() {
                Some(INSTALLED) => PollStatus::Done(site),
                Some(status) if is_failed(status) => PollStatus::Failed(status.to_string()),
                _ => PollStatus::Pending,
            })
        })
        .await
    }

    // ------------------------------------------------------- configuration

    async fn apply_environment(&self, spec: &SiteSpec, site: &Site) -> Result<(), DeployError> {
        if spec.environment.is_empty() {
            return Ok(());
        }
        self.api
            .set_environment(self.server.id, site.id, &spec.environment.to_env_string())
            .await?;
        info!(
            "Applied {} environment variable(s) to `{}`",
            spec.environment.len(),
            spec.site_domain
        );
        Ok(())
    }

    /// `created` holds daemons made later in this run, listing may not show them yet
    async fn apply_deployment_script(
        &self,
        spec: &SiteSpec,
        site: &Site,
        created: &[ForgeId],
    ) -> Result<(), DeployError> {
        if spec.deployment_commands.is_empty() {
            return Ok(());
        }
        let mut daemon_ids = self.site_daemon_ids(spec).await?;
        for id in created {
            if !daemon_ids.contains(id) {
                daemon_ids.push(*id);
            }
        }
        let request = DeploymentScriptRequest {
            content: build_deploy_script(spec, &daemon_ids),
            auto_source: false,
        };
        self.api
            .set_deployment_script(self.server.id, site.id, &request)
            .await?;
        Ok(())
    }

    /// Full replace; nothing is sent when the sets already match
    async fn apply_aliases(&self, spec: &SiteSpec, site: &Site) -> Result<(), DeployError> {
        let desired: BTreeSet<&str> = spec.aliases.iter().map(String::as_str).collect();
        let current: BTreeSet<&str> = site.aliases.iter().map(String::as_str).collect();
        if desired == current {
            return Ok(());
        }
        self.api
            .set_aliases(self.server.id, site.id, &spec.aliases)
            .await?;
        info!("Aliases of `{}` set to {:?}", spec.site_domain, spec.aliases);
        Ok(())
    }

    /// Custom files replace the live config; template variables are rendered into it
    async fn apply_nginx(
        &self,
        site: &Site,
        nginx: Result<NginxConfig, TemplateError>,
    ) -> Result<(), DeployError> {
        let config = nginx?;
        let current = self.api.get_nginx_config(self.server.id, site.id).await?;
        let desired = config.apply_to(&current)?;
        if current == desired {
            return Ok(());
        }
        self.api
            .set_nginx_config(self.server.id, site.id, &desired)
            .await?;
        info!("Nginx config of `{}` replaced", site.name);
        Ok(())
    }

    // --------------------------------------------------------- certificate

    async fn ensure_certificate(&self, spec: &SiteSpec, site: &Site) -> Result<(), DeployError> {
        let (server_id, site_id) = (self.server.id, site.id);
        let domains = spec.certificate_domains();
        let wanted: BTreeSet<&str> = domains.iter().map(String::as_str).collect();

        let existing = self
            .api
            .list_certificates(server_id, site_id)
            .await?
            .into_iter()
            .find(|c| c.domains().into_iter().collect::<BTreeSet<_>>() == wanted);

        let certificate = match existing {
            Some(certificate) if certificate.is_installed() => certificate,
            Some(certificate) if is_failed(&certificate.status) => {
                return Err(DeployError::OperationFailed {
                    operation: "certificate issuance".to_string(),
                    status: certificate.status,
                })
            }
            existing => {
                let certificate_id = match existing {
                    Some(certificate) => certificate.id,
                    None => {
                        info!("Requesting certificate for {:?}", domains);
                        self.api
                            .request_certificate(server_id, site_id, &domains)
                            .await?
                            .id
                    }
                };
                poll_until("certificate issuance", &self.options.poll, || async move {
                    let certificate = self
                        .api
                        .get_certificate(server_id, site_id, certificate_id)
                        .await?;
                    Ok::<_, DeployError>(if certificate.is_installed() {
                        PollStatus::Done(certificate)
                    } else if is_failed(&certificate.status) {
                        PollStatus::Failed(certificate.status)
                    } else {
                        PollStatus::Pending
                    })
                })
                .await?
            }
        };

        if !certificate.active {
            self.api
                .activate_certificate(server_id, site_id, certificate.id)
                .await?;
            info!("Activated certificate {} for `{}`", certificate.id, spec.site_domain);
        }
        Ok(())
    }

    // ----------------------------------------------------- daemons, cron

    async fn site_daemons(&self, spec: &SiteSpec) -> Result<Vec<Daemon>, DeployError> {
        let directory = spec.site_dir();
        Ok(self
            .api
            .list_daemons(self.server.id)
            .await?
            .into_iter()
            .filter(|d| d.directory.as_deref().map(|d| d.trim_end_matches('/')) == Some(directory.as_str()))
            .collect())
    }

    async fn site_daemon_ids(&self, spec: &SiteSpec) -> Result<Vec<ForgeId>, DeployError> {
        Ok(self.site_daemons(spec).await?.into_iter().map(|d| d.id).collect())
    }

    /// Additive only: daemons are matched by command within the site directory.
    /// Returns the ids of the daemons created.
    async fn ensure_daemons(&self, spec: &SiteSpec) -> Result<Vec<ForgeId>, DeployError> {
        let mut created_ids = Vec::new();
        if spec.daemons.is_empty() {
            return Ok(created_ids);
        }
        let directory = spec.site_dir();
        let mut commands: Vec<String> = self
            .site_daemons(spec)
            .await?
            .into_iter()
            .map(|d| d.command)
            .collect();

        for daemon in &spec.daemons {
            if commands.contains(&daemon.command) {
                continue;
            }
            let request = CreateDaemonRequest {
                command: daemon.command.clone(),
                user: FORGE_USER.to_string(),
                directory: directory.clone(),
                startsecs: 1,
            };
            let created = self.api.create_daemon(self.server.id, &request).await?;
            info!("Created daemon {} `{}`", created.id, daemon.command);
            commands.push(daemon.command.clone());
            created_ids.push(created.id);
        }
        Ok(created_ids)
    }

    async fn ensure_scheduler(&self, spec: &SiteSpec, site: &Site) -> Result<(), DeployError> {
        let Some(enabled) = spec.laravel_scheduler else {
            return Ok(());
        };
        if spec.project_type != ProjectType::Php {
            warn!(
                "Scheduler ignored for `{}`: not a php site",
                spec.site_domain
            );
            return Ok(());
        }
        let php_version = site
            .php_version
            .as_deref()
            .or(spec.php_version.as_deref())
            .or(self.server.php_version.as_deref())
            .ok_or_else(|| {
                DeployError::Invalid(format!(
                    "no php version known for the scheduler of `{}`",
                    spec.site_domain
                ))
            })?;

        let command = scheduler_command(php_version, &spec.site_dir());
        let existing = self
            .api
            .list_jobs(self.server.id)
            .await?
            .into_iter()
            .find(|job| job.command == command);

        match (enabled, existing) {
            (true, None) => {
                let request = CreateJobRequest {
                    command: command.clone(),
                    frequency: "minutely".to_string(),
                    user: FORGE_USER.to_string(),
                };
                self.api.create_job(self.server.id, &request).await?;
                info!("Scheduler enabled for `{}`", spec.site_domain);
            }
            (false, Some(job)) => {
                self.api.delete_job(self.server.id, job.id).await?;
                info!("Scheduler disabled for `{}`", spec.site_domain);
            }
            _ => {}
        }
        Ok(())
    }

    // -------------------------------------------------------------- deploy

    async fn deploy(&self, spec: &SiteSpec, site: &Site) -> Result<(), DeployError> {
        if site.repository.is_none() {
            info!("Skipping deployment of `{}`: no repository", spec.site_domain);
            return Ok(());
        }

        let (server_id, site_id) = (self.server.id, site.id);
        self.api.deploy_site(server_id, site_id).await?;
        info!("Deployment of `{}` started", spec.site_domain);

        poll_until("deployment", &self.options.deploy_poll, || async move {
            let site = self.api.get_site(server_id, site_id).await?;
            Ok::<_, DeployError>(match site.deployment_status {
                None => PollStatus::Done(()),
                Some(_) => PollStatus::Pending,
            })
        })
        .await?;

        if let Some(log) = self.api.get_deployment_log(server_id, site_id).await? {
            debug!("Deployment log of `{}`:\n{}", spec.site_domain, log);
        }

        let latest = self.api.list_deployments(server_id, site_id).await?.into_iter().next();
        match latest {
            Some(deployment) if is_failed(&deployment.status) => Err(DeployError::OperationFailed {
                operation: "deployment".to_string(),
                status: deployment.status,
            }),
            _ => Ok(()),
        }
    }
}

fn transition(fsm: &mut SiteFsm, event: SiteEvent, at: Step) -> Result<(), SiteFailure> {
    fsm.process(event)
        .map(|_| ())
        .map_err(|e| SiteFailure::new(at, DeployError::Invalid(e)))
}
