//! Run report

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use colored::Colorize;
use thiserror::Error;
use uuid::Uuid;

use crate::deploy::fsm::SiteState;
use crate::errors::DeployError;

/// Pipeline steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Server,
    Site,
    PhpVersionInstall,
    Repository,
    Environment,
    DeploymentScript,
    Aliases,
    Nginx,
    Certificate,
    Daemons,
    Scheduler,
    Deploy,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Server => "server",
            Step::Site => "site",
            Step::PhpVersionInstall => "php_version_install",
            Step::Repository => "repository",
            Step::Environment => "environment",
            Step::DeploymentScript => "deployment_script",
            Step::Aliases => "aliases",
            Step::Nginx => "nginx",
            Step::Certificate => "certificate",
            Step::Daemons => "daemons",
            Step::Scheduler => "scheduler",
            Step::Deploy => "deploy",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The step a site failed at and why
#[derive(Error, Debug)]
#[error("step `{step}` failed: {error}")]
pub struct SiteFailure {
    pub step: Step,
    #[source]
    pub error: DeployError,
}

impl SiteFailure {
    pub fn new(step: Step, error: impl Into<DeployError>) -> Self {
        Self {
            step,
            error: error.into(),
        }
    }
}

/// Terminal result of one site pipeline
#[derive(Debug)]
pub struct SiteOutcome {
    pub domain: String,
    pub state: SiteState,
    /// The site did not exist before this run
    pub created: bool,
    pub failure: Option<SiteFailure>,
    pub elapsed: Duration,
}

impl SiteOutcome {
    pub fn is_success(&self) -> bool {
        self.state == SiteState::Succeeded
    }

    /// Step the site failed at
    pub fn failed_step(&self) -> Option<Step> {
        self.failure.as_ref().map(|f| f.step)
    }
}

/// Per-site results of one run, in declaration order
#[derive(Debug)]
pub struct DeploymentReport {
    pub run_id: Uuid,
    pub server_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sites: Vec<SiteOutcome>,
}

impl DeploymentReport {
    /// Whether every site succeeded
    pub fn is_success(&self) -> bool {
        self.sites.iter().all(SiteOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SiteOutcome> {
        self.sites.iter().filter(|s| !s.is_success())
    }

    pub fn site(&self, domain: &str) -> Option<&SiteOutcome> {
        self.sites.iter().find(|s| s.domain == domain)
    }

    /// Human readable summary, one line per site
    pub fn render(&self) -> String {
        let mut lines = vec![format!(
            "Deployment {} on `{}` ({}s)",
            self.run_id,
            self.server_name,
            (self.finished_at - self.started_at).num_seconds()
        )];

        for site in &self.sites {
            let line = match &site.failure {
                None => format!(
                    "  {} {} ({:.1}s{})",
                    "✔".green(),
                    site.domain.bold(),
                    site.elapsed.as_secs_f64(),
                    if site.created { ", created" } else { "" }
                ),
                Some(failure) => format!(
                    "  {} {} failed at {}: {}",
                    "✘".red(),
                    site.domain.bold(),
                    failure.step.to_string().yellow(),
                    failure.error
                ),
            };
            lines.push(line);
        }

        let failed = self.failures().count();
        lines.push(if failed == 0 {
            format!("{} site(s) deployed", self.sites.len()).green().to_string()
        } else {
            format!("{} of {} site(s) failed", failed, self.sites.len())
                .red()
                .to_string()
        });

        lines.join("\n")
    }
}
