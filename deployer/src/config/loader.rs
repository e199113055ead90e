//! Deployment document loading
//!
//! Parses the YAML document, substitutes secret placeholders, validates it and
//! applies document-level defaults to every site. The result is a fully
//! concrete [`DeploymentSpec`]; nothing downstream falls back to defaults.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use serde_yaml::Value;
use tracing::debug;

use crate::config::env::{env_key, merge_env, parse_env};
use crate::config::model::{
    relative_dir, DaemonSpec, DeploymentSpec, EnvVars, ProjectType, ServerProvisioning, SiteSpec,
};
use crate::config::schema::{
    describe_value, scalar_to_string, RawDocument, RawEnvironment, RawServer, RawSite, BOOL_FIELDS,
};
use crate::config::secrets::SecretMap;
use crate::errors::ConfigError;

const DEFAULT_BRANCH: &str = "main";
const DEFAULT_ROOT_DIR: &str = "/";
const DEFAULT_WEB_DIR: &str = "/public";
const DEFAULT_PROJECT_TYPE: &str = "html";
const DEFAULT_NGINX_TEMPLATE: &str = "default";

/// Loads deployment documents relative to a workspace directory
#[derive(Debug, Clone)]
pub struct DeploymentLoader {
    workspace: PathBuf,
}

impl DeploymentLoader {
    /// `workspace` is the directory `env_file` and `nginx_custom_config` paths are relative to
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }

    /// Parse, resolve and validate a document
    pub async fn load(&self, text: &str, secrets: &SecretMap) -> Result<DeploymentSpec, ConfigError> {
        let mut document: Value = serde_yaml::from_str(text)?;
        if document.is_null() {
            return Err(ConfigError::MissingField {
                field: "server_name".to_string(),
                site: None,
            });
        }

        secrets.substitute_value(&mut document, "")?;

        let raw: RawDocument = serde_yaml::from_value(document)?;

        let server_name = required(raw.server_name, "server_name")?;
        let github_repository = required(raw.github_repository, "github_repository")?;
        let github_branch = non_empty(raw.github_branch).unwrap_or_else(|| DEFAULT_BRANCH.to_string());

        let mut seen = HashSet::new();
        let mut sites = Vec::with_capacity(raw.sites.len());
        for (idx, value) in raw.sites.into_iter().enumerate() {
            let site = self
                .load_site(idx, value, &github_branch, secrets)
                .await?;
            if !seen.insert(site.site_domain.clone()) {
                return Err(ConfigError::DuplicateDomain {
                    domain: site.site_domain,
                });
            }
            sites.push(site);
        }

        debug!(
            "Loaded deployment for server `{}` with {} site(s)",
            server_name,
            sites.len()
        );

        Ok(DeploymentSpec {
            server_name,
            github_repository,
            github_branch,
            server: raw.server.map(provisioning),
            sites,
        })
    }

    async fn load_site(
        &self,
        idx: usize,
        value: Value,
        default_branch: &str,
        secrets: &SecretMap,
    ) -> Result<SiteSpec, ConfigError> {
        let label = site_label(idx, &value);
        check_bool_fields(&label, &value)?;

        let raw: RawSite = serde_yaml::from_value(value).map_err(|e| ConfigError::InvalidSite {
            site: label.clone(),
            message: e.to_string(),
        })?;

        // Forge matches domains case-insensitively
        let site_domain = non_empty(raw.site_domain)
            .map(|domain| domain.to_ascii_lowercase())
            .ok_or_else(|| ConfigError::MissingField {
                field: "site_domain".to_string(),
                site: Some(label.clone()),
            })?;

        let environment = self
            .load_environment(&site_domain, raw.env_file.as_deref(), raw.environment, secrets)
            .await?;

        let mut nginx_template_variables = BTreeMap::new();
        for (name, value) in raw.nginx_template_variables {
            let text = scalar_to_string(&value).ok_or_else(|| ConfigError::InvalidSite {
                site: site_domain.clone(),
                message: format!("nginx variable `{}` must be a scalar", name),
            })?;
            nginx_template_variables.insert(name.trim().to_string(), text);
        }

        let mut aliases: Vec<String> = Vec::new();
        for alias in raw.aliases {
            let alias = alias.trim().to_string();
            if !alias.is_empty() && !aliases.contains(&alias) {
                aliases.push(alias);
            }
        }

        Ok(SiteSpec {
            github_branch: non_empty(raw.github_branch).unwrap_or_else(|| default_branch.to_string()),
            root_dir: relative_dir(raw.root_dir.as_deref().unwrap_or(DEFAULT_ROOT_DIR)),
            web_dir: relative_dir(raw.web_dir.as_deref().unwrap_or(DEFAULT_WEB_DIR)),
            project_type: ProjectType::parse(
                raw.project_type.as_deref().unwrap_or(DEFAULT_PROJECT_TYPE),
            ),
            php_version: non_empty(raw.php_version),
            deployment_commands: raw
                .deployment_commands
                .map(|c| c.into_commands())
                .unwrap_or_default(),
            environment,
            aliases,
            nginx_template: non_empty(raw.nginx_template)
                .unwrap_or_else(|| DEFAULT_NGINX_TEMPLATE.to_string()),
            nginx_template_variables,
            nginx_custom_config: non_empty(raw.nginx_custom_config).map(|p| self.resolve_path(&p)),
            certificate: raw.certificate.unwrap_or(false),
            clone_repository: raw.clone_repository.unwrap_or(true),
            daemons: raw
                .daemons
                .iter()
                .map(|d| DaemonSpec {
                    command: d.command().trim().to_string(),
                })
                .filter(|d| !d.command.is_empty())
                .collect(),
            laravel_scheduler: raw.laravel_scheduler,
            site_domain,
        })
    }

    async fn load_environment(
        &self,
        site: &str,
        env_file: Option<&str>,
        inline: Option<RawEnvironment>,
        secrets: &SecretMap,
    ) -> Result<EnvVars, ConfigError> {
        let file_vars = match env_file.map(str::trim).filter(|p| !p.is_empty()) {
            Some(file) => {
                let path = self.resolve_path(file);
                let content = tokio::fs::read_to_string(&path).await.map_err(|source| {
                    ConfigError::EnvFile {
                        site: site.to_string(),
                        path: path.clone(),
                        source,
                    }
                })?;
                let location = format!("env file `{}`", file);
                let content = secrets.substitute(&content, &location)?;
                debug!("Loaded env file `{}` for site `{}`", file, site);
                parse_env(&content, &location)
            }
            None => EnvVars::new(),
        };

        let inline_vars = match inline {
            Some(RawEnvironment::Block(block)) => {
                parse_env(&block, &format!("environment of `{}`", site))
            }
            Some(RawEnvironment::Map(map)) => {
                let mut vars = EnvVars::new();
                for (key, value) in map {
                    let text = scalar_to_string(&value).ok_or_else(|| ConfigError::InvalidSite {
                        site: site.to_string(),
                        message: format!("environment variable `{}` must be a scalar", key),
                    })?;
                    vars.insert(env_key(&key), text);
                }
                vars
            }
            None => EnvVars::new(),
        };

        Ok(merge_env(file_vars, inline_vars))
    }

    /// Paths in the document are relative to the workspace even with a leading `/`
    fn resolve_path(&self, path: &str) -> PathBuf {
        self.workspace.join(path.trim_start_matches('/'))
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, ConfigError> {
    non_empty(value).ok_or_else(|| ConfigError::MissingField {
        field: field.to_string(),
        site: None,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn site_label(idx: usize, value: &Value) -> String {
    value
        .get("site_domain")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("sites[{}]", idx))
}

fn check_bool_fields(site: &str, value: &Value) -> Result<(), ConfigError> {
    for field in BOOL_FIELDS {
        match value.get(*field) {
            None | Some(Value::Null) | Some(Value::Bool(_)) => {}
            Some(other) => {
                return Err(ConfigError::TypeMismatch {
                    field: field.to_string(),
                    site: site.to_string(),
                    expected: "true or false".to_string(),
                    found: describe_value(other),
                })
            }
        }
    }
    Ok(())
}

fn provisioning(raw: RawServer) -> ServerProvisioning {
    ServerProvisioning {
        provider: non_empty(raw.provider).unwrap_or_else(|| "custom".to_string()),
        server_type: non_empty(raw.server_type).unwrap_or_else(|| "app".to_string()),
        credential_id: raw.credential_id,
        region: non_empty(raw.region),
        size: non_empty(raw.size),
        ip_address: non_empty(raw.ip_address),
        private_ip_address: non_empty(raw.private_ip_address),
        php_version: non_empty(raw.php_version),
        database_type: non_empty(raw.database_type),
    }
}
