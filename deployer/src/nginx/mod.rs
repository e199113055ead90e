//! Nginx configuration for sites

pub mod render;
pub mod templates;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::config::SiteSpec;
use crate::errors::TemplateError;

pub use render::{render, Rendered, RESERVED_VARIABLES};
pub use templates::{TemplateStore, DEFAULT_TEMPLATE};

/// Where a site's nginx configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NginxSource {
    Custom(PathBuf),
    Template(String),
}

/// Nginx configuration of one site
///
/// For templates `content` is the raw template text: Forge fills its reserved
/// tokens when it creates a site from it, the caller variables are applied to
/// the site's live config afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NginxConfig {
    pub source: NginxSource,
    pub content: String,
    pub variables: BTreeMap<String, String>,
}

impl NginxConfig {
    /// Name of the server-level template to register, none for custom files
    pub fn template_name(&self) -> Option<&str> {
        match &self.source {
            NginxSource::Template(name) => Some(name),
            NginxSource::Custom(_) => None,
        }
    }

    /// Desired live config given the one currently on the site
    pub fn apply_to(&self, live: &str) -> Result<String, TemplateError> {
        match &self.source {
            NginxSource::Custom(_) => Ok(self.content.clone()),
            NginxSource::Template(_) => Ok(render(live, &self.variables)?.content),
        }
    }
}

/// Produces each site's nginx configuration from templates or custom files
#[derive(Debug, Clone)]
pub struct NginxRenderer {
    store: TemplateStore,
}

impl NginxRenderer {
    pub fn new(store: TemplateStore) -> Self {
        Self { store }
    }

    /// The custom file wins over the template; its content is used verbatim
    pub async fn resolve(&self, site: &SiteSpec) -> Result<NginxConfig, TemplateError> {
        if let Some(path) = &site.nginx_custom_config {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| TemplateError::Read {
                    path: path.clone(),
                    source,
                })?;
            debug!(
                "Using custom nginx config {} for `{}`",
                path.display(),
                site.site_domain
            );
            return Ok(NginxConfig {
                source: NginxSource::Custom(path.clone()),
                content,
                variables: BTreeMap::new(),
            });
        }

        let template = self.store.load(&site.nginx_template).await?;
        let unused = render(&template, &site.nginx_template_variables)?.unused;
        for name in &unused {
            warn!(
                "Nginx variable `{}` of `{}` does not appear in template `{}`",
                name, site.site_domain, site.nginx_template
            );
        }

        Ok(NginxConfig {
            source: NginxSource::Template(site.nginx_template.clone()),
            content: template,
            variables: site.nginx_template_variables.clone(),
        })
    }

    /// Resolve every site; failures stay attached to their site
    pub async fn render_all(
        &self,
        sites: &[SiteSpec],
    ) -> HashMap<String, Result<NginxConfig, TemplateError>> {
        let mut configs = HashMap::with_capacity(sites.len());
        for site in sites {
            configs.insert(site.site_domain.clone(), self.resolve(site).await);
        }
        configs
    }
}
