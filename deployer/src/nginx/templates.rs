//! Nginx template files

use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::debug;

use crate::errors::TemplateError;

/// Name of the template every site falls back to
pub const DEFAULT_TEMPLATE: &str = "default";

const BUILTIN_DEFAULT: &str = include_str!("../../nginx_templates/default.conf");

/// Looks up `<name>.conf` in a template directory
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    dir: Option<PathBuf>,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// A store holding only the built-in `default` template
    pub fn builtin() -> Self {
        Self { dir: None }
    }

    /// Raw text of the named template.
    ///
    /// A `default.conf` in the directory overrides the built-in default.
    pub async fn load(&self, name: &str) -> Result<String, TemplateError> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(TemplateError::Missing {
                name: name.to_string(),
            });
        }

        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{}.conf", name));
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    debug!("Loaded nginx template `{}` from {}", name, path.display());
                    return Ok(content);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(TemplateError::Read { path, source }),
            }
        }

        if name == DEFAULT_TEMPLATE {
            return Ok(BUILTIN_DEFAULT.to_string());
        }

        Err(TemplateError::Missing {
            name: name.to_string(),
        })
    }
}
