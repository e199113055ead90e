//! `{{ VARIABLE }}` substitution

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::errors::TemplateError;

/// Variables Forge fills in itself; documents may not define them
pub const RESERVED_VARIABLES: &[&str] = &[
    "DIRECTORY",
    "DOMAINS",
    "PATH",
    "PORT",
    "PORT_V6",
    "PROXY_PASS",
    "ROOT_PATH",
    "SERVER_PUBLIC_IP",
    "SERVER_PRIVATE_IP",
    "SITE",
    "SITE_ID",
    "USER",
    "PHP_SOCKET",
    "PHP_VERSION",
];

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.*?)\}\}").expect("valid variable regex"));

/// Output of [`render`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub content: String,
    /// Supplied variables that never appear in the template
    pub unused: Vec<String>,
}

/// Reject variables that collide with Forge's own
pub fn check_reserved(variables: &BTreeMap<String, String>) -> Result<(), TemplateError> {
    match variables
        .keys()
        .find(|name| RESERVED_VARIABLES.contains(&name.to_uppercase().as_str()))
    {
        Some(name) => Err(TemplateError::ReservedVariable { name: name.clone() }),
        None => Ok(()),
    }
}

/// Substitute `variables` into `template`.
///
/// Unknown tokens stay as they are so Forge can fill its reserved ones.
pub fn render(
    template: &str,
    variables: &BTreeMap<String, String>,
) -> Result<Rendered, TemplateError> {
    check_reserved(variables)?;

    let mut used = HashSet::new();
    let content = VARIABLE
        .replace_all(template, |caps: &Captures| {
            let name = caps[1].trim();
            match variables.get(name) {
                Some(value) => {
                    used.insert(name.to_string());
                    value.clone()
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned();

    let unused = variables
        .keys()
        .filter(|name| !used.contains(*name))
        .cloned()
        .collect();

    Ok(Rendered { content, unused })
}
