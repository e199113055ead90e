//! Raw document schema, as written by users

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::Value;

/// Boolean site fields; only `true`/`false` are accepted
pub const BOOL_FIELDS: &[&str] = &["certificate", "clone_repository", "laravel_scheduler", "scheduler"];

/// Document root
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDocument {
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub github_repository: Option<String>,
    #[serde(default)]
    pub github_branch: Option<String>,
    #[serde(default)]
    pub server: Option<RawServer>,
    /// Kept untyped so each site can be validated with its own context
    #[serde(default)]
    pub sites: Vec<Value>,
}

/// Optional server provisioning block
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawServer {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default, rename = "type")]
    pub server_type: Option<String>,
    #[serde(default)]
    pub credential_id: Option<u64>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub private_ip_address: Option<String>,
    #[serde(default)]
    pub php_version: Option<String>,
    #[serde(default)]
    pub database_type: Option<String>,
}

/// One entry of `sites`
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSite {
    #[serde(default)]
    pub site_domain: Option<String>,
    #[serde(default)]
    pub github_branch: Option<String>,
    #[serde(default)]
    pub root_dir: Option<String>,
    #[serde(default)]
    pub web_dir: Option<String>,
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub php_version: Option<String>,
    #[serde(default)]
    pub deployment_commands: Option<RawCommands>,
    #[serde(default)]
    pub environment: Option<RawEnvironment>,
    #[serde(default)]
    pub env_file: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub nginx_template: Option<String>,
    #[serde(default, alias = "nginx_config_variables")]
    pub nginx_template_variables: BTreeMap<String, Value>,
    #[serde(default)]
    pub nginx_custom_config: Option<String>,
    #[serde(default)]
    pub certificate: Option<bool>,
    #[serde(default)]
    pub clone_repository: Option<bool>,
    #[serde(default)]
    pub daemons: Vec<RawDaemon>,
    #[serde(default, alias = "scheduler")]
    pub laravel_scheduler: Option<bool>,
}

/// `deployment_commands` as a list or a multi-line block
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawCommands {
    List(Vec<String>),
    Block(String),
}

impl RawCommands {
    pub fn into_commands(self) -> Vec<String> {
        let lines = match self {
            RawCommands::List(list) => list,
            RawCommands::Block(block) => block.lines().map(str::to_string).collect(),
        };
        lines
            .into_iter()
            .map(|line| line.trim_end().to_string())
            .filter(|line| !line.trim().is_empty())
            .collect()
    }
}

/// `environment` as a `KEY=VALUE` block or a mapping
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawEnvironment {
    Block(String),
    Map(BTreeMap<String, Value>),
}

/// A daemon, either `{ command: ... }` or the bare command
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawDaemon {
    Spec { command: String },
    Command(String),
}

impl RawDaemon {
    pub fn command(&self) -> &str {
        match self {
            RawDaemon::Spec { command } | RawDaemon::Command(command) => command,
        }
    }
}

/// Render a scalar YAML value as text; `None` for sequences and mappings
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Human readable YAML type name for type mismatch errors
pub fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean `{}`", b),
        Value::Number(n) => format!("number `{}`", n),
        Value::String(s) => format!("string `{}`", s),
        Value::Sequence(_) => "a sequence".to_string(),
        Value::Mapping(_) => "a mapping".to_string(),
        Value::Tagged(tagged) => describe_value(&tagged.value),
    }
}
