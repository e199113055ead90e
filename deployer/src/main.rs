//! forge-deploy - Entry Point
//!
//! Provisions and deploys the sites declared in a deployment document on a
//! Laravel Forge server. Meant to run from CI after the repository checkout.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context};
use secrecy::SecretString;
use tracing::{error, info};

use forge_deployer::app::options::{AppOptions, PathOptions};
use forge_deployer::app::run::run;
use forge_deployer::http::ClientOptions;
use forge_deployer::logs::{init_logging, LogLevel, LogOptions};
use forge_deployer::utils::version_info;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return ExitCode::SUCCESS;
    }

    if dotenv::dotenv().is_ok() {
        // Logging is not up yet
        eprintln!("Loaded .env");
    }

    let inputs = Inputs::new(cli_args);

    // Initialize logging; the guard flushes the log file on exit
    let log_options = LogOptions {
        log_level: if inputs.debug() { LogLevel::Debug } else { LogLevel::Info },
        log_dir: inputs.get("log-dir", "LOG_DIR").map(PathBuf::from),
        json_format: inputs.flag("json-logs"),
    };
    let _guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = match inputs.app_options() {
        Ok(options) => options,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("forge-deploy {} ({})", version.version, version.git_hash);
    match run(options).await {
        Ok(report) => {
            println!("{}", report.render());
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("Deployment aborted: {e}");
            ExitCode::FAILURE
        }
    }
}

/// CLI flags with environment fallbacks; flags win
struct Inputs {
    cli_args: HashMap<String, String>,
}

impl Inputs {
    fn new(cli_args: HashMap<String, String>) -> Self {
        Self { cli_args }
    }

    fn get(&self, flag: &str, var: &str) -> Option<String> {
        self.cli_args
            .get(flag)
            .cloned()
            .or_else(|| env::var(var).ok())
            .filter(|v| !v.trim().is_empty())
    }

    fn flag(&self, flag: &str) -> bool {
        self.cli_args
            .get(flag)
            .is_some_and(|v| matches!(v.as_str(), "true" | "1"))
    }

    fn debug(&self) -> bool {
        self.flag("debug")
            || env::var("DEBUG").is_ok_and(|v| v.eq_ignore_ascii_case("true"))
            || env::var("RUNNER_DEBUG").is_ok_and(|v| v == "1")
    }

    fn app_options(&self) -> anyhow::Result<AppOptions> {
        let token = self
            .get("token", "FORGE_API_TOKEN")
            .ok_or_else(|| anyhow!("Missing API token: pass --token=<token> or set FORGE_API_TOKEN"))?;

        let mut options = AppOptions {
            token: SecretString::from(token),
            paths: PathOptions {
                workspace: self
                    .get("workspace", "GITHUB_WORKSPACE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./")),
                templates_dir: self.get("templates", "NGINX_TEMPLATES_DIR").map(PathBuf::from),
                ..Default::default()
            },
            secrets: SecretString::from(self.get("secrets", "SECRETS").unwrap_or_default()),
            api: ClientOptions {
                debug_trail: self.debug(),
                ..Default::default()
            },
            ..Default::default()
        };

        if let Some(file) = self.get("file", "DEPLOYMENT_FILE") {
            options.paths.deployment_file = PathBuf::from(file);
        }
        if let Some(url) = self.get("api-url", "FORGE_API_URL") {
            options.api.base_url = url;
        }
        if let Some(concurrency) = self.get("concurrency", "FORGE_CONCURRENCY") {
            options.reconcile.concurrency = concurrency
                .trim()
                .parse()
                .with_context(|| format!("Invalid concurrency `{}`", concurrency))?;
        }

        Ok(options)
    }
}
