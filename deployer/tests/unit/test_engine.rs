//! Reconciler tests against the in-memory Forge

use std::path::Path;
use std::sync::Arc;

use forge_deployer::app::options::{AppOptions, PathOptions};
use forge_deployer::app::run::deploy;
use forge_deployer::config::{DeploymentLoader, DeploymentSpec, SecretMap};
use forge_deployer::deploy::fsm::SiteState;
use forge_deployer::deploy::poll::PollSettings;
use forge_deployer::deploy::{DeploymentReport, ReconcileOptions, Reconciler, Step};
use forge_deployer::errors::{AppError, ConfigError, DeployError};
use forge_deployer::nginx::{NginxRenderer, TemplateStore};
use forge_models::Daemon;
use secrecy::SecretString;
use tempfile::TempDir;

use crate::fake_forge::{FakeForge, SERVER_NAME};

fn options() -> ReconcileOptions {
    ReconcileOptions {
        concurrency: 2,
        poll: PollSettings::immediate(3),
        deploy_poll: PollSettings::immediate(3),
    }
}

async fn load(workspace: &Path, yaml: &str, secrets: &str) -> DeploymentSpec {
    let secrets = SecretMap::parse(secrets).unwrap();
    DeploymentLoader::new(workspace)
        .load(yaml, &secrets)
        .await
        .unwrap()
}

async fn reconcile(forge: &Arc<FakeForge>, templates: TemplateStore, spec: &DeploymentSpec) -> DeploymentReport {
    let reconciler = Reconciler::new(forge.clone(), NginxRenderer::new(templates), options());
    reconciler.run(spec).await
}

const FULL_SITE: &str = r#"
server_name: web-1
github_repository: acme/shop
github_branch: release
sites:
  - site_domain: shop.example.com
    project_type: php
    php_version: php83
    aliases: [www.shop.example.com]
    certificate: true
    environment: |
      APP_ENV=production
      DB_PASSWORD=${{ secrets.DB_PASSWORD }}
    deployment_commands: |
      composer install --no-dev
      php artisan migrate --force
    daemons:
      - php artisan queue:work
      - command: php artisan horizon
    laravel_scheduler: true
"#;

#[tokio::test]
async fn test_first_run_converges_and_second_run_creates_nothing() {
    let workspace = TempDir::new().unwrap();
    let spec = load(workspace.path(), FULL_SITE, "DB_PASSWORD=s3cret").await;
    let forge = Arc::new(FakeForge::new());

    let report = reconcile(&forge, TemplateStore::builtin(), &spec).await;
    assert!(report.is_success(), "{}", report.render());
    let outcome = report.site("shop.example.com").unwrap();
    assert!(outcome.created);
    assert_eq!(outcome.state, SiteState::Succeeded);

    let site = forge.site("shop.example.com").unwrap();
    assert_eq!(site.php_version.as_deref(), Some("php83"));
    assert_eq!(site.repository.as_deref(), Some("acme/shop"));
    assert_eq!(site.repository_branch.as_deref(), Some("release"));

    forge.with(|state| {
        let env = state.environments.get(&site.id).unwrap();
        assert!(env.contains("DB_PASSWORD=s3cret"));
        let script = state.scripts.get(&site.id).unwrap();
        assert!(script.contains("cd /home/forge/shop.example.com"));
        assert!(script.contains("php artisan migrate --force\nsudo -S supervisorctl restart"));
        assert_eq!(state.daemons.len(), 2);
        for daemon in &state.daemons {
            let restart = format!("sudo -S supervisorctl restart daemon-{}:*", daemon.id);
            assert!(script.contains(&restart), "{script}");
        }
        assert_eq!(state.jobs.len(), 1);
        assert_eq!(
            state.jobs[0].command,
            "php8.3 /home/forge/shop.example.com/artisan schedule:run"
        );
        assert_eq!(state.certificates.len(), 1);
        assert!(state.certificates[0].1.active);
        assert_eq!(state.templates.len(), 1);
    });
    assert!(forge.create_count() > 0);

    forge.clear_calls();
    let report = reconcile(&forge, TemplateStore::builtin(), &spec).await;
    assert!(report.is_success(), "{}", report.render());
    assert!(!report.site("shop.example.com").unwrap().created);
    assert_eq!(forge.create_count(), 0, "calls: {:?}", forge.calls());
    forge.with(|state| {
        assert_eq!(state.daemons.len(), 2);
        assert_eq!(state.jobs.len(), 1);
        assert_eq!(state.certificates.len(), 1);
    });
    assert!(!forge.calls().contains(&"set_nginx_config".to_string()));
}

#[tokio::test]
async fn test_existing_daemons_restarted_by_deploy_script() {
    let workspace = TempDir::new().unwrap();
    let spec = load(
        workspace.path(),
        r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: example.com
    clone_repository: false
    deployment_commands:
      - npm ci
"#,
        "",
    )
    .await;
    let forge = Arc::new(FakeForge::new());
    let site_id = forge.add_site("example.com", &[]);
    forge.with(|state| {
        for (id, directory) in [(41, "/home/forge/example.com"), (42, "/home/forge/other.com")] {
            state.daemons.push(Daemon {
                id,
                command: "node worker.js".to_string(),
                user: Some("forge".to_string()),
                directory: Some(directory.to_string()),
                status: Some("installed".to_string()),
            });
        }
    });

    let report = reconcile(&forge, TemplateStore::builtin(), &spec).await;
    assert!(report.is_success(), "{}", report.render());
    let script = forge.with(|state| state.scripts.get(&site_id).cloned().unwrap());
    assert!(script.ends_with("npm ci\nsudo -S supervisorctl restart daemon-41:*"), "{script}");
    assert!(!script.contains("daemon-42"));
}

#[tokio::test]
async fn test_template_variables_rendered_into_live_config() {
    let workspace = TempDir::new().unwrap();
    let template = "server_name {{ DOMAINS }};\nproxy_pass http://127.0.0.1:{{ APP_PORT }};\n";
    let dir = workspace.path().join("nginx_templates");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("app.conf"), template).unwrap();

    let spec = load(
        workspace.path(),
        r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: a.example.com
    clone_repository: false
    nginx_template: app
    nginx_template_variables:
      APP_PORT: 3000
  - site_domain: b.example.com
    clone_repository: false
    nginx_template: app
    nginx_template_variables:
      APP_PORT: 4000
"#,
        "",
    )
    .await;
    let forge = Arc::new(FakeForge::new());

    let report = reconcile(&forge, TemplateStore::new(dir.clone()), &spec).await;
    assert!(report.is_success(), "{}", report.render());

    let (a, b) = (forge.site("a.example.com").unwrap(), forge.site("b.example.com").unwrap());
    forge.with(|state| {
        assert_eq!(
            state.nginx.get(&a.id).map(String::as_str),
            Some("server_name a.example.com;\nproxy_pass http://127.0.0.1:3000;\n")
        );
        assert_eq!(
            state.nginx.get(&b.id).map(String::as_str),
            Some("server_name b.example.com;\nproxy_pass http://127.0.0.1:4000;\n")
        );
        assert_eq!(state.templates.len(), 1);
        assert_eq!(state.templates[0].content.as_deref(), Some(template));
    });

    forge.clear_calls();
    let report = reconcile(&forge, TemplateStore::new(dir), &spec).await;
    assert!(report.is_success(), "{}", report.render());
    let calls = forge.calls();
    assert!(!calls.contains(&"set_nginx_config".to_string()), "{calls:?}");
    assert!(!calls.contains(&"update_nginx_template".to_string()), "{calls:?}");
}

#[tokio::test]
async fn test_aliases_are_fully_replaced() {
    let workspace = TempDir::new().unwrap();
    let spec = load(
        workspace.path(),
        r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: example.com
    clone_repository: false
    aliases: [api.example.com]
"#,
        "",
    )
    .await;
    let forge = Arc::new(FakeForge::new());
    forge.add_site("example.com", &["www.example.com", "old.example.com"]);

    let report = reconcile(&forge, TemplateStore::builtin(), &spec).await;
    assert!(report.is_success(), "{}", report.render());

    let site = forge.site("example.com").unwrap();
    assert_eq!(site.aliases, vec!["api.example.com".to_string()]);
    assert!(forge.calls().contains(&"set_aliases".to_string()));
}

#[tokio::test]
async fn test_matching_aliases_are_left_alone() {
    let workspace = TempDir::new().unwrap();
    let spec = load(
        workspace.path(),
        r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: example.com
    clone_repository: false
    aliases: [b.example.com, a.example.com]
"#,
        "",
    )
    .await;
    let forge = Arc::new(FakeForge::new());
    forge.add_site("example.com", &["a.example.com", "b.example.com"]);

    let report = reconcile(&forge, TemplateStore::builtin(), &spec).await;
    assert!(report.is_success(), "{}", report.render());
    assert!(!forge.calls().contains(&"set_aliases".to_string()));
}

#[tokio::test]
async fn test_php_install_timeout_only_fails_its_site() {
    let workspace = TempDir::new().unwrap();
    let spec = load(
        workspace.path(),
        r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: a.example.com
    project_type: php
    php_version: php84
  - site_domain: b.example.com
"#,
        "",
    )
    .await;
    let forge = Arc::new(FakeForge::new());
    forge.with(|state| state.stall_php = true);

    let report = reconcile(&forge, TemplateStore::builtin(), &spec).await;
    assert!(!report.is_success());
    assert_eq!(report.sites.len(), 2);
    assert_eq!(report.sites[0].domain, "a.example.com");
    assert_eq!(report.sites[1].domain, "b.example.com");

    let failed = report.site("a.example.com").unwrap();
    assert_eq!(failed.state, SiteState::Failed);
    assert_eq!(failed.failed_step(), Some(Step::PhpVersionInstall));
    assert!(matches!(
        failed.failure.as_ref().map(|f| &f.error),
        Some(DeployError::PollTimeout { attempts: 3, .. })
    ));

    let other = report.site("b.example.com").unwrap();
    assert!(other.is_success(), "{}", report.render());
    assert_eq!(
        forge.site("b.example.com").unwrap().repository.as_deref(),
        Some("acme/site")
    );
}

#[tokio::test]
async fn test_repository_clone_failure_only_fails_its_site() {
    let workspace = TempDir::new().unwrap();
    let spec = load(
        workspace.path(),
        r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: a.example.com
  - site_domain: b.example.com
  - site_domain: c.example.com
"#,
        "",
    )
    .await;
    let forge = Arc::new(FakeForge::new());
    forge.with(|state| {
        state.failing_repositories.push("a.example.com".to_string());
        state.stalled_repositories.push("b.example.com".to_string());
    });

    let report = reconcile(&forge, TemplateStore::builtin(), &spec).await;
    assert!(!report.is_success());

    let failed = report.site("a.example.com").unwrap();
    assert_eq!(failed.state, SiteState::Failed);
    assert_eq!(failed.failed_step(), Some(Step::Repository));
    assert!(matches!(
        failed.failure.as_ref().map(|f| &f.error),
        Some(DeployError::OperationFailed { status, .. }) if status == "failed"
    ));

    let stalled = report.site("b.example.com").unwrap();
    assert_eq!(stalled.failed_step(), Some(Step::Repository));
    assert!(matches!(
        stalled.failure.as_ref().map(|f| &f.error),
        Some(DeployError::PollTimeout { attempts: 3, .. })
    ));

    assert!(report.site("c.example.com").unwrap().is_success(), "{}", report.render());
    forge.with(|state| assert_eq!(state.deployments.len(), 1));
}

#[tokio::test]
async fn test_custom_nginx_config_wins_over_template() {
    let workspace = TempDir::new().unwrap();
    let custom = "server { listen 80; server_name custom.example.com; }\n";
    std::fs::create_dir_all(workspace.path().join("nginx")).unwrap();
    std::fs::write(workspace.path().join("nginx/custom.conf"), custom).unwrap();

    let spec = load(
        workspace.path(),
        r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: custom.example.com
    clone_repository: false
    nginx_template: does-not-exist
    nginx_custom_config: /nginx/custom.conf
"#,
        "",
    )
    .await;
    let forge = Arc::new(FakeForge::new());
    let templates = TemplateStore::new(workspace.path().join("nginx_templates"));

    let report = reconcile(&forge, templates, &spec).await;
    assert!(report.is_success(), "{}", report.render());

    let site = forge.site("custom.example.com").unwrap();
    forge.with(|state| {
        assert_eq!(state.nginx.get(&site.id).map(String::as_str), Some(custom));
        assert!(state.templates.is_empty());
    });
}

#[tokio::test]
async fn test_missing_template_fails_at_nginx_step() {
    let workspace = TempDir::new().unwrap();
    let spec = load(
        workspace.path(),
        r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: example.com
    clone_repository: false
    nginx_template: does-not-exist
"#,
        "",
    )
    .await;
    let forge = Arc::new(FakeForge::new());

    let report = reconcile(&forge, TemplateStore::builtin(), &spec).await;
    let outcome = report.site("example.com").unwrap();
    assert_eq!(outcome.failed_step(), Some(Step::Nginx));
    // The site itself was still created, without a template
    assert!(forge.site("example.com").is_some());
}

#[tokio::test]
async fn test_missing_server_fails_every_site_at_server_step() {
    let workspace = TempDir::new().unwrap();
    let spec = load(
        workspace.path(),
        r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: a.example.com
  - site_domain: b.example.com
"#,
        "",
    )
    .await;
    let forge = Arc::new(FakeForge::empty());

    let report = reconcile(&forge, TemplateStore::builtin(), &spec).await;
    assert_eq!(report.sites.len(), 2);
    for outcome in &report.sites {
        assert_eq!(outcome.failed_step(), Some(Step::Server));
        assert_eq!(outcome.state, SiteState::Failed);
    }
    assert_eq!(forge.calls(), vec!["list_servers".to_string()]);
}

#[tokio::test]
async fn test_server_created_from_provisioning_block() {
    let workspace = TempDir::new().unwrap();
    let spec = load(
        workspace.path(),
        r#"
server_name: web-1
github_repository: acme/site
server:
  provider: custom
  ip_address: 203.0.113.10
  php_version: php82
sites:
  - site_domain: example.com
"#,
        "",
    )
    .await;
    let forge = Arc::new(FakeForge::empty());

    let report = reconcile(&forge, TemplateStore::builtin(), &spec).await;
    assert!(report.is_success(), "{}", report.render());
    forge.with(|state| {
        assert_eq!(state.servers.len(), 1);
        assert_eq!(state.servers[0].name, SERVER_NAME);
        assert_eq!(state.sites.len(), 1);
    });
}

#[tokio::test]
async fn test_failed_deployment_is_reported() {
    let workspace = TempDir::new().unwrap();
    let spec = load(
        workspace.path(),
        r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: example.com
"#,
        "",
    )
    .await;
    let forge = Arc::new(FakeForge::new());
    forge.with(|state| state.fail_deployments = true);

    let report = reconcile(&forge, TemplateStore::builtin(), &spec).await;
    let outcome = report.site("example.com").unwrap();
    assert_eq!(outcome.failed_step(), Some(Step::Deploy));
    assert!(matches!(
        outcome.failure.as_ref().map(|f| &f.error),
        Some(DeployError::OperationFailed { status, .. }) if status == "failed"
    ));
}

#[tokio::test]
async fn test_scheduler_job_removed_when_disabled() {
    let workspace = TempDir::new().unwrap();
    let enabled = r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: example.com
    project_type: php
    clone_repository: false
    laravel_scheduler: true
"#;
    let forge = Arc::new(FakeForge::new());

    let spec = load(workspace.path(), enabled, "").await;
    let report = reconcile(&forge, TemplateStore::builtin(), &spec).await;
    assert!(report.is_success(), "{}", report.render());
    assert_eq!(forge.with(|state| state.jobs.len()), 1);

    let spec = load(
        workspace.path(),
        &enabled.replace("laravel_scheduler: true", "laravel_scheduler: false"),
        "",
    )
    .await;
    let report = reconcile(&forge, TemplateStore::builtin(), &spec).await;
    assert!(report.is_success(), "{}", report.render());
    assert_eq!(forge.with(|state| state.jobs.len()), 0);
}

#[tokio::test]
async fn test_config_error_makes_no_remote_call() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(
        workspace.path().join("forge-deploy.yml"),
        r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: example.com
    environment:
      API_KEY: ${{ secrets.MISSING_KEY }}
"#,
    )
    .unwrap();

    let options = AppOptions {
        paths: PathOptions {
            workspace: workspace.path().to_path_buf(),
            ..Default::default()
        },
        secrets: SecretString::from("OTHER=1".to_string()),
        reconcile: options(),
        ..Default::default()
    };
    let forge = Arc::new(FakeForge::new());

    let result = deploy(&options, forge.clone()).await;
    assert!(matches!(
        result,
        Err(AppError::Config(ConfigError::UnresolvedPlaceholder { .. }))
    ));
    assert_eq!(forge.call_count(), 0);
}

#[tokio::test]
async fn test_deploy_reads_document_from_workspace() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(
        workspace.path().join("forge-deploy.yml"),
        r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: example.com
    clone_repository: false
"#,
    )
    .unwrap();

    let options = AppOptions {
        paths: PathOptions {
            workspace: workspace.path().to_path_buf(),
            ..Default::default()
        },
        reconcile: options(),
        ..Default::default()
    };
    let forge = Arc::new(FakeForge::new());

    let report = deploy(&options, forge.clone()).await.unwrap();
    assert!(report.is_success(), "{}", report.render());
    assert_eq!(report.server_name, SERVER_NAME);
}
