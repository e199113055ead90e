//! Deployment document loading tests

use forge_deployer::config::{DeploymentLoader, DeploymentSpec, ProjectType, SecretMap};
use forge_deployer::errors::ConfigError;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

async fn load(workspace: &TempDir, yaml: &str, secrets: &str) -> Result<DeploymentSpec, ConfigError> {
    let secrets = SecretMap::parse(secrets).unwrap();
    DeploymentLoader::new(workspace.path()).load(yaml, &secrets).await
}

#[tokio::test]
async fn test_every_placeholder_is_replaced() {
    let workspace = TempDir::new().unwrap();
    let yaml = r#"
server_name: ${{ secrets.SERVER }}
github_repository: acme/${{ env.REPO }}
sites:
  - site_domain: ${{secrets.domain}}
    aliases:
      - www.${{ secrets.DOMAIN }}
    environment:
      DB_PASSWORD: ${{ secrets.DB_PASSWORD }}
      MAIL_FROM: "noreply@${{ secrets.DOMAIN }}"
    deployment_commands:
      - echo ${{ secrets.DB_PASSWORD }} > /dev/null
    nginx_template_variables:
      UPSTREAM: ${{ env.UPSTREAM }}
"#;
    let secrets = "SERVER=web-1\nREPO=shop\nDOMAIN=example.com\nDB_PASSWORD=\"p@ss word\"\nUPSTREAM=127.0.0.1:3000\n";

    let spec = assert_ok!(load(&workspace, yaml, secrets).await);
    assert_eq!(spec.server_name, "web-1");
    assert_eq!(spec.github_repository, "acme/shop");

    let site = &spec.sites[0];
    assert_eq!(site.site_domain, "example.com");
    assert_eq!(site.aliases, vec!["www.example.com".to_string()]);
    assert_eq!(site.environment.get("DB_PASSWORD"), Some("p@ss word"));
    assert_eq!(site.environment.get("MAIL_FROM"), Some("noreply@example.com"));
    assert_eq!(site.deployment_commands, vec!["echo p@ss word > /dev/null".to_string()]);
    assert_eq!(
        site.nginx_template_variables.get("UPSTREAM").map(String::as_str),
        Some("127.0.0.1:3000")
    );
}

#[tokio::test]
async fn test_secret_value_cannot_change_structure() {
    let workspace = TempDir::new().unwrap();
    let yaml = r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: example.com
    environment:
      TOKEN: ${{ secrets.TOKEN }}
"#;
    let spec = load(&workspace, yaml, "TOKEN=a: b\n").await.unwrap();
    assert_eq!(spec.sites[0].environment.get("TOKEN"), Some("a: b"));
}

#[tokio::test]
async fn test_missing_secret_is_an_error() {
    let workspace = TempDir::new().unwrap();
    let yaml = r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: example.com
    environment:
      API_KEY: ${{ secrets.API_KEY }}
"#;
    let err = assert_err!(load(&workspace, yaml, "").await);
    match err {
        ConfigError::UnresolvedPlaceholder { token, .. } => assert!(token.contains("API_KEY")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_required_fields() {
    let workspace = TempDir::new().unwrap();

    let err = load(&workspace, "github_repository: acme/site\n", "").await.unwrap_err();
    assert!(matches!(err, ConfigError::MissingField { ref field, site: None } if field == "server_name"));

    let err = load(&workspace, "server_name: web-1\n", "").await.unwrap_err();
    assert!(matches!(err, ConfigError::MissingField { ref field, .. } if field == "github_repository"));

    let err = load(&workspace, "", "").await.unwrap_err();
    assert!(matches!(err, ConfigError::MissingField { .. }));

    let yaml = "server_name: web-1\ngithub_repository: acme/site\nsites:\n  - php_version: php83\n";
    let err = load(&workspace, yaml, "").await.unwrap_err();
    assert!(matches!(
        err,
        ConfigError::MissingField { ref field, site: Some(ref site) } if field == "site_domain" && site == "sites[0]"
    ));
}

#[tokio::test]
async fn test_duplicate_domain_rejected() {
    let workspace = TempDir::new().unwrap();
    let yaml = r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: example.com
  - site_domain: example.com
    web_dir: /dist
"#;
    let err = load(&workspace, yaml, "").await.unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateDomain { ref domain } if domain == "example.com"));
}

#[tokio::test]
async fn test_duplicate_domain_ignores_case() {
    let workspace = TempDir::new().unwrap();
    let yaml = r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: Example.com
  - site_domain: example.com
"#;
    let err = assert_err!(load(&workspace, yaml, "").await);
    assert!(matches!(err, ConfigError::DuplicateDomain { ref domain } if domain == "example.com"));

    let yaml = "server_name: web-1\ngithub_repository: acme/site\nsites:\n  - site_domain: Shop.Example.COM\n";
    let spec = assert_ok!(load(&workspace, yaml, "").await);
    assert_eq!(spec.sites[0].site_domain, "shop.example.com");
}

#[tokio::test]
async fn test_boolean_fields_reject_strings() {
    let workspace = TempDir::new().unwrap();
    let yaml = r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: example.com
    certificate: "yes"
"#;
    let err = load(&workspace, yaml, "").await.unwrap_err();
    match err {
        ConfigError::TypeMismatch { field, site, .. } => {
            assert_eq!(field, "certificate");
            assert_eq!(site, "example.com");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unknown_site_field_rejected() {
    let workspace = TempDir::new().unwrap();
    let yaml = r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: example.com
    php_verison: php83
"#;
    let err = load(&workspace, yaml, "").await.unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSite { ref site, .. } if site == "example.com"));
}

#[tokio::test]
async fn test_defaults_and_branch_inheritance() {
    let workspace = TempDir::new().unwrap();
    let yaml = r#"
server_name: web-1
github_repository: acme/site
github_branch: develop
sites:
  - site_domain: a.example.com
  - site_domain: b.example.com
    github_branch: hotfix
    project_type: php
    root_dir: ./app/
    web_dir: web
"#;
    let spec = load(&workspace, yaml, "").await.unwrap();

    let a = &spec.sites[0];
    assert_eq!(a.github_branch, "develop");
    assert_eq!(a.project_type, ProjectType::Other("html".to_string()));
    assert_eq!(a.nginx_template, "default");
    assert!(!a.certificate);
    assert!(a.clone_repository);
    assert!(a.laravel_scheduler.is_none());
    assert_eq!(a.site_dir(), "/home/forge/a.example.com");
    assert_eq!(a.web_directory(), "/public");

    let b = &spec.sites[1];
    assert_eq!(b.github_branch, "hotfix");
    assert_eq!(b.project_type, ProjectType::Php);
    assert_eq!(b.site_dir(), "/home/forge/b.example.com/app");
    assert_eq!(b.web_directory(), "/app/web");

    let spec = load(&workspace, "server_name: web-1\ngithub_repository: acme/site\n", "")
        .await
        .unwrap();
    assert_eq!(spec.github_branch, "main");
    assert!(spec.sites.is_empty());
}

#[tokio::test]
async fn test_env_file_merged_under_inline_environment() {
    let workspace = TempDir::new().unwrap();
    std::fs::create_dir_all(workspace.path().join("deploy")).unwrap();
    std::fs::write(
        workspace.path().join("deploy/production.env"),
        "# shared settings\nA=from-file\nB=from-file\nSECRET=${{ secrets.APP_KEY }}\n",
    )
    .unwrap();

    let yaml = r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: example.com
    env_file: /deploy/production.env
    environment: |
      B=inline
      C=inline
"#;
    let spec = load(&workspace, yaml, "APP_KEY=base64:xyz").await.unwrap();
    let env = &spec.sites[0].environment;
    assert_eq!(env.get("A"), Some("from-file"));
    assert_eq!(env.get("B"), Some("inline"));
    assert_eq!(env.get("C"), Some("inline"));
    assert_eq!(env.get("SECRET"), Some("base64:xyz"));
    assert_eq!(env.len(), 4);
}

#[tokio::test]
async fn test_inline_block_wins_over_env_file() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join(".env.production"), "B=3\nC=4").unwrap();

    let yaml = "server_name: web-1\ngithub_repository: acme/site\nsites:\n  - site_domain: example.com\n    env_file: .env.production\n    environment: \"A=1\\nB=2\"\n";
    let spec = load(&workspace, yaml, "").await.unwrap();
    assert_eq!(
        spec.sites[0].environment.to_env_string(),
        "B=2\nC=4\nA=1"
    );
}

#[tokio::test]
async fn test_missing_env_file_is_an_error() {
    let workspace = TempDir::new().unwrap();
    let yaml = r#"
server_name: web-1
github_repository: acme/site
sites:
  - site_domain: example.com
    env_file: missing.env
"#;
    let err = load(&workspace, yaml, "").await.unwrap_err();
    assert!(matches!(err, ConfigError::EnvFile { ref site, .. } if site == "example.com"));
}

#[tokio::test]
async fn test_custom_config_path_resolved_in_workspace() {
    let workspace = TempDir::new().unwrap();
    let yaml = r#"
server_name: web-1
github_repository: acme/site
server:
  ip_address: 203.0.113.10
sites:
  - site_domain: example.com
    nginx_custom_config: /nginx/site.conf
    aliases: [" www.example.com ", www.example.com]
"#;
    let spec = load(&workspace, yaml, "").await.unwrap();
    assert_eq!(
        spec.sites[0].nginx_custom_config.as_deref(),
        Some(workspace.path().join("nginx/site.conf").as_path())
    );
    assert_eq!(spec.sites[0].aliases, vec!["www.example.com".to_string()]);

    let server = spec.server.unwrap();
    assert_eq!(server.provider, "custom");
    assert_eq!(server.server_type, "app");
}

#[test]
fn test_secret_list_parsing() {
    let secrets = SecretMap::parse("# comment\n\nAPI_TOKEN=abc\ndb_password=\"quoted value\"\n").unwrap();
    assert_eq!(secrets.len(), 2);
    assert!(secrets.get("DB_PASSWORD").is_some());

    let err = SecretMap::parse("VALID=1\nnot a definition\n").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSecretLine { line: 2 }));
}
