//! Generated shell snippets: deploy script and scheduler command

use forge_models::ForgeId;

use crate::config::SiteSpec;

pub const SCRIPT_HEADER: &str = "# generated by forge-deploy, do not modify";

/// Deploy script for a site, commands in declared order, then one
/// supervisor restart per daemon of the site
pub fn build_deploy_script(site: &SiteSpec, daemon_ids: &[ForgeId]) -> String {
    let mut lines = vec![SCRIPT_HEADER.to_string(), format!("cd {}", site.site_dir())];
    if site.clone_repository {
        lines.push("git pull origin $FORGE_SITE_BRANCH".to_string());
    }
    lines.extend(site.deployment_commands.iter().cloned());
    lines.extend(daemon_ids.iter().map(|id| restart_daemon_command(*id)));
    lines.join("\n")
}

pub fn restart_daemon_command(daemon_id: ForgeId) -> String {
    format!("sudo -S supervisorctl restart daemon-{}:*", daemon_id)
}

/// Binary name of a Forge php version: `php83` becomes `php8.3`
pub fn format_php_version(version: &str) -> String {
    let digits = version.trim().trim_start_matches("php");
    if digits.contains('.') || digits.len() < 2 {
        return format!("php{}", digits);
    }
    let (major, minor) = digits.split_at(1);
    format!("php{}.{}", major, minor)
}

/// Cron command running the Laravel scheduler of a site
pub fn scheduler_command(php_version: &str, site_dir: &str) -> String {
    format!(
        "{} {}/artisan schedule:run",
        format_php_version(php_version),
        site_dir.trim_end_matches('/')
    )
}
