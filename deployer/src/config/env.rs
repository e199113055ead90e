//! Environment variable blocks and files

use tracing::warn;

use crate::config::model::EnvVars;

/// Variable names are uppercased
pub fn env_key(key: &str) -> String {
    key.trim().to_uppercase()
}

/// Split a `KEY=VALUE` or `KEY="VALUE"` line
pub fn parse_env_line(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once('=')?;
    let key = env_key(key);
    if key.is_empty() {
        return None;
    }
    Some((key, unquote(value.trim()).to_string()))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Parse the content of an env file or inline `environment` block.
///
/// Blank lines and `#` comments are ignored. Lines without `=` are skipped
/// with a warning naming only the line number.
pub fn parse_env(content: &str, source: &str) -> EnvVars {
    let mut vars = EnvVars::new();
    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match parse_env_line(trimmed) {
            Some((key, value)) => vars.insert(key, value),
            None => warn!(
                "Skipping line {} of {}: expected KEY=VALUE",
                idx + 1,
                source
            ),
        }
    }
    vars
}

/// Merge env file variables with inline ones; inline entries win
pub fn merge_env(file_vars: EnvVars, inline_vars: EnvVars) -> EnvVars {
    let mut merged = file_vars;
    merged.extend(inline_vars);
    merged
}
