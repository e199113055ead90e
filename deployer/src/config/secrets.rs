//! Secret placeholders
//!
//! `${{ secrets.NAME }}` and `${{ env.NAME }}` are both accepted, with any
//! whitespace inside the braces. Names are matched case-insensitively.
//! Substitution walks the parsed document and rewrites every string scalar,
//! so multi-line blocks and plain scalars behave the same and a secret value
//! can never change the document structure.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde_yaml::Value;

use crate::config::env::parse_env_line;
use crate::errors::ConfigError;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\{(.*?)\}\}").expect("valid placeholder regex"));

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(secrets|env)\s*\.\s*([A-Za-z_][A-Za-z0-9_]*)\s*$")
        .expect("valid reference regex")
});

/// Secret values supplied to the run
#[derive(Default)]
pub struct SecretMap {
    entries: HashMap<String, SecretString>,
}

impl SecretMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the newline-separated `NAME=VALUE` list.
    ///
    /// Blank lines and `#` comments are skipped; values may be double-quoted.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let mut map = Self::new();
        for (idx, line) in input.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let (name, value) =
                parse_env_line(trimmed).ok_or(ConfigError::InvalidSecretLine { line: idx + 1 })?;
            map.insert(name, value);
        }
        Ok(map)
    }

    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries.insert(
            name.as_ref().to_uppercase(),
            SecretString::from(value.into()),
        );
    }

    pub fn get(&self, name: &str) -> Option<&SecretString> {
        self.entries.get(&name.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace every placeholder in `text`.
    ///
    /// `location` names where the text came from and is used in errors.
    pub fn substitute(&self, text: &str, location: &str) -> Result<String, ConfigError> {
        if !text.contains("${{") {
            return Ok(text.to_string());
        }

        let mut output = String::with_capacity(text.len());
        let mut last = 0;
        for captures in PLACEHOLDER.captures_iter(text) {
            let Some(token) = captures.get(0) else {
                continue;
            };
            let unresolved = || ConfigError::UnresolvedPlaceholder {
                token: token.as_str().to_string(),
                location: format!("{} (line {})", location, line_of(text, token.start())),
            };

            let inner = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            let name = REFERENCE
                .captures(inner)
                .and_then(|reference| reference.get(2))
                .ok_or_else(unresolved)?;
            let value = self.get(name.as_str()).ok_or_else(unresolved)?;

            output.push_str(&text[last..token.start()]);
            output.push_str(value.expose_secret());
            last = token.end();
        }
        output.push_str(&text[last..]);
        Ok(output)
    }

    /// Substitute placeholders in every string scalar of a YAML tree
    pub fn substitute_value(&self, value: &mut Value, path: &str) -> Result<(), ConfigError> {
        match value {
            Value::String(text) => {
                let location = if path.is_empty() { "document root" } else { path };
                *text = self.substitute(text, location)?;
            }
            Value::Sequence(items) => {
                for (idx, item) in items.iter_mut().enumerate() {
                    self.substitute_value(item, &format!("{}[{}]", path, idx))?;
                }
            }
            Value::Mapping(mapping) => {
                for (key, item) in mapping.iter_mut() {
                    let key = match key {
                        Value::String(k) => k.clone(),
                        other => format!("{:?}", other),
                    };
                    let child = if path.is_empty() {
                        key
                    } else {
                        format!("{}.{}", path, key)
                    };
                    self.substitute_value(item, &child)?;
                }
            }
            Value::Tagged(tagged) => self.substitute_value(&mut tagged.value, path)?,
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
        Ok(())
    }
}

impl std::fmt::Debug for SecretMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}
