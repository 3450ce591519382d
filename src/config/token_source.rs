//! Primary credential discovery
//!
//! Credentials are taken from the first non-empty source in this order:
//! the command line, `GH_TOKENS`, `GH_TOKEN`, then the configured secret
//! files. A source may hold several credentials separated by commas or
//! newlines.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PoolError;

/// Where the raw credential text came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOrigin {
    CommandLine,
    EnvTokens,
    EnvToken,
    SecretFile(PathBuf),
}

impl fmt::Display for TokenOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommandLine => write!(f, "command line"),
            Self::EnvTokens => write!(f, "GH_TOKENS"),
            Self::EnvToken => write!(f, "GH_TOKEN"),
            Self::SecretFile(path) => write!(f, "secret file {}", path.display()),
        }
    }
}

/// Raw credential text and its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSource {
    pub origin: TokenOrigin,
    pub raw: String,
}

impl TokenSource {
    /// Split the raw text into individual credentials
    pub fn tokens(&self) -> Vec<String> {
        parse_tokens(&self.raw)
    }
}

/// Split a credential list on commas and newlines.
///
/// Entries are trimmed; empty entries and entries starting with `#` are dropped.
///
/// ```
/// use copilot_token_pool::config::parse_tokens;
///
/// assert_eq!(parse_tokens("a, b\n# note\nc"), vec!["a", "b", "c"]);
/// ```
pub fn parse_tokens(raw: &str) -> Vec<String> {
    raw.split(|c| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|t| !t.is_empty() && !t.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Pick the first non-empty credential source.
///
/// `env` looks up environment variables; it is a parameter so callers can
/// substitute a fixed map.
pub fn resolve_token_source<F>(
    cli: Option<&str>,
    env: F,
    secret_paths: &[PathBuf],
) -> Option<TokenSource>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    if let Some(raw) = non_empty(cli.map(String::from)) {
        return Some(TokenSource {
            origin: TokenOrigin::CommandLine,
            raw,
        });
    }
    if let Some(raw) = non_empty(env("GH_TOKENS")) {
        return Some(TokenSource {
            origin: TokenOrigin::EnvTokens,
            raw,
        });
    }
    if let Some(raw) = non_empty(env("GH_TOKEN")) {
        return Some(TokenSource {
            origin: TokenOrigin::EnvToken,
            raw,
        });
    }

    secret_paths.iter().find_map(|path| {
        let raw = read_secret_file(path)?;
        if raw.trim().is_empty() {
            return None;
        }
        Some(TokenSource {
            origin: TokenOrigin::SecretFile(path.clone()),
            raw,
        })
    })
}

/// Resolve and parse the primary credentials, failing when none are found
pub fn load_credentials<F>(
    cli: Option<&str>,
    env: F,
    secret_paths: &[PathBuf],
) -> Result<(TokenOrigin, Vec<String>), PoolError>
where
    F: Fn(&str) -> Option<String>,
{
    let source = resolve_token_source(cli, env, secret_paths).ok_or(PoolError::EmptyCredentialList)?;
    let tokens = source.tokens();
    if tokens.is_empty() {
        return Err(PoolError::EmptyCredentialList);
    }

    tracing::info!(
        source = %source.origin,
        count = tokens.len(),
        "Loaded primary credentials"
    );

    Ok((source.origin, tokens))
}

fn read_secret_file(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => {
            tracing::debug!(path = %path.display(), "Reading credentials from secret file");
            Some(extract_secret_value(&content))
        }
        Err(_) => None,
    }
}

/// Extract the credential list from a secret file.
///
/// A `GH_TOKENS=` or `GH_TOKEN=` line wins; its value may be quoted, and a
/// quoted value may continue over several lines. Without such a line the
/// whole file is the list.
pub fn extract_secret_value(content: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        let Some(value) = trimmed
            .strip_prefix("GH_TOKENS=")
            .or_else(|| trimmed.strip_prefix("GH_TOKEN="))
        else {
            continue;
        };

        let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'');
        let Some(quote) = quote else {
            return value.trim_end().to_string();
        };

        let rest = &value[1..];
        if let Some(end) = rest.find(quote) {
            return rest[..end].to_string();
        }

        let mut collected = vec![rest];
        for next in &lines[i + 1..] {
            if let Some(end) = next.find(quote) {
                collected.push(&next[..end]);
                break;
            }
            collected.push(next);
        }
        return collected.join("\n");
    }

    content.to_string()
}
