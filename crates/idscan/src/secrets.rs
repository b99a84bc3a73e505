//! Credential resolution for the OCR and LLM collaborators.
//!
//! Keys are looked up in priority order:
//!
//! 1. **Direct value** from the config file (`api_key`)
//! 2. **File reference** for mounted secrets (`api_key_file`)
//! 3. **Env var reference** (`api_key_env`, e.g. `OPENAI_API_KEY`)

use std::env::VarError;
use std::fs;
use std::path::PathBuf;

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No credential configured (set api_key, api_key_file or api_key_env)")]
    Unconfigured,

    #[error("Cannot read credential file '{path}': {source}")]
    UnreadableFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Credential variable '{name}' is not set")]
    MissingVar { name: String },

    #[error("Credential variable '{name}' is not valid UTF-8")]
    NonUnicodeVar { name: String },

    #[error("Credential from {origin} is empty")]
    Empty { origin: String },
}

type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from the first non-empty source.
///
/// File contents and env values are trimmed, since both commonly carry a
/// trailing newline. A source that resolves to an empty string is an error
/// rather than a silent fall-through.
pub fn resolve_secret(
    value: Option<&str>,
    file: Option<&str>,
    var: Option<&str>,
) -> Result<SecretString> {
    if let Some(direct) = value.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(direct.to_string()));
    }

    if let Some(file) = file.filter(|p| !p.is_empty()) {
        let path = expand_home(file);
        let content = fs::read_to_string(&path).map_err(|source| SecretError::UnreadableFile {
            path: path.display().to_string(),
            source,
        })?;
        return non_empty(content.trim(), "file");
    }

    if let Some(name) = var.filter(|n| !n.is_empty()) {
        let name = name.to_string();
        return match std::env::var(&name) {
            Ok(found) => non_empty(found.trim(), &format!("variable '{}'", name)),
            Err(VarError::NotPresent) => Err(SecretError::MissingVar { name }),
            Err(VarError::NotUnicode(_)) => Err(SecretError::NonUnicodeVar { name }),
        };
    }

    Err(SecretError::Unconfigured)
}

fn non_empty(value: &str, origin: &str) -> Result<SecretString> {
    if value.is_empty() {
        return Err(SecretError::Empty {
            origin: origin.to_string(),
        });
    }
    Ok(SecretString::from(value.to_string()))
}

/// Expands a leading `~` using the platform home directory. `~user/...` is not supported.
fn expand_home(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return match path.strip_prefix("~/") {
                Some(rest) => home.join(rest),
                None => home,
            };
        }
    }
    PathBuf::from(path)
}
