//! Package manifest loader. A manifest names the modules to package, where
//! the package goes and where the auth token comes from, so a build script
//! does not have to spell everything out on the command line.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::auth::AuthToken;

/// Environment variable consulted when no other auth source is configured.
pub const AUTH_ENV: &str = "IRIS_CRYPT_AUTH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("manifest unreadable: {0}")]
    Io(String),
    #[error("manifest parse failed: {0}")]
    Parse(String),
    #[error("auth env var {0} unreadable: {1}")]
    AuthEnv(String, String),
    #[error("invalid auth token: {0}")]
    InvalidAuth(String),
    #[error("no auth token configured")]
    MissingAuth,
    #[error("manifest lists no modules")]
    NoModules,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Auth token written out in full.
    pub auth: Option<String>,
    /// Environment variable holding the auth token.
    pub auth_env: Option<String>,
    /// Package file to write.
    pub output: Option<PathBuf>,
    /// Module id to file or directory.
    #[serde(default)]
    pub modules: BTreeMap<String, PathBuf>,
}

impl Manifest {
    /// Loads a JSON manifest. Relative module and output paths are taken
    /// relative to the manifest's own directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        let mut manifest: Manifest = serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(format!("{e}")))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for module_path in manifest.modules.values_mut() {
            *module_path = base.join(&*module_path);
        }
        if let Some(output) = manifest.output.as_mut() {
            *output = base.join(&*output);
        }
        if manifest.modules.is_empty() {
            return Err(ConfigError::NoModules);
        }
        Ok(manifest)
    }

    /// Picks the auth token: the explicit value wins, then the manifest's
    /// `auth`, then its `authEnv` variable, then [`AUTH_ENV`].
    pub fn resolve_auth(&self, explicit: Option<&str>) -> Result<AuthToken, ConfigError> {
        resolve_auth(explicit.or(self.auth.as_deref()), self.auth_env.as_deref())
    }
}

/// Resolves an auth token from an explicit value or the environment.
pub fn resolve_auth(explicit: Option<&str>, env_var: Option<&str>) -> Result<AuthToken, ConfigError> {
    let text = match (explicit, env_var) {
        (Some(text), _) => text.to_string(),
        (None, Some(var)) => std::env::var(var).map_err(|e| ConfigError::AuthEnv(var.to_string(), format!("{e}")))?,
        (None, None) => std::env::var(AUTH_ENV).map_err(|_| ConfigError::MissingAuth)?,
    };
    text.parse().map_err(|e| ConfigError::InvalidAuth(format!("{e}")))
}
