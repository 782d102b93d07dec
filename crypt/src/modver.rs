//! Probe for the `NODE_MODULE_VERSION` ABI number of an installed runtime.
//! The header is looked up in the two places a runtime tree usually keeps it
//! and the first readable one wins.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Header locations relative to the runtime directory, in lookup order.
pub const HEADER_CANDIDATES: [&str; 2] = ["include/node/node_version.h", "src/node_version.h"];

#[derive(Debug, Error)]
pub enum ModverError {
    #[error("can't read node_version.h in {0}")]
    HeaderUnreadable(String),
    #[error("can't read #define NODE_MODULE_VERSION in node_version.h in {0}")]
    MacroMissing(String),
}

fn module_version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^#define[ \t]+NODE_MODULE_VERSION[ \t]+(\d+)")
            .expect("NODE_MODULE_VERSION pattern compiles")
    })
}

/// Returns the captured digits of the first `#define NODE_MODULE_VERSION`
/// line in `source`, if any.
pub fn find_module_version(source: &str) -> Option<&str> {
    module_version_pattern()
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Reads the first header candidate under `dir` that can be read.
/// Returns the path that was used alongside its content.
pub fn read_version_header(dir: &Path) -> Result<(PathBuf, String), ModverError> {
    for candidate in HEADER_CANDIDATES {
        let path = dir.join(candidate);
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(path = %path.display(), "using version header");
                return Ok((path, String::from_utf8_lossy(&bytes).into_owned()));
            }
            Err(err) => debug!(path = %path.display(), error = %err, "version header unreadable"),
        }
    }
    Err(ModverError::HeaderUnreadable(dir.display().to_string()))
}

/// Extracts `NODE_MODULE_VERSION` for the runtime installed at `dir`, exactly
/// as the header spells it.
pub fn probe_module_version(dir: &Path) -> Result<String, ModverError> {
    let (_, source) = read_version_header(dir)?;
    find_module_version(&source)
        .map(str::to_string)
        .ok_or_else(|| ModverError::MacroMissing(dir.display().to_string()))
}
