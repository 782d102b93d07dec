//! Portable module paths used inside a package. They are always
//! `/`-separated, whatever the host platform, and kept normalized.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

const SEP: char = '/';

fn split(s: &str) -> impl Iterator<Item = &str> {
    s.split(['/', '\\']).filter(|part| !part.is_empty())
}

fn normalize(s: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in split(s) {
        match part {
            "." => {}
            ".." if parts.last().is_some_and(|last| *last != "..") => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    parts.join("/")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ModulePath(String);

impl ModulePath {
    pub fn new(s: &str) -> Self {
        Self(normalize(s))
    }

    /// Converts a relative host path into a module path.
    pub fn from_host(path: &Path) -> Self {
        let parts: Vec<String> = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Self::new(&parts.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn join(&self, rel: &str) -> Self {
        if self.0.is_empty() {
            return Self::new(rel);
        }
        Self::new(&format!("{}{SEP}{rel}", self.0))
    }

    /// Splits into directory and base name.
    pub fn parts(&self) -> (ModulePath, &str) {
        match self.0.rfind(SEP) {
            Some(pos) => (ModulePath(self.0[..pos].to_string()), &self.0[pos + 1..]),
            None => (ModulePath::default(), self.0.as_str()),
        }
    }

    pub fn parent(&self) -> ModulePath {
        self.parts().0
    }

    pub fn base(&self) -> &str {
        self.parts().1
    }

    /// Extension of the base name including the dot, or `""`.
    pub fn extension(&self) -> &str {
        let base = self.base();
        base.rfind('.').map_or("", |pos| &base[pos..])
    }

    /// Appends `ext` when the base name is non-empty and has no dot at all.
    pub fn add_extension(&mut self, ext: &str) {
        let base = self.base();
        if !base.is_empty() && !base.contains('.') {
            self.0.push_str(ext);
        }
    }

    pub fn with_extension(mut self, ext: &str) -> Self {
        self.add_extension(ext);
        self
    }

    /// Path of `self` as seen from `base`, walking up with `..` where they
    /// diverge.
    pub fn relative_to(&self, base: &ModulePath) -> ModulePath {
        let ours: Vec<&str> = split(&self.0).collect();
        let theirs: Vec<&str> = split(&base.0).collect();
        let common = ours.iter().zip(&theirs).take_while(|(a, b)| a == b).count();

        let mut parts: Vec<&str> = vec![".."; theirs.len() - common];
        parts.extend_from_slice(&ours[common..]);
        ModulePath::new(&parts.join("/"))
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ModulePath {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<&str> for ModulePath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<ModulePath> for String {
    fn from(p: ModulePath) -> Self {
        p.0
    }
}
