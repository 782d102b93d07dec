//! Encrypted module packages.
//!
//! [`Package::create`] collects module sources, seals them with a key derived
//! from an [`AuthToken`] and writes one file. [`Package::load`] opens such a
//! file with the same token and hands back a package whose modules can be
//! resolved with [`Package::require`].

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::auth::AuthToken;
use crate::crypto::cipher::ContentCipher;
use crate::crypto::kdf::sha256_hex;
use crate::crypto::CryptoError;

pub mod format;
pub mod modpath;
pub mod module;
pub mod sources;

pub use format::Container;
pub use modpath::ModulePath;
pub use module::{Module, Script};
pub use sources::PackageContents;

const SCRIPT_EXT: &str = ".js";
const JSON_EXT: &str = ".json";

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("{0}")]
    Source(String),
    #[error("package write error: {0}")]
    Write(String),
    #[error("package read error: {0}")]
    Read(String),
    #[error("package invalid format")]
    InvalidFormat,
    #[error("package invalid key")]
    InvalidKey,
    #[error("package content invalid: {0}")]
    Content(String),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("name argument empty")]
    EmptyName,
    #[error("{0}: invalid json: {1}")]
    InvalidJson(String, String),
}

/// A loaded package.
#[derive(Debug)]
pub struct Package {
    key: String,
    serial: u16,
    modules: BTreeMap<String, ModulePath>,
    sources: BTreeMap<ModulePath, Vec<u8>>,
    loaded: HashMap<ModulePath, Arc<Module>>,
}

impl Package {
    /// Packages the modules in `entries` (module id to file or directory) into
    /// `output`, truncating any existing file.
    pub fn create(auth: &AuthToken, output: &Path, entries: &BTreeMap<String, PathBuf>) -> Result<(), PackageError> {
        let contents = PackageContents::collect(entries)?;
        let bytes = seal(auth, &contents)?;

        let file = File::create(output).map_err(|e| PackageError::Write(format!("{}: {e}", output.display())))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&bytes)
            .and_then(|_| writer.flush())
            .map_err(|e| PackageError::Write(format!("{}: {e}", output.display())))?;

        info!(
            path = %output.display(),
            serial = auth.serial(),
            modules = contents.modules.len(),
            sources = contents.sources.len(),
            sha256 = %sha256_hex(&bytes),
            "package created"
        );
        Ok(())
    }

    /// Opens the package file at `input` with `auth`.
    pub fn load(auth: &AuthToken, input: &Path) -> Result<Self, PackageError> {
        let bytes = fs::read(input).map_err(|e| PackageError::Read(format!("{}: {e}", input.display())))?;
        let package = Self::from_reader(auth, &mut bytes.as_slice())?;
        info!(
            path = %input.display(),
            serial = package.serial,
            modules = package.modules.len(),
            sha256 = %sha256_hex(&bytes),
            "package loaded"
        );
        Ok(package)
    }

    /// Opens a package from any byte stream.
    pub fn from_reader<R: Read>(auth: &AuthToken, input: &mut R) -> Result<Self, PackageError> {
        let container = Container::read_from(input)?;
        if container.public_key != auth.public_key() {
            return Err(PackageError::InvalidKey);
        }

        let cipher = ContentCipher::for_private_key(auth.private_key())?;
        let plain = cipher.open(&format::header(&container.public_key), &container.nonce, &container.body)?;
        let contents: PackageContents =
            serde_json::from_slice(&plain).map_err(|e| PackageError::Content(format!("{e}")))?;

        Ok(Self {
            key: auth.public_key_string(),
            serial: auth.serial(),
            modules: contents.modules,
            sources: contents.sources,
            loaded: HashMap::new(),
        })
    }

    /// Public part of the auth token the package was opened with.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn serial(&self) -> u16 {
        self.serial
    }

    /// Module ids, sorted.
    pub fn names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    /// Resolves `name` from the package root.
    pub fn require(&mut self, name: &str) -> Result<Arc<Module>, PackageError> {
        self.require_from(name, None)
    }

    /// Resolves `name` as required by a script living in `from_dir`; relative
    /// names (starting with `.`) are looked up against that directory.
    pub fn require_from(&mut self, name: &str, from_dir: Option<&ModulePath>) -> Result<Arc<Module>, PackageError> {
        if name.is_empty() {
            return Err(PackageError::EmptyName);
        }

        let target = self.resolve(name, from_dir);
        if let Some(module) = self.loaded.get(&target) {
            debug!(name, target = %target, "module served from cache");
            return Ok(Arc::clone(module));
        }

        let Some(source) = self.sources.get(&target) else {
            debug!(name, target = %target, "module not in package");
            return Ok(Arc::new(Module::External(name.to_string())));
        };

        let module = if target.extension() == JSON_EXT {
            let value = serde_json::from_slice(source)
                .map_err(|e| PackageError::InvalidJson(target.to_string(), format!("{e}")))?;
            Module::Json(value)
        } else {
            Module::Script(Script {
                id: name.to_string(),
                filename: target.clone(),
                source: String::from_utf8_lossy(source).into_owned(),
            })
        };

        // the raw source goes only once the module exists
        self.sources.remove(&target);
        debug!(name, target = %target, kind = module.kind(), "module loaded");
        let module = Arc::new(module);
        self.loaded.insert(target, Arc::clone(&module));
        Ok(module)
    }

    fn resolve(&self, name: &str, from_dir: Option<&ModulePath>) -> ModulePath {
        if let Some(path) = self.modules.get(name) {
            return path.clone();
        }
        let path = match from_dir {
            Some(dir) if name.starts_with('.') => dir.join(name),
            _ => ModulePath::new(name),
        };
        path.with_extension(SCRIPT_EXT)
    }
}

/// Serializes and encrypts `contents` into container bytes.
pub fn seal(auth: &AuthToken, contents: &PackageContents) -> Result<Vec<u8>, PackageError> {
    let plain = serde_json::to_vec(contents).map_err(|e| PackageError::Content(format!("{e}")))?;
    let cipher = ContentCipher::for_private_key(auth.private_key())?;
    let sealed = cipher.seal(&format::header(auth.public_key()), &plain)?;

    let container = Container {
        public_key: auth.public_key().to_vec(),
        nonce: sealed.nonce,
        body: sealed.ciphertext,
    };
    let mut out = Vec::new();
    container
        .write_to(&mut out)
        .map_err(|e| PackageError::Write(format!("{e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{seal, Module, ModulePath, Package, PackageContents, PackageError};
    use crate::auth::AuthToken;
    use std::sync::Arc;

    fn contents() -> PackageContents {
        let mut c = PackageContents::default();
        c.modules.insert("m1".into(), "module1.js".into());
        c.modules.insert("m3".into(), "module3/index.js".into());
        c.modules.insert("cfg".into(), "settings.json".into());
        c.sources.insert("module1.js".into(), "exports.f = () => 'm1';".into());
        c.sources.insert("module3/index.js".into(), "module.exports = require('./lib/g');".into());
        c.sources.insert("module3/lib/g.js".into(), "exports.g = () => 'g';".into());
        c.sources.insert("settings.json".into(), r#"{"level": 3}"#.into());
        c
    }

    fn open(auth: &AuthToken) -> Package {
        let bytes = seal(auth, &contents()).unwrap();
        Package::from_reader(auth, &mut bytes.as_slice()).unwrap()
    }

    #[test]
    fn exposes_key_serial_and_sorted_names() {
        let auth = AuthToken::generate(1234).unwrap();
        let pkg = open(&auth);
        assert_eq!(pkg.key(), auth.public_key_string());
        assert_eq!(pkg.serial(), 1234);
        assert_eq!(pkg.names(), vec!["cfg", "m1", "m3"]);
    }

    #[test]
    fn other_token_is_rejected_as_invalid_key() {
        let bytes = seal(&AuthToken::generate(1).unwrap(), &contents()).unwrap();
        let err = Package::from_reader(&AuthToken::generate(2).unwrap(), &mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, PackageError::InvalidKey));
    }

    #[test]
    fn tampered_body_fails_authentication() {
        let auth = AuthToken::generate(77).unwrap();
        let mut bytes = seal(&auth, &contents()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = Package::from_reader(&auth, &mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, PackageError::Crypto(_)));
    }

    #[test]
    fn requires_module_by_id() {
        let mut pkg = open(&AuthToken::generate(5).unwrap());
        let m1 = pkg.require("m1").unwrap();
        let script = m1.as_script().unwrap();
        assert_eq!(script.id, "m1");
        assert_eq!(script.filename.as_str(), "module1.js");
        assert_eq!(script.source, "exports.f = () => 'm1';");
    }

    #[test]
    fn caches_required_modules() {
        let mut pkg = open(&AuthToken::generate(5).unwrap());
        let first = pkg.require("m1").unwrap();
        let second = pkg.require("m1").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        // the same file reached by path shares the cache entry
        let by_path = pkg.require("module1").unwrap();
        assert!(Arc::ptr_eq(&first, &by_path));
    }

    #[test]
    fn resolves_relative_requires_from_script_dir() {
        let mut pkg = open(&AuthToken::generate(5).unwrap());
        let m3 = pkg.require("m3").unwrap();
        let dir = m3.as_script().unwrap().dirname();
        assert_eq!(dir.as_str(), "module3");

        let g = pkg.require_from("./lib/g", Some(&dir)).unwrap();
        assert_eq!(g.as_script().unwrap().filename.as_str(), "module3/lib/g.js");
    }

    #[test]
    fn parses_json_modules() {
        let mut pkg = open(&AuthToken::generate(5).unwrap());
        let cfg = pkg.require("cfg").unwrap();
        match cfg.as_ref() {
            Module::Json(value) => assert_eq!(value["level"], 3),
            other => panic!("expected json module, got {other:?}"),
        }
    }

    #[test]
    fn unknown_names_are_external() {
        let mut pkg = open(&AuthToken::generate(5).unwrap());
        let fs = pkg.require("fs").unwrap();
        assert_eq!(*fs, Module::External("fs".into()));
        let rel = pkg.require_from("./missing", Some(&ModulePath::new("module3"))).unwrap();
        assert_eq!(rel.kind(), "external");
    }

    #[test]
    fn empty_name_is_an_error() {
        let mut pkg = open(&AuthToken::generate(5).unwrap());
        assert!(matches!(pkg.require(""), Err(PackageError::EmptyName)));
    }

    #[test]
    fn invalid_json_names_the_source() {
        let auth = AuthToken::generate(9).unwrap();
        let mut c = PackageContents::default();
        c.modules.insert("bad".into(), "bad.json".into());
        c.sources.insert("bad.json".into(), "{nope".into());
        let bytes = seal(&auth, &c).unwrap();
        let mut pkg = Package::from_reader(&auth, &mut bytes.as_slice()).unwrap();
        let err = pkg.require("bad").unwrap_err();
        assert!(err.to_string().starts_with("bad.json: invalid json"));
        // a failed parse leaves the source in place
        assert!(matches!(pkg.require("bad"), Err(PackageError::InvalidJson(..))));
    }

    #[test]
    fn materialized_sources_leave_the_table() {
        let mut pkg = open(&AuthToken::generate(5).unwrap());
        assert!(pkg.sources.contains_key(&ModulePath::from("module1.js")));
        pkg.require("m1").unwrap();
        assert!(!pkg.sources.contains_key(&ModulePath::from("module1.js")));
        assert!(pkg.sources.contains_key(&ModulePath::from("module3/lib/g.js")));
    }

    #[test]
    fn non_utf8_script_bytes_are_read_lossily() {
        let auth = AuthToken::generate(9).unwrap();
        let mut c = PackageContents::default();
        c.modules.insert("raw".into(), "raw.js".into());
        c.sources.insert("raw.js".into(), vec![b'x', 0xFF, b'y']);
        let bytes = seal(&auth, &c).unwrap();
        let mut pkg = Package::from_reader(&auth, &mut bytes.as_slice()).unwrap();
        let raw = pkg.require("raw").unwrap();
        assert_eq!(raw.as_script().unwrap().source, "x\u{FFFD}y");
    }
}
