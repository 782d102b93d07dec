//! Gathers module sources from the host filesystem before packaging.
//!
//! A single file becomes one source named after its base name. A directory
//! contributes every file beneath it, keyed by its path relative to the
//! directory's parent, and its main file comes from `package.json` when one
//! exists (`index.js` otherwise).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use super::modpath::ModulePath;
use super::PackageError;

const DEFAULT_MAIN: &str = "index.js";
const MANIFEST: &str = "package.json";
const SCRIPT_EXT: &str = ".js";

/// Plaintext content of a package: module ids mapped to their main source,
/// and every source keyed by module path. Sources are raw file bytes and
/// travel base64 encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageContents {
    pub modules: BTreeMap<String, ModulePath>,
    #[serde(serialize_with = "encode_sources", deserialize_with = "decode_sources")]
    pub sources: BTreeMap<ModulePath, Vec<u8>>,
}

fn encode_sources<S: Serializer>(sources: &BTreeMap<ModulePath, Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_map(sources.iter().map(|(path, bytes)| (path, STANDARD_NO_PAD.encode(bytes))))
}

fn decode_sources<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<ModulePath, Vec<u8>>, D::Error> {
    BTreeMap::<ModulePath, String>::deserialize(d)?
        .into_iter()
        .map(|(path, text)| {
            STANDARD_NO_PAD
                .decode(text)
                .map(|bytes| (path, bytes))
                .map_err(|e| D::Error::custom(format!("source encoding: {e}")))
        })
        .collect()
}

impl PackageContents {
    /// Collects every entry of `entries` (module id to host path).
    pub fn collect(entries: &BTreeMap<String, PathBuf>) -> Result<Self, PackageError> {
        let mut contents = PackageContents::default();
        for (id, path) in entries {
            if path.is_dir() {
                contents.add_dir(id, path)?;
            } else if path.is_file() {
                contents.add_file(id, path)?;
            } else {
                return Err(PackageError::Source(format!(
                    "{id}: {} is neither a file nor a directory",
                    path.display()
                )));
            }
        }
        Ok(contents)
    }

    fn add_file(&mut self, id: &str, path: &Path) -> Result<(), PackageError> {
        let name = ModulePath::new(&file_name(id, path)?);
        let content = read_source(id, path)?;
        debug!(module = id, source = %name, bytes = content.len(), "collected file module");
        self.sources.insert(name.clone(), content);
        self.modules.insert(id.to_string(), name);
        Ok(())
    }

    fn add_dir(&mut self, id: &str, dir: &Path) -> Result<(), PackageError> {
        let dir_name = ModulePath::new(&file_name(id, dir)?);
        let mut main = ModulePath::new(DEFAULT_MAIN);

        for file in list_files(id, dir)? {
            let rel = file
                .strip_prefix(dir)
                .map(ModulePath::from_host)
                .map_err(|e| PackageError::Source(format!("{id}: {e}")))?;
            let content = read_source(id, &file)?;
            if rel.as_str() == MANIFEST {
                main = manifest_main(id, &file, &content)?;
            }
            let name = dir_name.join(rel.as_str());
            debug!(module = id, source = %name, bytes = content.len(), "collected directory source");
            self.sources.insert(name, content);
        }

        self.modules.insert(id.to_string(), dir_name.join(main.as_str()));
        Ok(())
    }
}

fn file_name(id: &str, path: &Path) -> Result<String, PackageError> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| PackageError::Source(format!("{id}: {} has no file name", path.display())))
}

fn read_source(id: &str, path: &Path) -> Result<Vec<u8>, PackageError> {
    fs::read(path).map_err(|e| PackageError::Source(format!("{id}: can't open {}: {e}", path.display())))
}

/// Main file named by a directory's `package.json`, relative to the directory.
fn manifest_main(id: &str, file: &Path, content: &[u8]) -> Result<ModulePath, PackageError> {
    let json: Value = serde_json::from_slice(content)
        .map_err(|_| PackageError::Source(format!("{id}: can't load {}", file.display())))?;
    if !json.is_object() {
        return Err(PackageError::Source(format!("{id}: can't load {}", file.display())));
    }
    let main = json
        .get("main")
        .and_then(Value::as_str)
        .ok_or_else(|| PackageError::Source(format!("{id}: no \"main\" in {}", file.display())))?;
    Ok(ModulePath::new(main).with_extension(SCRIPT_EXT))
}

/// Every regular file under `dir`, recursively, in sorted order. Symlinks to
/// files are included; symlinked directories are not descended into.
fn list_files(id: &str, dir: &Path) -> Result<Vec<PathBuf>, PackageError> {
    let read_err = |e: std::io::Error| PackageError::Source(format!("{id}: can't list {}: {e}", dir.display()));

    let mut entries: Vec<(PathBuf, fs::FileType)> = fs::read_dir(dir)
        .map_err(read_err)?
        .map(|entry| entry.and_then(|e| Ok((e.path(), e.file_type()?))))
        .collect::<Result<_, _>>()
        .map_err(read_err)?;
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut files = Vec::new();
    for (path, kind) in entries {
        if kind.is_dir() {
            files.extend(list_files(id, &path)?);
        } else if kind.is_file() || (kind.is_symlink() && path.is_file()) {
            files.push(path);
        } else if kind.is_symlink() {
            debug!(module = id, path = %path.display(), "skipping symlink");
        }
    }
    Ok(files)
}
