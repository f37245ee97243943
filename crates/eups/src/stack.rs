// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Stacks: read-only databases of installed products.
//!
//! A stack root holds one directory per product under `ups_db/`:
//!
//! ```text
//! <stack>/ups_db/python/2.7.3.version   # where each flavor is installed
//! <stack>/ups_db/python/current.chain   # tag -> version per flavor
//! <stack>/ups_db/stack.yaml             # optional stack settings
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::flavor::Flavor;
use crate::product::{Product, default_table_file};
use crate::version::compare_versions;
use crate::{DEFAULT_TAG, Error, Result, UPS_DB};

#[cfg(test)]
#[path = "./stack_test.rs"]
mod stack_test;

pub const VERSION_EXTENSION: &str = "version";
pub const CHAIN_EXTENSION: &str = "chain";
pub const STACK_CONFIG_FILENAME: &str = "stack.yaml";

/// Table file value meaning the product has no table.
const NO_TABLE: &str = "none";

/// Contents of a `<version>.version` file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VersionFile {
    #[serde(default)]
    pub flavors: BTreeMap<String, FlavorEntry>,
}

/// Where one flavor of a version is installed.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FlavorEntry {
    /// Product directory, relative to the stack root unless absolute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prod_dir: Option<PathBuf>,
    /// Table file, relative to the product directory unless absolute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_file: Option<String>,
}

/// Contents of a `<tag>.chain` file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChainFile {
    #[serde(default)]
    pub versions: BTreeMap<String, String>,
}

/// Contents of `ups_db/stack.yaml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct StackConfig {
    #[serde(default)]
    default_tag: Option<String>,
}

fn read_yaml<T>(path: &Path) -> Result<Option<T>>
where
    T: serde::de::DeserializeOwned,
{
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(Error::ReadFailed {
                path: path.to_path_buf(),
                error,
            });
        }
    };
    serde_yaml::from_str(&text)
        .map(Some)
        .map_err(|error| Error::InvalidYaml {
            path: path.to_path_buf(),
            error,
        })
}

/// One stack root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    root: PathBuf,
    default_tag: String,
}

impl Stack {
    /// A stack with the built-in default tag and no settings file.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            default_tag: DEFAULT_TAG.to_string(),
        }
    }

    /// Open a stack, reading its settings file if it has one.
    /// `default_tag` applies when the stack does not name its own.
    pub fn open<P: Into<PathBuf>>(root: P, default_tag: &str) -> Result<Self> {
        let root = root.into();
        let config: StackConfig =
            read_yaml(&root.join(UPS_DB).join(STACK_CONFIG_FILENAME))?.unwrap_or_default();
        let default_tag = config
            .default_tag
            .unwrap_or_else(|| default_tag.to_string());
        Ok(Self { root, default_tag })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db_dir(&self) -> PathBuf {
        self.root.join(UPS_DB)
    }

    /// Tag used by the `default` resolution strategy.
    pub fn default_tag(&self) -> &str {
        &self.default_tag
    }

    fn product_dir(&self, name: &str) -> PathBuf {
        self.db_dir().join(name)
    }

    /// Look up an installed product by exact version.
    ///
    /// The most specific flavor declared for the version wins, see
    /// [`Flavor::fallbacks`].
    pub fn find_product(
        &self,
        name: &str,
        version: &str,
        flavor: &Flavor,
    ) -> Result<Option<Product>> {
        let path = self
            .product_dir(name)
            .join(format!("{version}.{VERSION_EXTENSION}"));
        let Some(file) = read_yaml::<VersionFile>(&path)? else {
            return Ok(None);
        };
        let found = flavor
            .fallbacks()
            .into_iter()
            .find_map(|f| file.flavors.get(&f).map(|entry| (f, entry)));
        let Some((declared, entry)) = found else {
            tracing::trace!(
                "{name} {version} in {} has no flavor among {:?}",
                self.root.display(),
                flavor.fallbacks()
            );
            return Ok(None);
        };
        Ok(Some(self.product(name, version, Flavor::new(declared), entry)))
    }

    fn product(&self, name: &str, version: &str, flavor: Flavor, entry: &FlavorEntry) -> Product {
        let root = match &entry.prod_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.root.join(dir),
            None => self.root.join(name).join(version),
        };
        let table_file = match entry.table_file.as_deref() {
            None => {
                let path = default_table_file(&root, name);
                path.is_file().then_some(path)
            }
            Some(table) if table.eq_ignore_ascii_case(NO_TABLE) => None,
            Some(table) => Some(root.join(table)),
        };
        Product {
            name: name.to_string(),
            version: version.to_string(),
            flavor,
            root,
            table_file,
            stack: Some(self.root.clone()),
        }
    }

    /// The version `tag` points at for `flavor`, if the tag is declared.
    pub fn tagged_version(&self, name: &str, tag: &str, flavor: &Flavor) -> Result<Option<String>> {
        let path = self
            .product_dir(name)
            .join(format!("{tag}.{CHAIN_EXTENSION}"));
        let Some(chain) = read_yaml::<ChainFile>(&path)? else {
            return Ok(None);
        };
        Ok(flavor
            .fallbacks()
            .into_iter()
            .find_map(|f| chain.versions.get(&f).cloned()))
    }

    /// Every version of `name` installed for `flavor`, oldest first.
    pub fn versions(&self, name: &str, flavor: &Flavor) -> Result<Vec<String>> {
        self.list(name, VERSION_EXTENSION)?
            .into_iter()
            .filter_map(|version| match self.find_product(name, &version, flavor) {
                Ok(Some(_)) => Some(Ok(version)),
                Ok(None) => None,
                Err(err) => Some(Err(err)),
            })
            .collect::<Result<Vec<_>>>()
            .map(|mut versions| {
                versions.sort_by(|a, b| compare_versions(a, b));
                versions
            })
    }

    fn list(&self, name: &str, extension: &str) -> Result<Vec<String>> {
        let dir = self.product_dir(name);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(Error::ReadFailed { path: dir, error }),
        };
        let mut names = Vec::new();
        for entry in entries {
            let file_name = entry?.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(stem) = file_name
                .strip_suffix(extension)
                .and_then(|s| s.strip_suffix('.'))
                .filter(|s| !s.is_empty())
            {
                names.push(stem.to_string());
            }
        }
        Ok(names)
    }
}

/// The ordered list of stack roots in scope, earlier roots first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackPath {
    roots: Vec<PathBuf>,
}

impl StackPath {
    /// Parse a colon separated list of stack roots, expanding a leading `~`.
    pub fn parse(list: &str) -> Self {
        let roots = list
            .split(':')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| PathBuf::from(shellexpand::tilde(s).into_owned()))
            .collect();
        Self { roots }
    }

    /// The stacks named by `EUPS_PATH`.
    pub fn from_env() -> Self {
        std::env::var(crate::EUPS_PATH_VAR)
            .map(|list| Self::parse(&list))
            .unwrap_or_default()
    }

    pub fn from_roots<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// Keep only the roots whose path contains `pattern`.
    pub fn select(&self, pattern: &str) -> Self {
        Self {
            roots: self
                .roots
                .iter()
                .filter(|root| root.to_string_lossy().contains(pattern))
                .cloned()
                .collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Open every stack in order.
    pub fn open(&self, default_tag: &str) -> Result<Vec<Stack>> {
        self.roots
            .iter()
            .map(|root| Stack::open(root.clone(), default_tag))
            .collect()
    }
}
