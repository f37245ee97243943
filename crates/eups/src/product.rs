// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Installed products and the bookkeeping that marks them as active.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::action::Action;
use crate::environment::EnvironmentContext;
use crate::flavor::Flavor;
use crate::table::{TABLE_EXTENSION, Table};
use crate::{Error, Result, UPS_DIR};

#[cfg(test)]
#[path = "./product_test.rs"]
mod product_test;

/// Version prefix of products taken straight from a directory.
pub const LOCAL_VERSION_PREFIX: &str = "LOCAL:";

/// Stack recorded for products that do not come from a stack.
const NO_STACK: &str = "(none)";

/// An installed product, identified by name, version and flavor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub name: String,
    pub version: String,
    pub flavor: Flavor,
    pub root: PathBuf,
    /// `None` when the product declares no table file.
    pub table_file: Option<PathBuf>,
    /// The stack the product was found in.
    pub stack: Option<PathBuf>,
}

impl Product {
    /// A product set up directly from a directory rather than a stack.
    pub fn local<P: Into<PathBuf>>(name: &str, root: P, flavor: Flavor) -> Self {
        let root = root.into();
        let table = default_table_file(&root, name);
        Self {
            name: name.to_string(),
            version: format!("{LOCAL_VERSION_PREFIX}{}", root.display()),
            flavor,
            table_file: table.is_file().then_some(table),
            root,
            stack: None,
        }
    }

    /// Set up a product from a root directory, guessing its name from the
    /// single table file under `ups/` when no name is given.
    pub fn from_root(root: &Path, name: Option<&str>, flavor: Flavor) -> Result<Self> {
        let root = dunce::canonicalize(root).map_err(|err| Error::InvalidProductRoot {
            path: root.to_path_buf(),
            reason: err.to_string(),
        })?;
        if !root.is_dir() {
            return Err(Error::InvalidProductRoot {
                path: root,
                reason: "not a directory".into(),
            });
        }
        let name = match name {
            Some(name) => name.to_string(),
            None => guess_product(&root)?,
        };
        Ok(Self::local(&name, root, flavor))
    }

    /// Set up a product from an explicit table file. The product name
    /// defaults to the file stem and the root to the file's directory.
    pub fn from_table_file(table: &Path, name: Option<&str>, flavor: Flavor) -> Result<Self> {
        let name = name.map(str::to_string).or_else(|| {
            table
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string)
        });
        let Some(name) = name else {
            return Err(Error::UnderSpecifiedProduct {
                name: None,
                version: None,
                flavor: Some(flavor.to_string()),
            });
        };
        if !table.is_file() {
            return Err(Error::UnderSpecifiedProduct {
                name: Some(name),
                version: None,
                flavor: Some(flavor.to_string()),
            });
        }
        let root = table
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let root = dunce::canonicalize(&root).unwrap_or(root);
        let mut product = Self::local(&name, root, flavor);
        product.table_file = Some(table.to_path_buf());
        Ok(product)
    }

    pub fn is_local(&self) -> bool {
        self.version.starts_with(LOCAL_VERSION_PREFIX)
    }

    /// Load this product's table, if it declares one.
    pub fn load_table(&self) -> Result<Option<Table>> {
        let Some(path) = &self.table_file else {
            return Ok(None);
        };
        match Table::load(path) {
            Err(Error::TablefileNotFound { path, .. }) => Err(Error::TablefileNotFound {
                path,
                name: Some(self.name.clone()),
                version: Some(self.version.clone()),
                flavor: Some(self.flavor.to_string()),
            }),
            other => other.map(Some),
        }
    }

    /// The actions this product's table contributes, with product
    /// placeholders such as `${PRODUCT_DIR}` expanded.
    pub fn actions(&self, flavor: Option<&str>, build_type: Option<&str>) -> Result<Vec<Action>> {
        let Some(table) = self.load_table()? else {
            return Ok(Vec::new());
        };
        Ok(table
            .actions(flavor, build_type)
            .iter()
            .map(|action| action.map_values(|value| self.expand(value)))
            .collect())
    }

    /// Expand the product placeholders in `value`. Anything else that
    /// looks like a variable is left for the shell.
    pub fn expand(&self, value: &str) -> String {
        let root = self.root.to_string_lossy();
        let ups_dir = self.root.join(UPS_DIR);
        let ups_dir = ups_dir.to_string_lossy();
        shellexpand::env_with_context_no_errors(value, |var| match var {
            "PRODUCT_DIR" => Some(root.to_string()),
            "PRODUCT_NAME" => Some(self.name.clone()),
            "PRODUCT_VERSION" => Some(self.version.clone()),
            "PRODUCT_FLAVOR" => Some(self.flavor.to_string()),
            "UPS_DIR" => Some(ups_dir.to_string()),
            _ => None,
        })
        .into_owned()
    }

    /// Value of the `SETUP_<PRODUCT>` variable for this product.
    ///
    /// A version containing whitespace, such as `LOCAL:<root>` under a
    /// spaced path, is double quoted. The stack is always the last field.
    pub fn setup_value(&self) -> String {
        let stack = self
            .stack
            .as_ref()
            .map(|s| s.display().to_string())
            .unwrap_or_else(|| NO_STACK.to_string());
        let version = if self.version.contains(char::is_whitespace) {
            format!("\"{}\"", self.version)
        } else {
            self.version.clone()
        };
        format!("{} {version} -f {} -Z {stack}", self.name, self.flavor)
    }

    /// Record this product as active in `ctx`.
    pub fn mark_active(&self, ctx: &mut EnvironmentContext) {
        ctx.set_var(&dir_var(&self.name), &self.root.to_string_lossy());
        ctx.set_var(&setup_var(&self.name), &self.setup_value());
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.name, self.version, self.flavor)
    }
}

/// A product recorded as active in an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveProduct {
    pub name: String,
    pub version: String,
    pub flavor: Option<Flavor>,
    pub stack: Option<PathBuf>,
    pub root: Option<PathBuf>,
}

impl ActiveProduct {
    /// Read the bookkeeping variables for `name` from `ctx`.
    pub fn find(ctx: &EnvironmentContext, name: &str) -> Option<Self> {
        let value = ctx.get(&setup_var(name))?;
        let mut active = Self::parse(value)?;
        active.root = ctx.get(&dir_var(name)).map(PathBuf::from);
        Some(active)
    }

    /// Parse a `SETUP_<PRODUCT>` value: `name version [-f flavor] [-Z stack]`.
    ///
    /// The version may be double quoted and everything after `-Z ` is the
    /// stack, so both can contain spaces.
    pub fn parse(value: &str) -> Option<Self> {
        let (name, rest) = value.trim().split_once(char::is_whitespace)?;
        let rest = rest.trim_start();
        let (version, mut rest) = match rest.strip_prefix('"') {
            Some(quoted) => quoted.split_once('"')?,
            None => rest.split_once(char::is_whitespace).unwrap_or((rest, "")),
        };
        if version.is_empty() {
            return None;
        }
        let mut flavor = None;
        let mut stack = None;
        loop {
            rest = rest.trim_start();
            if let Some(path) = rest.strip_prefix("-Z ") {
                let path = path.trim();
                stack = (!path.is_empty() && path != NO_STACK).then(|| PathBuf::from(path));
                break;
            }
            let Some((word, tail)) = rest.split_once(char::is_whitespace) else {
                break;
            };
            if word == "-f" {
                let tail = tail.trim_start();
                let (f, tail) = tail.split_once(char::is_whitespace).unwrap_or((tail, ""));
                flavor = (!f.is_empty()).then(|| Flavor::from(f));
                rest = tail;
            } else {
                rest = tail;
            }
        }
        Some(Self {
            name: name.to_string(),
            version: version.to_string(),
            flavor,
            stack,
            root: None,
        })
    }

    /// Remove the bookkeeping variables for this product.
    pub fn clear(&self, ctx: &mut EnvironmentContext) {
        ctx.unset_var(&dir_var(&self.name));
        ctx.unset_var(&setup_var(&self.name));
    }
}

/// The product name as it appears in variable names: upper case, with
/// anything other than ASCII letters and digits replaced by `_`.
pub fn env_name(product: &str) -> String {
    product
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// `<PRODUCT>_DIR`
pub fn dir_var(product: &str) -> String {
    format!("{}_DIR", env_name(product))
}

/// `SETUP_<PRODUCT>`
pub fn setup_var(product: &str) -> String {
    format!("SETUP_{}", env_name(product))
}

/// Default location of a product's table file under its root.
pub fn default_table_file(root: &Path, name: &str) -> PathBuf {
    root.join(UPS_DIR).join(format!("{name}.{TABLE_EXTENSION}"))
}

/// Guess the product installed at `root` from the table files under
/// `ups/`. Exactly one table file must exist.
pub fn guess_product(root: &Path) -> Result<String> {
    let ups = root.join(UPS_DIR);
    let entries = std::fs::read_dir(&ups).map_err(|err| Error::InvalidProductRoot {
        path: root.to_path_buf(),
        reason: format!("cannot read {}: {err}", ups.display()),
    })?;
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == TABLE_EXTENSION))
        .filter_map(|path| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string)
        })
        .collect();
    match names.len() {
        1 => Ok(names.remove(0)),
        0 => Err(Error::InvalidProductRoot {
            path: root.to_path_buf(),
            reason: format!("no table file in {}", ups.display()),
        }),
        _ => {
            names.sort();
            Err(Error::InvalidProductRoot {
                path: root.to_path_buf(),
                reason: format!("cannot guess product name, found {}", names.join(", ")),
            })
        }
    }
}
