// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Helpers for building throw-away stacks in tests.

use std::path::{Path, PathBuf};

use rstest::fixture;
use tempfile::TempDir;

use crate::stack::{CHAIN_EXTENSION, ChainFile, FlavorEntry, Stack, VERSION_EXTENSION, VersionFile};
use crate::UPS_DB;

#[fixture]
pub fn tmpdir() -> TempDir {
    tempfile::Builder::new()
        .prefix("eups-test-")
        .tempdir()
        .expect("failed to create dir for test")
}

/// Writes product declarations into a stack directory.
pub struct StackBuilder {
    root: PathBuf,
}

impl StackBuilder {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        let root = root.into();
        std::fs::create_dir_all(root.join(UPS_DB)).expect("failed to create stack");
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Declare `name` `version` for `flavor`, installing `table` as its
    /// table file when given.
    pub fn product(&self, name: &str, version: &str, flavor: &str, table: Option<&str>) -> &Self {
        let prod_dir = PathBuf::from(flavor).join(name).join(version);
        let abs_dir = self.root.join(&prod_dir);
        std::fs::create_dir_all(&abs_dir).expect("failed to create product dir");
        let table_file = match table {
            Some(content) => {
                let ups = abs_dir.join("ups");
                std::fs::create_dir_all(&ups).expect("failed to create ups dir");
                std::fs::write(ups.join(format!("{name}.table")), content)
                    .expect("failed to write table");
                None
            }
            None => Some("none".to_string()),
        };

        let path = self.db_file(name, version, VERSION_EXTENSION);
        let mut file: VersionFile = read_or_default(&path);
        file.flavors.insert(
            flavor.to_string(),
            FlavorEntry {
                prod_dir: Some(prod_dir),
                table_file,
            },
        );
        write_yaml(&path, &file);
        self
    }

    /// Point `tag` at `version` for `flavor`.
    pub fn tag(&self, name: &str, tag: &str, flavor: &str, version: &str) -> &Self {
        let path = self.db_file(name, tag, CHAIN_EXTENSION);
        let mut chain: ChainFile = read_or_default(&path);
        chain
            .versions
            .insert(flavor.to_string(), version.to_string());
        write_yaml(&path, &chain);
        self
    }

    pub fn stack(&self) -> Stack {
        Stack::open(self.root.clone(), crate::DEFAULT_TAG).expect("failed to open stack")
    }

    fn db_file(&self, name: &str, stem: &str, extension: &str) -> PathBuf {
        let dir = self.root.join(UPS_DB).join(name);
        std::fs::create_dir_all(&dir).expect("failed to create product db dir");
        dir.join(format!("{stem}.{extension}"))
    }
}

fn read_or_default<T>(path: &Path) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    std::fs::read_to_string(path)
        .ok()
        .and_then(|text| serde_yaml::from_str(&text).ok())
        .unwrap_or_default()
}

fn write_yaml<T: serde::Serialize>(path: &Path, value: &T) {
    let text = serde_yaml::to_string(value).expect("failed to serialize");
    std::fs::write(path, text).expect("failed to write yaml");
}
