// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;
use crate::fixtures::{StackBuilder, tmpdir};

#[rstest]
fn test_find_product_by_exact_version(tmpdir: TempDir) {
    let builder = StackBuilder::new(tmpdir.path());
    builder.product("python", "2.7.3", "Linux", Some("envSet(PY, 1)\n"));
    let stack = builder.stack();

    let product = stack
        .find_product("python", "2.7.3", &Flavor::new("Linux"))
        .unwrap()
        .unwrap();
    assert_eq!(product.name, "python");
    assert_eq!(product.version, "2.7.3");
    assert_eq!(product.root, tmpdir.path().join("Linux/python/2.7.3"));
    assert_eq!(
        product.table_file,
        Some(tmpdir.path().join("Linux/python/2.7.3/ups/python.table"))
    );
    assert_eq!(product.stack.as_deref(), Some(tmpdir.path()));

    assert!(stack
        .find_product("python", "3.0", &Flavor::new("Linux"))
        .unwrap()
        .is_none());
    assert!(stack
        .find_product("python", "2.7.3", &Flavor::new("Darwin"))
        .unwrap()
        .is_none());
}

#[rstest]
fn test_flavor_fallback(tmpdir: TempDir) {
    let builder = StackBuilder::new(tmpdir.path());
    builder
        .product("lib", "1.0", "Linux", None)
        .product("data", "1.0", "generic", None);
    let stack = builder.stack();

    let variant = Flavor::new("Linux+2.1.2");
    let lib = stack.find_product("lib", "1.0", &variant).unwrap().unwrap();
    assert_eq!(lib.flavor.as_str(), "Linux");
    assert!(lib.table_file.is_none());

    let data = stack.find_product("data", "1.0", &variant).unwrap().unwrap();
    assert_eq!(data.flavor.as_str(), "generic");
}

#[rstest]
fn test_tags_and_versions(tmpdir: TempDir) {
    let builder = StackBuilder::new(tmpdir.path());
    builder
        .product("python", "2.7", "Linux", None)
        .product("python", "2.10", "Linux", None)
        .product("python", "3.1", "Darwin", None)
        .tag("python", "current", "Linux", "2.7")
        .tag("python", "beta", "Linux", "2.10");
    let stack = builder.stack();
    let linux = Flavor::new("Linux");

    assert_eq!(stack.versions("python", &linux).unwrap(), vec!["2.7", "2.10"]);
    assert_eq!(
        stack.tagged_version("python", "current", &linux).unwrap(),
        Some("2.7".to_string())
    );
    assert_eq!(
        stack
            .tagged_version("python", "current", &Flavor::new("Darwin"))
            .unwrap(),
        None
    );
    assert_eq!(stack.tagged_version("python", "stable", &linux).unwrap(), None);
    assert!(stack.versions("ghost", &linux).unwrap().is_empty());
}

#[rstest]
fn test_stack_default_tag(tmpdir: TempDir) {
    let builder = StackBuilder::new(tmpdir.path());
    assert_eq!(builder.stack().default_tag(), "current");

    std::fs::write(
        tmpdir.path().join(UPS_DB).join(STACK_CONFIG_FILENAME),
        "default_tag: stable\n",
    )
    .unwrap();
    let stack = Stack::open(tmpdir.path(), "current").unwrap();
    assert_eq!(stack.default_tag(), "stable");
}

#[rstest]
fn test_invalid_version_file(tmpdir: TempDir) {
    let dir = tmpdir.path().join(UPS_DB).join("broken");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("1.0.version"), "flavors: [not, a, map]\n").unwrap();
    let stack = Stack::new(tmpdir.path());
    let err = stack
        .find_product("broken", "1.0", &Flavor::new("Linux"))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidYaml { .. }));
}

#[rstest]
fn test_stack_path_parse_and_select() {
    let path = StackPath::parse("/opt/lsst/stack::/home/me/devstack: ");
    assert_eq!(
        path.roots(),
        &[
            PathBuf::from("/opt/lsst/stack"),
            PathBuf::from("/home/me/devstack")
        ]
    );
    let selected = path.select("devstack");
    assert_eq!(selected.roots(), &[PathBuf::from("/home/me/devstack")]);
    assert!(path.select("nothing").is_empty());
}

#[rstest]
fn test_stack_path_expands_home() {
    let Some(home) = dirs::home_dir() else {
        return;
    };
    let path = StackPath::parse("~/stack");
    assert_eq!(path.roots(), &[home.join("stack")]);
}
