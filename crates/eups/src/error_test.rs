// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use rstest::rstest;

use super::*;

#[rstest]
fn test_product_not_found_message() {
    let err = Error::ProductNotFound {
        name: "python".to_string(),
        version: Some("2.7".to_string()),
        flavors: vec!["Linux".to_string()],
        stack: Some(PathBuf::from("/opt/stack")),
    };
    assert_eq!(
        err.to_string(),
        "Product python 2.7 for [\"Linux\"] not found in /opt/stack"
    );

    let bare = Error::ProductNotFound {
        name: "python".to_string(),
        version: None,
        flavors: Vec::new(),
        stack: None,
    };
    assert_eq!(bare.to_string(), "Product python not found");
}

#[rstest]
fn test_under_specified_message() {
    let err = Error::UnderSpecifiedProduct {
        name: None,
        version: Some("1.0".to_string()),
        flavor: None,
    };
    assert_eq!(err.to_string(), "Under-specified product: None ver: 1.0");
}

#[rstest]
fn test_tablefile_not_found_message() {
    let err = Error::TablefileNotFound {
        path: Some(PathBuf::from("/p/ups/p.table")),
        name: Some("p".to_string()),
        version: Some("1.0".to_string()),
        flavor: Some("Linux".to_string()),
    };
    assert_eq!(
        err.to_string(),
        "Table file not found for p 1.0 (Linux): /p/ups/p.table"
    );
}

#[rstest]
#[case(Error::UnderSpecifiedProduct { name: None, version: None, flavor: None }, 3)]
#[case(Error::InvalidProductRoot { path: PathBuf::from("/x"), reason: "no ups".into() }, 4)]
#[case(Error::CallbackFailed { command: "setup".into(), reason: "boom".into() }, 9)]
#[case(Error::OperationForbidden { command: "setup".into(), reason: "locked".into() }, 255)]
#[case(Error::ProductNotSetup { name: "p".into() }, 1)]
fn test_exit_status(#[case] err: Error, #[case] expected: i32) {
    assert_eq!(err.exit_status(), expected);
}

#[rstest]
fn test_not_found_classification() {
    let conflict = Error::VersionConflict {
        name: "p".into(),
        active_version: "1".into(),
        requested_version: "2".into(),
    };
    assert!(!conflict.is_not_found());
    let missing = Error::TablefileNotFound {
        path: None,
        name: None,
        version: None,
        flavor: None,
    };
    assert!(missing.is_not_found());
}
