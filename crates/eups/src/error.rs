// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for eups operations.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[cfg(test)]
#[path = "./error_test.rs"]
mod error_test;

/// Convenience Result type with eups Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during eups operations.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// The requested product is not declared in any stack in scope
    #[error("{}", product_not_found_message(.name, .version.as_deref(), .flavors, .stack.as_ref()))]
    #[diagnostic(
        code(eups::product_not_found),
        help("Check the product name, the requested version or tag, and the stacks in EUPS_PATH")
    )]
    ProductNotFound {
        name: String,
        version: Option<String>,
        flavors: Vec<String>,
        stack: Option<PathBuf>,
    },

    /// Not enough information was given to even attempt a resolution
    #[error("{}", under_specified_message(.name.as_deref(), .version.as_deref(), .flavor.as_deref()))]
    #[diagnostic(
        code(eups::under_specified_product),
        help("Specify at least a product name or a product root directory (-r)")
    )]
    UnderSpecifiedProduct {
        name: Option<String>,
        version: Option<String>,
        flavor: Option<String>,
    },

    /// The table file of a resolved product does not exist
    #[error("{}", tablefile_not_found_message(.path.as_ref(), .name.as_deref(), .version.as_deref(), .flavor.as_deref()))]
    #[diagnostic(code(eups::tablefile_not_found))]
    TablefileNotFound {
        path: Option<PathBuf>,
        name: Option<String>,
        version: Option<String>,
        flavor: Option<String>,
    },

    /// A table file could not be parsed
    #[error("Malformed table file {path:?}, line {line}: {detail}")]
    #[diagnostic(code(eups::malformed_table))]
    MalformedTable {
        path: PathBuf,
        line: usize,
        detail: String,
    },

    /// A dependency is already active under another version
    #[error("Product {name} {active_version} is already setup, but version {requested_version} was requested")]
    #[diagnostic(
        code(eups::version_conflict),
        help("Use --force to replace the active version, or --keep to leave it in place")
    )]
    VersionConflict {
        name: String,
        active_version: String,
        requested_version: String,
    },

    /// A product root directory could not be used
    #[error("Invalid product root {path:?}: {reason}")]
    #[diagnostic(code(eups::invalid_product_root))]
    InvalidProductRoot { path: PathBuf, reason: String },

    /// Unsetup was requested for a product that is not active
    #[error("Product {name} is not setup")]
    #[diagnostic(code(eups::product_not_setup))]
    ProductNotSetup { name: String },

    /// A version specification could not be parsed
    #[error("Invalid version specification '{spec}': {reason}")]
    #[diagnostic(code(eups::invalid_version_spec))]
    InvalidVersionSpec { spec: String, reason: String },

    /// A command callback refused the operation
    #[error("Operation {command} forbidden: {reason}")]
    #[diagnostic(code(eups::operation_forbidden))]
    OperationForbidden { command: String, reason: String },

    /// A command callback failed
    #[error("Command callback for {command} failed: {reason}")]
    #[diagnostic(code(eups::callback_failed))]
    CallbackFailed { command: String, reason: String },

    /// Invalid YAML in a configuration or database file
    #[error("Invalid YAML in {path:?}: {error}")]
    #[diagnostic(code(eups::invalid_yaml))]
    InvalidYaml {
        path: PathBuf,
        #[source]
        error: serde_yaml::Error,
    },

    /// Failed to read file
    #[error("Failed to read file: {path:?}")]
    #[diagnostic(code(eups::read_failed))]
    ReadFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// IO error passthrough
    #[error(transparent)]
    #[diagnostic(code(eups::io_error))]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The process exit status the command line reports for this error.
    pub fn exit_status(&self) -> i32 {
        match self {
            Self::UnderSpecifiedProduct { .. } => 3,
            Self::InvalidProductRoot { .. } => 4,
            Self::CallbackFailed { .. } => 9,
            Self::OperationForbidden { .. } => 255,
            _ => 1,
        }
    }

    /// True for failures that mean "nothing suitable is installed", which
    /// optional dependencies are allowed to ignore.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ProductNotFound { .. }
                | Self::UnderSpecifiedProduct { .. }
                | Self::TablefileNotFound { .. }
        )
    }
}

fn product_not_found_message(
    name: &str,
    version: Option<&str>,
    flavors: &[String],
    stack: Option<&PathBuf>,
) -> String {
    let mut message = format!("Product {name}");
    if let Some(version) = version {
        message.push_str(&format!(" {version}"));
    }
    if !flavors.is_empty() {
        message.push_str(&format!(" for {flavors:?}"));
    }
    message.push_str(" not found");
    if let Some(stack) = stack {
        message.push_str(&format!(" in {}", stack.display()));
    }
    message
}

fn under_specified_message(
    name: Option<&str>,
    version: Option<&str>,
    flavor: Option<&str>,
) -> String {
    let mut message = format!("Under-specified product: {}", name.unwrap_or("None"));
    if let Some(version) = version {
        message.push_str(&format!(" ver: {version}"));
    }
    if let Some(flavor) = flavor {
        message.push_str(&format!(" flavor: {flavor}"));
    }
    message
}

fn tablefile_not_found_message(
    path: Option<&PathBuf>,
    name: Option<&str>,
    version: Option<&str>,
    flavor: Option<&str>,
) -> String {
    let mut message = "Table file not found".to_string();
    if let Some(name) = name {
        message.push_str(&format!(" for {name}"));
    }
    if let Some(version) = version {
        message.push_str(&format!(" {version}"));
    }
    if let Some(flavor) = flavor {
        message.push_str(&format!(" ({flavor})"));
    }
    if let Some(path) = path {
        message.push_str(&format!(": {}", path.display()));
    }
    message
}
