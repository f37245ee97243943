// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! eups - Product Version Resolution and Environment Setup
//!
//! This crate provides the core library for selecting versions of installed
//! software products and computing the shell environment changes needed to
//! activate (or deactivate) them along with their dependencies.
//!
//! # Overview
//!
//! Products are installed into one or more stacks listed in `EUPS_PATH`.
//! Each product ships a table file describing how to modify the environment
//! and which other products it depends on. Setting up a product resolves a
//! version using the version resolution order (VRO), evaluates its table for
//! the current flavor, applies the actions to an [`EnvironmentContext`] and
//! recurses into its dependencies. The resulting environment is rendered as
//! shell statements for the caller to evaluate.
//!
//! # Example
//!
//! ```text
//! # ups/mypkg.table
//! setupRequired(python >= 3.8)
//! setupOptional(doxygen)
//! envPrepend(PATH, ${PRODUCT_DIR}/bin)
//!
//! if (FLAVOR == Linux) {
//!     envPrepend(LD_LIBRARY_PATH, ${PRODUCT_DIR}/lib)
//! }
//! ```

pub mod action;
pub mod config;
pub mod environment;
pub mod error;
pub mod execute;
pub mod flavor;
pub mod product;
pub mod resolver;
pub mod setup;
pub mod shell;
pub mod stack;
pub mod table;
pub mod version;
pub mod vro;

#[cfg(test)]
mod fixtures;

pub use action::{Action, ActionKind, Dependency, Direction};
pub use config::Config;
pub use environment::EnvironmentContext;
pub use error::{Error, Result};
pub use execute::{execute, execute_all};
pub use flavor::Flavor;
pub use product::{ActiveProduct, Product};
pub use resolver::{ProductRequest, Resolver};
pub use setup::{
    CommandCallback, Eups, SetupOptions, SetupRecord, SetupReport, SetupRequest, SetupStatus,
};
pub use shell::Shell;
pub use stack::{Stack, StackPath};
pub use table::Table;
pub use version::VersionSpec;
pub use vro::{Strategy, VroPolicy};

/// Environment variable listing the stacks to search, separated by `:`.
pub const EUPS_PATH_VAR: &str = "EUPS_PATH";

/// Environment variable overriding the detected host flavor.
pub const EUPS_FLAVOR_VAR: &str = "EUPS_FLAVOR";

/// Name of the per-stack database directory.
pub const UPS_DB: &str = "ups_db";

/// Name of the per-product directory holding its table file.
pub const UPS_DIR: &str = "ups";

/// Tag followed when the VRO asks for the default version.
pub const DEFAULT_TAG: &str = "current";
