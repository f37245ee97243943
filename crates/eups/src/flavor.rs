// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Platform flavors and variant matching.

use std::fmt;

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "./flavor_test.rs"]
mod flavor_test;

/// Separator between a base flavor and its variant qualifier.
pub const VARIANT_SEPARATOR: char = '+';

/// Flavor that any platform may fall back to when installing or looking up
/// products.
pub const GENERIC_FLAVOR: &str = "generic";

/// A target platform identifier such as `Linux` or `Linux+2.1.2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flavor(String);

impl Flavor {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Determine the flavor of the running host.
    pub fn detect() -> Self {
        let name = match (std::env::consts::OS, std::env::consts::ARCH) {
            ("linux", "x86_64") => "Linux64",
            ("linux", "aarch64") => "LinuxARM64",
            ("linux", _) => "Linux",
            ("macos", "x86_64") => "DarwinX86",
            ("macos", "aarch64") => "DarwinARM64",
            ("macos", _) => "Darwin",
            ("windows", _) => "Windows",
            (os, _) => os,
        };
        Self::new(name)
    }

    /// True if a guard written for `guard` applies to this flavor.
    ///
    /// A guard for a base flavor covers every variant of it, so `Linux`
    /// matches `Linux` and `Linux+2.1.2` but not `Linux64`.
    pub fn matches(&self, guard: &str) -> bool {
        match self.0.strip_prefix(guard) {
            Some(rest) => rest.is_empty() || rest.starts_with(VARIANT_SEPARATOR),
            None => false,
        }
    }

    /// Flavors to try, most specific first, when looking up an installed
    /// product for this flavor.
    pub fn fallbacks(&self) -> Vec<String> {
        let mut chain = vec![self.0.clone()];
        let mut current = self.0.as_str();
        while let Some((parent, _)) = current.rsplit_once(VARIANT_SEPARATOR) {
            chain.push(parent.to_string());
            current = parent;
        }
        if !chain.iter().any(|f| f.eq_ignore_ascii_case(GENERIC_FLAVOR)) {
            chain.push(GENERIC_FLAVOR.to_string());
        }
        chain
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Flavor {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Flavor {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Flavor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
