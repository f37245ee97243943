// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Version resolution order: which strategies are tried, in which order,
//! to pick the version of a product.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "./vro_test.rs"]
mod vro_test;

/// Selector used when the request names neither a tag, a root nor a
/// version. Its strategies also back up any tag without its own entry.
pub const DEFAULT_SELECTOR: &str = "default";
pub const PATH_SELECTOR: &str = "path";
pub const VERSION_SELECTOR: &str = "commandLineVersion";

/// One way of picking a version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Strategy {
    /// Follow a named tag.
    Tag(String),
    /// Use the product root given with the request.
    Path,
    /// Use the version given with the request.
    CommandLineVersion,
    /// Follow the stack's default tag.
    Default,
}

impl Strategy {
    pub fn parse(token: &str) -> Self {
        match token {
            PATH_SELECTOR => Self::Path,
            VERSION_SELECTOR => Self::CommandLineVersion,
            DEFAULT_SELECTOR => Self::Default,
            tag => Self::Tag(tag.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Tag(tag) => tag,
            Self::Path => PATH_SELECTOR,
            Self::CommandLineVersion => VERSION_SELECTOR,
            Self::Default => DEFAULT_SELECTOR,
        }
    }
}

impl From<String> for Strategy {
    fn from(token: String) -> Self {
        Self::parse(&token)
    }
}

impl From<Strategy> for String {
    fn from(strategy: Strategy) -> Self {
        strategy.as_str().to_string()
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a strategy list written with commas and/or whitespace.
pub fn parse_strategies(text: &str) -> Vec<Strategy> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(Strategy::parse)
        .collect()
}

/// The selector a request maps to: its tag, else `path` when a root was
/// given, else `commandLineVersion` when a version was given, else
/// `default`.
pub fn selector(tag: Option<&str>, has_root: bool, has_version: bool) -> &str {
    match tag {
        Some(tag) => tag,
        None if has_root => PATH_SELECTOR,
        None if has_version => VERSION_SELECTOR,
        None => DEFAULT_SELECTOR,
    }
}

/// Maps selectors to the ordered strategies tried for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VroPolicy {
    rules: BTreeMap<String, Vec<Strategy>>,
}

impl Default for VroPolicy {
    fn default() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(
            DEFAULT_SELECTOR.to_string(),
            vec![Strategy::Path, Strategy::CommandLineVersion, Strategy::Default],
        );
        Self { rules }
    }
}

impl VroPolicy {
    /// Build a policy from configured rules. A missing `default` rule is
    /// filled in with the built-in one.
    pub fn new(rules: BTreeMap<String, Vec<Strategy>>) -> Self {
        let mut policy = Self { rules };
        if !policy.rules.contains_key(DEFAULT_SELECTOR) {
            policy.rules.extend(Self::default().rules);
        }
        policy
    }

    /// The strategies for `selector`.
    ///
    /// A tag without its own rule is tried first and then the `default`
    /// strategies apply.
    pub fn select(&self, selector: &str) -> Vec<Strategy> {
        if let Some(strategies) = self.rules.get(selector) {
            return strategies.clone();
        }
        let fallback = self
            .rules
            .get(DEFAULT_SELECTOR)
            .cloned()
            .unwrap_or_default();
        match Strategy::parse(selector) {
            Strategy::Tag(tag) => {
                let mut strategies = vec![Strategy::Tag(tag)];
                strategies.extend(fallback);
                strategies
            }
            _ => fallback,
        }
    }
}
