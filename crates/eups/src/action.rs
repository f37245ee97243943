// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Environment actions produced by flattening a table file.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::VersionSpec;

/// Separator used by path-like variables when a table does not name one.
pub const DEFAULT_SEPARATOR: &str = ":";

/// A product dependency named by `setupRequired` or `setupOptional`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub product: String,
    pub version: Option<VersionSpec>,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} {version}", self.product),
            None => f.write_str(&self.product),
        }
    }
}

/// What an action does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    SetEnv {
        var: String,
        value: String,
    },
    AppendEnv {
        var: String,
        value: String,
        separator: String,
    },
    PrependEnv {
        var: String,
        value: String,
        separator: String,
    },
    AddAlias {
        name: String,
        command: String,
    },
    RemoveAlias {
        name: String,
    },
    SetupRequired(Dependency),
    SetupOptional(Dependency),
    SourceRequired {
        script: String,
    },
}

/// A single environment mutation, tagged with the flavor it was
/// flattened for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    pub flavor: Option<String>,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self { kind, flavor: None }
    }

    /// Return a copy with every string parameter passed through `expand`.
    pub fn map_values<F>(&self, mut expand: F) -> Self
    where
        F: FnMut(&str) -> String,
    {
        let kind = match &self.kind {
            ActionKind::SetEnv { var, value } => ActionKind::SetEnv {
                var: var.clone(),
                value: expand(value),
            },
            ActionKind::AppendEnv {
                var,
                value,
                separator,
            } => ActionKind::AppendEnv {
                var: var.clone(),
                value: expand(value),
                separator: separator.clone(),
            },
            ActionKind::PrependEnv {
                var,
                value,
                separator,
            } => ActionKind::PrependEnv {
                var: var.clone(),
                value: expand(value),
                separator: separator.clone(),
            },
            ActionKind::AddAlias { name, command } => ActionKind::AddAlias {
                name: name.clone(),
                command: expand(command),
            },
            ActionKind::SourceRequired { script } => ActionKind::SourceRequired {
                script: expand(script),
            },
            other => other.clone(),
        };
        Self {
            kind,
            flavor: self.flavor.clone(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ActionKind::SetEnv { var, value } => write!(f, "envSet({var}, {value})"),
            ActionKind::AppendEnv { var, value, .. } => write!(f, "envAppend({var}, {value})"),
            ActionKind::PrependEnv { var, value, .. } => write!(f, "envPrepend({var}, {value})"),
            ActionKind::AddAlias { name, command } => write!(f, "addAlias({name}, {command})"),
            ActionKind::RemoveAlias { name } => write!(f, "unsetAlias({name})"),
            ActionKind::SetupRequired(dep) => write!(f, "setupRequired({dep})"),
            ActionKind::SetupOptional(dep) => write!(f, "setupOptional({dep})"),
            ActionKind::SourceRequired { script } => write!(f, "sourceRequired({script})"),
        }
    }
}

/// Direction in which actions are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Setup: activate a product.
    #[default]
    Forward,
    /// Unsetup: deactivate a product.
    Reverse,
}

impl Direction {
    pub fn is_forward(self) -> bool {
        self == Self::Forward
    }

    pub fn command_name(self) -> &'static str {
        match self {
            Self::Forward => "setup",
            Self::Reverse => "unsetup",
        }
    }
}
