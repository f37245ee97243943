// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Rendering of environment mutations as shell statements.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::environment::Mutation;

#[cfg(test)]
#[path = "./shell_test.rs"]
mod shell_test;

/// Separator placed between rendered statements on standard output.
pub const STATEMENT_SEPARATOR: &str = ";\n";

/// Shell dialect the commands are rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
    /// Bourne family: sh, bash, zsh, ksh.
    #[default]
    Sh,
    /// C shell family: csh, tcsh.
    Csh,
}

impl Shell {
    /// Detect the dialect from `EUPS_SHELL` or `SHELL`, defaulting to sh.
    pub fn detect() -> Self {
        std::env::var("EUPS_SHELL")
            .or_else(|_| std::env::var("SHELL"))
            .ok()
            .and_then(|shell| Self::from_program(&shell))
            .unwrap_or_default()
    }

    /// Guess the dialect from a shell program path such as `/bin/tcsh`.
    pub fn from_program(program: &str) -> Option<Self> {
        let name = Path::new(program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(program);
        match name {
            "sh" | "bash" | "zsh" | "ksh" | "dash" => Some(Self::Sh),
            "csh" | "tcsh" => Some(Self::Csh),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sh => "sh",
            Self::Csh => "csh",
        }
    }

    /// Render one mutation as a single statement.
    pub fn render(&self, mutation: &Mutation) -> String {
        match (self, mutation) {
            (Self::Sh, Mutation::SetVar { name, value }) => {
                format!("export {name}={}", quote(value))
            }
            (Self::Csh, Mutation::SetVar { name, value }) => {
                format!("setenv {name} {}", quote(value))
            }
            (Self::Sh, Mutation::UnsetVar { name }) => format!("unset {name}"),
            (Self::Csh, Mutation::UnsetVar { name }) => format!("unsetenv {name}"),
            (Self::Sh, Mutation::SetAlias { name, command }) => {
                format!("alias {name}={}", quote(command))
            }
            (Self::Csh, Mutation::SetAlias { name, command }) => {
                format!("alias {name} {}", quote(command))
            }
            (_, Mutation::UnsetAlias { name }) => format!("unalias {name}"),
            (Self::Sh, Mutation::Source { script }) => format!(". {}", quote(script)),
            (Self::Csh, Mutation::Source { script }) => format!("source {}", quote(script)),
        }
    }

    /// Render a journal in order.
    pub fn render_all(&self, mutations: &[Mutation]) -> Vec<String> {
        mutations.iter().map(|m| self.render(m)).collect()
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-quote `value` so it is taken literally by either shell family.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
