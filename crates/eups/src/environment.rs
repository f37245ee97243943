// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! The environment a setup transaction mutates.
//!
//! An [`EnvironmentContext`] holds variables and aliases for exactly one
//! setup or unsetup invocation. It never touches the real process
//! environment: every change is recorded in an ordered journal of
//! [`Mutation`]s which can be rendered as shell commands for a parent shell
//! to evaluate.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::Result;

#[cfg(test)]
#[path = "./environment_test.rs"]
mod environment_test;

/// One recorded change to the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    SetVar { name: String, value: String },
    UnsetVar { name: String },
    SetAlias { name: String, command: String },
    UnsetAlias { name: String },
    Source { script: String },
}

/// Callback invoked for `sourceRequired` when the context is applied in
/// process rather than rendered for a shell.
pub type SourceHook = Box<dyn FnMut(&str) -> Result<()>>;

/// Which end of a separated value a segment was added to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentEnd {
    Front,
    Back,
}

#[derive(Default)]
pub struct EnvironmentContext {
    vars: BTreeMap<String, String>,
    aliases: BTreeMap<String, String>,
    // Value before the first change made in this transaction.
    prior_vars: HashMap<String, Option<String>>,
    prior_aliases: HashMap<String, Option<String>>,
    journal: Vec<Mutation>,
    source_hook: Option<SourceHook>,
}

impl fmt::Debug for EnvironmentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentContext")
            .field("vars", &self.vars)
            .field("aliases", &self.aliases)
            .field("journal", &self.journal)
            .field("source_hook", &self.source_hook.is_some())
            .finish()
    }
}

impl EnvironmentContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current process environment. The process environment
    /// itself is only read, never written.
    pub fn from_process() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::default()
        }
    }

    /// Seed the aliases known to be defined in the calling shell.
    pub fn with_aliases<I, K, V>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.aliases
            .extend(aliases.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn set_source_hook(&mut self, hook: SourceHook) {
        self.source_hook = Some(hook);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    pub fn alias(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    pub fn journal(&self) -> &[Mutation] {
        &self.journal
    }

    pub fn take_journal(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.journal)
    }

    pub fn set_var(&mut self, name: &str, value: &str) {
        self.remember_var(name);
        self.write_var(name, Some(value.to_string()));
    }

    pub fn unset_var(&mut self, name: &str) {
        self.remember_var(name);
        self.write_var(name, None);
    }

    /// Put `name` back to the value it had before this transaction first
    /// changed it. A variable this transaction never touched is removed.
    pub fn restore_var(&mut self, name: &str) {
        let prior = self.prior_vars.get(name).cloned().flatten();
        self.write_var(name, prior);
    }

    /// Add `value` to one end of `name`, joined with `separator`. An absent
    /// or empty variable simply becomes `value`.
    pub fn add_segment(&mut self, name: &str, value: &str, separator: &str, end: SegmentEnd) {
        let updated = match self.get(name) {
            None | Some("") => value.to_string(),
            Some(current) => match end {
                SegmentEnd::Front => format!("{value}{separator}{current}"),
                SegmentEnd::Back => format!("{current}{separator}{value}"),
            },
        };
        self.set_var(name, &updated);
    }

    /// Remove one occurrence of `value` from the given end of `name`.
    ///
    /// `value` may itself span several segments; only a run of whole
    /// segments matches. The variable is left present, possibly empty, even
    /// when nothing else remains or it was absent to begin with.
    pub fn remove_segment(&mut self, name: &str, value: &str, separator: &str, end: SegmentEnd) {
        let current = self.get(name).unwrap_or_default().to_string();
        let split = |s: &'_ str| -> Vec<String> {
            if s.is_empty() {
                Vec::new()
            } else if separator.is_empty() {
                vec![s.to_string()]
            } else {
                s.split(separator).map(str::to_string).collect()
            }
        };
        let mut segments = split(&current);
        let wanted = split(value);
        if !wanted.is_empty() && wanted.len() <= segments.len() {
            let last_start = segments.len() - wanted.len();
            let matches_at = |start: &usize| segments[*start..*start + wanted.len()] == wanted[..];
            let start = match end {
                SegmentEnd::Front => (0..=last_start).find(matches_at),
                SegmentEnd::Back => (0..=last_start).rev().find(matches_at),
            };
            if let Some(start) = start {
                segments.drain(start..start + wanted.len());
            }
        }
        let updated = segments.join(separator);
        self.set_var(name, &updated);
    }

    pub fn set_alias(&mut self, name: &str, command: &str) {
        self.remember_alias(name);
        self.write_alias(name, Some(command.to_string()));
    }

    pub fn unset_alias(&mut self, name: &str) {
        self.remember_alias(name);
        self.write_alias(name, None);
    }

    /// Put alias `name` back to its value from before this transaction.
    pub fn restore_alias(&mut self, name: &str) {
        let prior = self.prior_aliases.get(name).cloned().flatten();
        self.write_alias(name, prior);
    }

    /// Include a shell snippet, through the source hook if one is installed.
    pub fn source(&mut self, script: &str) -> Result<()> {
        if let Some(hook) = self.source_hook.as_mut() {
            hook(script)?;
        }
        self.journal.push(Mutation::Source {
            script: script.to_string(),
        });
        Ok(())
    }

    fn remember_var(&mut self, name: &str) {
        if !self.prior_vars.contains_key(name) {
            let current = self.vars.get(name).cloned();
            self.prior_vars.insert(name.to_string(), current);
        }
    }

    fn remember_alias(&mut self, name: &str) {
        if !self.prior_aliases.contains_key(name) {
            let current = self.aliases.get(name).cloned();
            self.prior_aliases.insert(name.to_string(), current);
        }
    }

    fn write_var(&mut self, name: &str, value: Option<String>) {
        match value {
            Some(value) => {
                self.vars.insert(name.to_string(), value.clone());
                self.journal.push(Mutation::SetVar {
                    name: name.to_string(),
                    value,
                });
            }
            None => {
                if self.vars.remove(name).is_some() {
                    self.journal.push(Mutation::UnsetVar {
                        name: name.to_string(),
                    });
                }
            }
        }
    }

    fn write_alias(&mut self, name: &str, command: Option<String>) {
        match command {
            Some(command) => {
                self.aliases.insert(name.to_string(), command.clone());
                self.journal.push(Mutation::SetAlias {
                    name: name.to_string(),
                    command,
                });
            }
            None => {
                if self.aliases.remove(name).is_some() {
                    self.journal.push(Mutation::UnsetAlias {
                        name: name.to_string(),
                    });
                }
            }
        }
    }
}
