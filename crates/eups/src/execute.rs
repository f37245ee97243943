// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Forward and reverse execution of actions against an environment.

use crate::action::{Action, ActionKind, Dependency, Direction};
use crate::environment::{EnvironmentContext, SegmentEnd};
use crate::Result;

#[cfg(test)]
#[path = "./execute_test.rs"]
mod execute_test;

/// Receives the dependency actions met while executing a table.
pub trait DependencyHandler {
    /// Set up, or unset up, `dependency` within the current transaction.
    fn setup_dependency(
        &mut self,
        dependency: &Dependency,
        optional: bool,
        ctx: &mut EnvironmentContext,
        direction: Direction,
    ) -> Result<()>;

    /// Note a dependency that is not being expanded.
    fn record_dependency(&mut self, dependency: &Dependency, optional: bool, direction: Direction);
}

/// A handler that only records dependencies, for listing what a table
/// requires without setting anything else up.
#[derive(Debug, Default)]
pub struct RecordedDependencies {
    pub dependencies: Vec<(Dependency, bool)>,
}

impl DependencyHandler for RecordedDependencies {
    fn setup_dependency(
        &mut self,
        dependency: &Dependency,
        optional: bool,
        _ctx: &mut EnvironmentContext,
        direction: Direction,
    ) -> Result<()> {
        self.record_dependency(dependency, optional, direction);
        Ok(())
    }

    fn record_dependency(&mut self, dependency: &Dependency, optional: bool, _direction: Direction) {
        self.dependencies.push((dependency.clone(), optional));
    }
}

/// Apply `action` to `ctx` in the given direction.
///
/// Reverse execution undoes the forward effect of the same action. A
/// sequence is reversed by running it again in the *same* order.
///
/// With `suppress_recursion` set, dependency actions are recorded with
/// `deps` but nothing is set up for them.
pub fn execute(
    action: &Action,
    ctx: &mut EnvironmentContext,
    direction: Direction,
    suppress_recursion: bool,
    deps: &mut dyn DependencyHandler,
) -> Result<()> {
    let forward = direction.is_forward();
    match &action.kind {
        ActionKind::SetEnv { var, value } => {
            if forward {
                ctx.set_var(var, value);
            } else {
                ctx.restore_var(var);
            }
        }
        ActionKind::AppendEnv {
            var,
            value,
            separator,
        } => {
            if forward {
                ctx.add_segment(var, value, separator, SegmentEnd::Back);
            } else {
                ctx.remove_segment(var, value, separator, SegmentEnd::Back);
            }
        }
        ActionKind::PrependEnv {
            var,
            value,
            separator,
        } => {
            if forward {
                ctx.add_segment(var, value, separator, SegmentEnd::Front);
            } else {
                ctx.remove_segment(var, value, separator, SegmentEnd::Front);
            }
        }
        ActionKind::AddAlias { name, command } => {
            if forward {
                ctx.set_alias(name, command);
            } else {
                ctx.unset_alias(name);
            }
        }
        ActionKind::RemoveAlias { name } => {
            if forward {
                ctx.unset_alias(name);
            } else {
                ctx.restore_alias(name);
            }
        }
        ActionKind::SetupRequired(dependency) => {
            if suppress_recursion {
                deps.record_dependency(dependency, false, direction);
            } else {
                deps.setup_dependency(dependency, false, ctx, direction)?;
            }
        }
        ActionKind::SetupOptional(dependency) => {
            if suppress_recursion {
                deps.record_dependency(dependency, true, direction);
            } else if let Err(err) = deps.setup_dependency(dependency, true, ctx, direction) {
                if !err.is_not_found() {
                    return Err(err);
                }
                tracing::warn!("optional product {dependency} skipped: {err}");
            }
        }
        ActionKind::SourceRequired { script } => {
            // A sourced script cannot be undone in general.
            if forward {
                ctx.source(script)?;
            }
        }
    }
    Ok(())
}

/// Execute every action in order.
pub fn execute_all(
    actions: &[Action],
    ctx: &mut EnvironmentContext,
    direction: Direction,
    suppress_recursion: bool,
    deps: &mut dyn DependencyHandler,
) -> Result<()> {
    for action in actions {
        execute(action, ctx, direction, suppress_recursion, deps)?;
    }
    Ok(())
}
