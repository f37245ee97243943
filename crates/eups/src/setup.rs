// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Setting products up and down, dependencies included.
//!
//! [`Eups::setup`] resolves the requested product, then walks its table
//! depth first in a single [`EnvironmentContext`]. Dependencies mutate
//! the same context as the product that requires them, so the order in
//! which actions run is the order their effects are recorded.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::action::{Action, ActionKind, Dependency, Direction};
use crate::environment::EnvironmentContext;
use crate::execute::{DependencyHandler, execute_all};
use crate::flavor::Flavor;
use crate::product::{ActiveProduct, LOCAL_VERSION_PREFIX, Product};
use crate::resolver::{ProductRequest, Resolver};
use crate::shell::Shell;
use crate::stack::Stack;
use crate::vro::{Strategy, VroPolicy, selector};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./setup_test.rs"]
mod setup_test;

/// Settings that apply to a whole setup or unsetup.
#[derive(Debug, Clone)]
pub struct SetupOptions {
    /// Flavor products are looked up and tables evaluated for.
    pub flavor: Flavor,
    /// Build type passed to table conditions.
    pub build_type: Option<String>,
    /// Only accept literal versions as given.
    pub exact: bool,
    /// Replace a dependency that is active under another version.
    pub force: bool,
    /// Leave any active dependency alone.
    pub keep: bool,
    /// Dependency levels to expand, `None` for no limit.
    pub max_depth: Option<usize>,
    /// Drop the versions named by table dependencies.
    pub ignore_versions: bool,
    /// Strategies to use instead of those the policy selects.
    pub vro: Option<Vec<Strategy>>,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            flavor: Flavor::detect(),
            build_type: None,
            exact: false,
            force: false,
            keep: false,
            max_depth: None,
            ignore_versions: false,
            vro: None,
        }
    }
}

/// One setup or unsetup request.
#[derive(Debug, Clone, Default)]
pub struct SetupRequest {
    pub product: ProductRequest,
    /// Table file to use instead of the product's own.
    pub table_file: Option<PathBuf>,
    pub direction: Direction,
}

impl SetupRequest {
    pub fn setup(product: ProductRequest) -> Self {
        Self {
            product,
            table_file: None,
            direction: Direction::Forward,
        }
    }

    pub fn unsetup(product: ProductRequest) -> Self {
        Self {
            product,
            table_file: None,
            direction: Direction::Reverse,
        }
    }

    pub fn with_table_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.table_file = Some(path.into());
        self
    }
}

/// Hook run before any setup or unsetup work.
pub trait CommandCallback {
    /// Inspect the request about to run as `command`. Returning
    /// [`Error::OperationForbidden`] refuses it.
    fn apply(&self, command: &str, request: &SetupRequest) -> Result<()>;
}

impl<F> CommandCallback for F
where
    F: Fn(&str, &SetupRequest) -> Result<()>,
{
    fn apply(&self, command: &str, request: &SetupRequest) -> Result<()> {
        self(command, request)
    }
}

/// What happened to one product during a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SetupStatus {
    Setup,
    Unsetup,
    /// Already active and left alone.
    Kept,
    /// Named as a dependency below the depth limit, not expanded.
    Listed,
}

impl fmt::Display for SetupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Setup => "setup",
            Self::Unsetup => "unsetup",
            Self::Kept => "kept",
            Self::Listed => "listed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupRecord {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
    pub depth: usize,
    pub optional: bool,
    pub status: SetupStatus,
}

/// The products a transaction touched, in the order it touched them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SetupReport {
    pub records: Vec<SetupRecord>,
}

impl SetupReport {
    pub fn find(&self, name: &str) -> Option<&SetupRecord> {
        self.records.iter().find(|r| r.name == name)
    }
}

/// Sets products up and down against an ordered list of stacks.
pub struct Eups {
    stacks: Vec<Stack>,
    policy: VroPolicy,
    options: SetupOptions,
    callbacks: Vec<Box<dyn CommandCallback>>,
}

impl fmt::Debug for Eups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Eups")
            .field("stacks", &self.stacks)
            .field("policy", &self.policy)
            .field("options", &self.options)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl Eups {
    pub fn new(stacks: Vec<Stack>, options: SetupOptions) -> Self {
        Self {
            stacks,
            policy: VroPolicy::default(),
            options,
            callbacks: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: VroPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn add_callback(&mut self, callback: Box<dyn CommandCallback>) {
        self.callbacks.push(callback);
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn options(&self) -> &SetupOptions {
        &self.options
    }

    /// Set up or unset up the requested product, per its direction,
    /// applying every change to `ctx`.
    ///
    /// Changes already made when a failure occurs are left in `ctx`.
    pub fn setup(&self, request: &SetupRequest, ctx: &mut EnvironmentContext) -> Result<SetupReport> {
        self.run_callbacks(request)?;
        match request.direction {
            Direction::Forward => self.setup_forward(request, ctx),
            Direction::Reverse => self.setup_reverse(request, ctx),
        }
    }

    /// [`Eups::setup`] the product and render the changes for `shell`.
    pub fn setup_commands(
        &self,
        request: &SetupRequest,
        ctx: &mut EnvironmentContext,
        shell: Shell,
    ) -> Result<Vec<String>> {
        self.setup(request, ctx)?;
        Ok(shell.render_all(&ctx.take_journal()))
    }

    /// Report what setting up the product would do, without touching `ctx`.
    pub fn dependencies(&self, request: &SetupRequest, ctx: &EnvironmentContext) -> Result<SetupReport> {
        let mut scratch = EnvironmentContext::from_vars(ctx.vars().clone())
            .with_aliases(ctx.aliases().clone());
        self.setup(request, &mut scratch)
    }

    fn run_callbacks(&self, request: &SetupRequest) -> Result<()> {
        let command = request.direction.command_name();
        for callback in &self.callbacks {
            callback.apply(command, request).map_err(|err| match err {
                Error::OperationForbidden { .. } => err,
                other => Error::CallbackFailed {
                    command: command.to_string(),
                    reason: other.to_string(),
                },
            })?;
        }
        Ok(())
    }

    fn setup_forward(&self, request: &SetupRequest, ctx: &mut EnvironmentContext) -> Result<SetupReport> {
        let product = self.resolve_top(request)?;
        let mut report = SetupReport::default();

        if let Some(active) = ActiveProduct::find(ctx, &product.name) {
            tracing::info!("unsetting up {} {} first", active.name, active.version);
            let mut traversal = Traversal::new(self, request);
            match self.product_for_active(&active) {
                Ok(previous) => {
                    traversal.visit(&previous, 0, false, ctx, Direction::Reverse)?;
                }
                Err(err) if err.is_not_found() => {
                    tracing::warn!("cannot find {} {} to unsetup: {err}", active.name, active.version);
                    active.clear(ctx);
                }
                Err(err) => return Err(err),
            }
            report.records.extend(traversal.records);
        }

        let mut traversal = Traversal::new(self, request);
        traversal.visit(&product, 0, false, ctx, Direction::Forward)?;
        report.records.extend(traversal.records);
        Ok(report)
    }

    fn setup_reverse(&self, request: &SetupRequest, ctx: &mut EnvironmentContext) -> Result<SetupReport> {
        if request.table_file.is_some() {
            tracing::warn!("ignoring the table file given for unsetup");
        }
        let name = match (&request.product.name, &request.product.root) {
            (Some(name), _) => name.clone(),
            (None, Some(root)) => crate::product::guess_product(root)?,
            (None, None) => {
                return Err(Error::UnderSpecifiedProduct {
                    name: None,
                    version: None,
                    flavor: Some(self.options.flavor.to_string()),
                });
            }
        };
        let active = ActiveProduct::find(ctx, &name).ok_or(Error::ProductNotSetup { name })?;
        let product = self.product_for_active(&active)?;

        let mut traversal = Traversal::new(self, request);
        traversal.visit(&product, 0, false, ctx, Direction::Reverse)?;
        Ok(SetupReport {
            records: traversal.records,
        })
    }

    /// Resolve the top level product, honouring a table file override.
    fn resolve_top(&self, request: &SetupRequest) -> Result<Product> {
        let flavor = self.options.flavor.clone();
        let Some(table_file) = &request.table_file else {
            return self.resolve(&request.product, request.product.tag.as_deref());
        };
        if !table_file.is_file() {
            tracing::error!("table file {} does not exist", table_file.display());
            return Err(Error::UnderSpecifiedProduct {
                name: request.product.name.clone(),
                version: None,
                flavor: Some(flavor.to_string()),
            });
        }
        let Some(name) = &request.product.name else {
            return Product::from_table_file(table_file, None, flavor);
        };
        match self.resolve(&request.product, request.product.tag.as_deref()) {
            Ok(mut product) => {
                product.table_file = Some(table_file.clone());
                Ok(product)
            }
            Err(err) if err.is_not_found() => {
                tracing::debug!("using {} as table for {name}: {err}", table_file.display());
                Product::from_table_file(table_file, Some(name), flavor)
            }
            Err(err) => Err(err),
        }
    }

    fn resolve(&self, request: &ProductRequest, tag: Option<&str>) -> Result<Product> {
        let strategies = match &self.options.vro {
            Some(vro) => vro.clone(),
            None => self.policy.select(selector(
                tag,
                request.root.is_some(),
                request.version.is_some(),
            )),
        };
        Resolver::new(&self.stacks, &self.options.flavor).resolve(request, &strategies, self.options.exact)
    }

    /// The installed product an active product was set up from.
    fn product_for_active(&self, active: &ActiveProduct) -> Result<Product> {
        let flavor = active
            .flavor
            .clone()
            .unwrap_or_else(|| self.options.flavor.clone());
        if let Some(root) = active.version.strip_prefix(LOCAL_VERSION_PREFIX) {
            return Ok(Product::local(&active.name, root, flavor));
        }

        let not_found = || Error::ProductNotFound {
            name: active.name.clone(),
            version: Some(active.version.clone()),
            flavors: flavor.fallbacks(),
            stack: active.stack.clone(),
        };
        let opened;
        let stacks: &[Stack] = match &active.stack {
            Some(root) => match self.stacks.iter().find(|s| s.root() == root.as_path()) {
                Some(stack) => std::slice::from_ref(stack),
                None => {
                    opened = [Stack::new(root.clone())];
                    &opened
                }
            },
            None => &self.stacks,
        };
        for stack in stacks {
            if let Some(product) = stack.find_product(&active.name, &active.version, &flavor)? {
                return Ok(product);
            }
        }
        Err(not_found())
    }
}

/// State of one depth first walk over the dependency graph.
struct Traversal<'a> {
    eups: &'a Eups,
    /// Tag of the top level request, followed by dependencies too.
    tag: Option<&'a str>,
    /// Depth of the product whose table is executing.
    depth: usize,
    /// Products visited in this walk, with the version visited.
    visited: HashMap<String, String>,
    records: Vec<SetupRecord>,
}

impl<'a> Traversal<'a> {
    fn new(eups: &'a Eups, request: &'a SetupRequest) -> Self {
        Self {
            eups,
            tag: request.product.tag.as_deref(),
            depth: 0,
            visited: HashMap::new(),
            records: Vec::new(),
        }
    }

    fn record(&mut self, product: &Product, depth: usize, optional: bool, status: SetupStatus) {
        self.records.push(SetupRecord {
            name: product.name.clone(),
            version: product.version.clone(),
            flavor: Some(product.flavor.to_string()),
            depth,
            optional,
            status,
        });
    }

    /// Run `product`'s table in `direction`, expanding dependencies
    /// until the depth limit.
    fn visit(
        &mut self,
        product: &Product,
        depth: usize,
        optional: bool,
        ctx: &mut EnvironmentContext,
        direction: Direction,
    ) -> Result<()> {
        let eups = self.eups;
        let options = &eups.options;
        let actions = self.actions_for(product)?;
        self.visited
            .insert(product.name.clone(), product.version.clone());

        match direction {
            Direction::Forward => {
                tracing::info!("setting up {product}");
                product.mark_active(ctx);
                self.record(product, depth, optional, SetupStatus::Setup);
            }
            Direction::Reverse => {
                tracing::info!("unsetting up {product}");
                if let Some(active) = ActiveProduct::find(ctx, &product.name) {
                    active.clear(ctx);
                }
                self.record(product, depth, optional, SetupStatus::Unsetup);
            }
        }

        let suppress_recursion = options.max_depth.is_some_and(|max| depth >= max);
        let parent_depth = std::mem::replace(&mut self.depth, depth);
        let result = execute_all(&actions, ctx, direction, suppress_recursion, self);
        self.depth = parent_depth;
        result
    }

    fn actions_for(&self, product: &Product) -> Result<Vec<Action>> {
        let eups = self.eups;
        let options = &eups.options;
        let actions = product.actions(Some(options.flavor.as_str()), options.build_type.as_deref())?;
        if !options.ignore_versions {
            return Ok(actions);
        }
        Ok(actions
            .into_iter()
            .map(|mut action| {
                if let ActionKind::SetupRequired(dep) | ActionKind::SetupOptional(dep) =
                    &mut action.kind
                {
                    dep.version = None;
                }
                action
            })
            .collect())
    }

    fn setup_forward(
        &mut self,
        dependency: &Dependency,
        optional: bool,
        ctx: &mut EnvironmentContext,
    ) -> Result<()> {
        let depth = self.depth + 1;
        let eups = self.eups;
        let options = &eups.options;
        let active = ActiveProduct::find(ctx, &dependency.product);

        if let Some(active) = &active {
            if options.keep {
                tracing::debug!("keeping {} {}", active.name, active.version);
                self.records.push(SetupRecord {
                    name: active.name.clone(),
                    version: active.version.clone(),
                    flavor: active.flavor.as_ref().map(ToString::to_string),
                    depth,
                    optional,
                    status: SetupStatus::Kept,
                });
                return Ok(());
            }
        }

        let request = ProductRequest {
            name: Some(dependency.product.clone()),
            version: dependency.version.clone(),
            tag: self.tag.map(str::to_string),
            root: None,
        };
        let product = eups.resolve(&request, self.tag)?;

        if let Some(active) = active {
            if active.version == product.version {
                tracing::debug!("{product} is already setup");
                self.visited
                    .insert(product.name.clone(), product.version.clone());
                self.record(&product, depth, optional, SetupStatus::Kept);
                return Ok(());
            }
            if !options.force {
                return Err(Error::VersionConflict {
                    name: active.name,
                    active_version: active.version,
                    requested_version: product.version,
                });
            }
            tracing::info!(
                "replacing {} {} with {}",
                active.name,
                active.version,
                product.version
            );
            match eups.product_for_active(&active) {
                Ok(previous) => self.visit(&previous, depth, optional, ctx, Direction::Reverse)?,
                Err(err) if err.is_not_found() => active.clear(ctx),
                Err(err) => return Err(err),
            }
        }

        self.visit(&product, depth, optional, ctx, Direction::Forward)
    }

    fn setup_reverse(
        &mut self,
        dependency: &Dependency,
        optional: bool,
        ctx: &mut EnvironmentContext,
    ) -> Result<()> {
        let Some(active) = ActiveProduct::find(ctx, &dependency.product) else {
            tracing::debug!("{} is not setup, skipping", dependency.product);
            return Ok(());
        };
        match self.eups.product_for_active(&active) {
            Ok(product) => self.visit(&product, self.depth + 1, optional, ctx, Direction::Reverse),
            Err(err) if err.is_not_found() => {
                tracing::warn!("cannot find {} {} to unsetup: {err}", active.name, active.version);
                active.clear(ctx);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

impl DependencyHandler for Traversal<'_> {
    fn setup_dependency(
        &mut self,
        dependency: &Dependency,
        optional: bool,
        ctx: &mut EnvironmentContext,
        direction: Direction,
    ) -> Result<()> {
        if let Some(version) = self.visited.get(&dependency.product) {
            let differs = dependency
                .version
                .as_ref()
                .is_some_and(|wanted| !wanted.is_satisfied_by(version));
            if differs {
                tracing::warn!(
                    "{dependency} requested, but {} {version} was already handled",
                    dependency.product
                );
            } else {
                tracing::debug!("{} already handled", dependency.product);
            }
            return Ok(());
        }
        match direction {
            Direction::Forward => self.setup_forward(dependency, optional, ctx),
            Direction::Reverse => self.setup_reverse(dependency, optional, ctx),
        }
    }

    fn record_dependency(&mut self, dependency: &Dependency, optional: bool, _direction: Direction) {
        tracing::debug!("not expanding {dependency} below depth {}", self.depth);
        self.records.push(SetupRecord {
            name: dependency.product.clone(),
            version: dependency
                .version
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            flavor: None,
            depth: self.depth + 1,
            optional,
            status: SetupStatus::Listed,
        });
    }
}
