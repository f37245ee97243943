// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `eups setup` command.

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use eups::shell::STATEMENT_SEPARATOR;
use eups::vro::parse_strategies;
use eups::{
    Config, EnvironmentContext, Eups, Flavor, ProductRequest, Result, SetupOptions, SetupRequest,
    Shell, StackPath, VersionSpec,
};

/// Print the commands that set up a product
#[derive(Debug, Default, Args)]
pub struct CmdSetup {
    /// Product to set up
    pub product: Option<String>,

    /// Version or version expression (e.g. ">= 1.2")
    pub version: Vec<String>,

    /// The colon-separated list of product stacks to use [default: $EUPS_PATH]
    #[clap(short = 'Z', long)]
    pub database: Option<String>,

    /// Only use the stacks whose path contains this string
    #[clap(short = 'z', long = "select-db", value_name = "DIR")]
    pub select_db: Option<String>,

    /// Assume this target platform flavor [default: $EUPS_FLAVOR or the host]
    #[clap(short, long)]
    pub flavor: Option<String>,

    /// Only accept the version exactly as given
    #[clap(short, long)]
    pub exact: bool,

    /// Don't use exact matching even though an explicit version is given
    #[clap(short = 'E', long)]
    pub inexact: bool,

    /// Replace dependencies already set up with another version
    #[clap(short = 'F', long)]
    pub force: bool,

    /// Keep any products already set up, regardless of their versions
    #[clap(short, long)]
    pub keep: bool,

    /// Ignore the versions table files ask for
    #[clap(short, long)]
    pub ignore_versions: bool,

    /// Just set up the product, no dependencies (same as --max-depth 0)
    #[clap(short, long)]
    pub just: bool,

    /// Only expand this many levels of dependencies
    #[clap(short = 'S', long)]
    pub max_depth: Option<usize>,

    /// Use this table file
    #[clap(short = 'm', long = "table")]
    pub table: Option<PathBuf>,

    /// Root directory of the requested product
    #[clap(short, long)]
    pub root: Option<PathBuf>,

    /// Follow this tag to choose versions
    #[clap(short, long)]
    pub tag: Option<String>,

    /// The build type table conditions test against
    #[clap(short = 'T', long = "type", value_name = "TYPE")]
    pub build_type: Option<String>,

    /// Set the version resolution order (comma or space separated)
    #[clap(long, value_name = "LIST")]
    pub vro: Option<String>,

    /// Unset up the product instead
    #[clap(short, long)]
    pub unsetup: bool,

    /// Don't print the commands for evaluation, show them on stderr
    #[clap(short, long)]
    pub noaction: bool,

    /// Shell dialect to print [default: $EUPS_SHELL or $SHELL]
    #[clap(long, value_parser = parse_shell)]
    pub shell: Option<Shell>,

    /// Deprecated, use --tag=current
    #[clap(short = 'C', long, hide = true)]
    pub current: bool,

    /// Deprecated, use `eups deps`
    #[clap(short, long, hide = true)]
    pub list: bool,
}

pub fn parse_shell(value: &str) -> std::result::Result<Shell, String> {
    Shell::from_program(value).ok_or_else(|| format!("unsupported shell: {value}"))
}

/// Everything needed to run one setup or unsetup.
pub struct Session {
    pub eups: Eups,
    pub request: SetupRequest,
    pub shell: Shell,
}

impl CmdSetup {
    pub fn run(&mut self) -> Result<i32> {
        if let Some(code) = self.check_options() {
            return Ok(code);
        }
        let session = self.session()?;
        let mut ctx = EnvironmentContext::from_process();
        let commands = session
            .eups
            .setup_commands(&session.request, &mut ctx, session.shell)?;

        if commands.is_empty() {
            return Ok(0);
        }
        let output = commands.join(STATEMENT_SEPARATOR);
        if self.noaction {
            eprintln!("{}", "Commands that would be run:".bold());
            eprintln!("{output}");
        } else {
            println!("{output}");
        }
        Ok(0)
    }

    /// Exit status for option combinations that stop the command before
    /// anything is resolved.
    pub fn check_options(&self) -> Option<i32> {
        if self.current {
            tracing::error!("-C/--current is no longer supported, use --tag=current");
            return Some(2);
        }
        if self.list {
            tracing::error!("-l/--list is no longer supported, use `eups deps`");
            return Some(2);
        }
        if self.just && self.max_depth.is_some_and(|depth| depth > 0) {
            tracing::error!("--just and a positive --max-depth cannot be combined");
            return Some(3);
        }
        None
    }

    /// Load configuration and stacks and build the request.
    pub fn session(&self) -> Result<Session> {
        let config = Config::load()?;
        let tool = config.setup_cmd_name.as_str();

        let mut exact = self.exact;
        let mut inexact = self.inexact;
        if exact && inexact {
            tracing::warn!("{tool}: ignoring --exact and --inexact as both were given");
            exact = false;
            inexact = false;
        }

        let version = if self.version.is_empty() {
            None
        } else {
            Some(self.version.join(" ").parse::<VersionSpec>()?)
        };
        if version.is_some() && !inexact {
            exact = true;
        }

        let flavor = self
            .flavor
            .clone()
            .or_else(|| std::env::var(eups::EUPS_FLAVOR_VAR).ok())
            .map(Flavor::new)
            .unwrap_or_else(Flavor::detect);

        let max_depth = if self.just { Some(0) } else { self.max_depth };

        let options = SetupOptions {
            flavor,
            build_type: self.build_type.clone(),
            exact,
            force: self.force,
            keep: self.keep,
            max_depth,
            ignore_versions: self.ignore_versions,
            vro: self.vro.as_deref().map(parse_strategies),
        };

        let mut path = match &self.database {
            Some(list) => StackPath::parse(list),
            None => StackPath::from_env(),
        };
        if let Some(pattern) = &self.select_db {
            path = path.select(pattern);
        }
        if path.is_empty() && self.root.is_none() && self.table.is_none() {
            tracing::warn!("{tool}: no product stacks given, set EUPS_PATH or use -Z");
        }
        let stacks = path.open(&config.default_tag)?;

        let product = ProductRequest {
            name: self.product.clone(),
            version,
            tag: self.tag.clone(),
            root: self.root.clone(),
        };
        let mut request = if self.unsetup {
            SetupRequest::unsetup(product)
        } else {
            SetupRequest::setup(product)
        };
        match (&self.table, self.unsetup) {
            (Some(table), true) => {
                tracing::warn!("{tool}: ignoring --table {} when unsetting up", table.display());
            }
            (Some(table), false) => request = request.with_table_file(table.clone()),
            (None, _) => {}
        }

        let shell = self.shell.or(config.shell).unwrap_or_else(Shell::detect);
        let eups = Eups::new(stacks, options).with_policy(config.vro_policy());
        Ok(Session {
            eups,
            request,
            shell,
        })
    }
}
