// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `eups deps` command.

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use eups::{EnvironmentContext, Result, SetupReport, SetupStatus};

/// Show the dependency tree a setup would walk
#[derive(Debug, Args)]
pub struct CmdDeps {
    /// Product to inspect
    product: Option<String>,

    /// Version or version expression (e.g. ">= 1.2")
    version: Vec<String>,

    /// The colon-separated list of product stacks to use [default: $EUPS_PATH]
    #[clap(short = 'Z', long)]
    database: Option<String>,

    /// Only use the stacks whose path contains this string
    #[clap(short = 'z', long = "select-db", value_name = "DIR")]
    select_db: Option<String>,

    /// Assume this target platform flavor [default: $EUPS_FLAVOR or the host]
    #[clap(short, long)]
    flavor: Option<String>,

    /// Follow this tag to choose versions
    #[clap(short, long)]
    tag: Option<String>,

    /// Root directory of the requested product
    #[clap(short, long)]
    root: Option<PathBuf>,

    /// Use this table file
    #[clap(short = 'm', long = "table")]
    table: Option<PathBuf>,

    /// Only expand this many levels of dependencies
    #[clap(short = 'S', long)]
    max_depth: Option<usize>,

    /// The build type table conditions test against
    #[clap(short = 'T', long = "type", value_name = "TYPE")]
    build_type: Option<String>,

    /// Ignore the versions table files ask for
    #[clap(short, long)]
    ignore_versions: bool,

    /// Set the version resolution order (comma or space separated)
    #[clap(long, value_name = "LIST")]
    vro: Option<String>,

    /// Output format: table, yaml
    #[clap(long, default_value = "table")]
    format: String,
}

impl CmdDeps {
    pub fn run(&mut self) -> Result<i32> {
        let setup_cmd = super::cmd_setup::CmdSetup {
            product: self.product.clone(),
            version: self.version.clone(),
            database: self.database.clone(),
            select_db: self.select_db.clone(),
            flavor: self.flavor.clone(),
            tag: self.tag.clone(),
            root: self.root.clone(),
            table: self.table.clone(),
            max_depth: self.max_depth,
            build_type: self.build_type.clone(),
            ignore_versions: self.ignore_versions,
            vro: self.vro.clone(),
            ..Default::default()
        };
        let session = setup_cmd.session()?;
        let ctx = EnvironmentContext::from_process();
        let report = session.eups.dependencies(&session.request, &ctx)?;

        if self.format == "yaml" {
            return Ok(self.show_yaml(&report));
        }
        self.show_table(&report);
        Ok(0)
    }

    fn show_table(&self, report: &SetupReport) {
        println!("{}", "Dependencies:".bold());
        println!();

        if report.records.is_empty() {
            println!("  {}", "(nothing to set up)".dimmed());
            return;
        }
        for record in &report.records {
            let indent = "  ".repeat(record.depth + 1);
            let flavor = record
                .flavor
                .as_deref()
                .map(|f| format!(" [{f}]"))
                .unwrap_or_default();
            let optional = if record.optional { " (optional)" } else { "" };
            let status = match record.status {
                SetupStatus::Setup => record.status.to_string().green(),
                SetupStatus::Unsetup => record.status.to_string().red(),
                SetupStatus::Kept => record.status.to_string().yellow(),
                SetupStatus::Listed => record.status.to_string().dimmed(),
            };
            println!(
                "{indent}{} {}{}{} {status}",
                record.name.cyan(),
                record.version,
                flavor.blue(),
                optional.dimmed(),
            );
        }

        println!();
        println!("Total: {} product(s)", report.records.len());
    }

    fn show_yaml(&self, report: &SetupReport) -> i32 {
        match serde_yaml::to_string(report) {
            Ok(yaml) => {
                print!("{yaml}");
                0
            }
            Err(err) => {
                tracing::error!("failed to render the dependency report: {err}");
                1
            }
        }
    }
}
