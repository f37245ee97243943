// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `eups unsetup` command.

use std::path::PathBuf;

use clap::Args;
use eups::{Result, Shell};

/// Print the commands that unset up an active product
#[derive(Debug, Args)]
pub struct CmdUnsetup {
    /// Product to unset up
    product: Option<String>,

    /// The colon-separated list of product stacks to use [default: $EUPS_PATH]
    #[clap(short = 'Z', long)]
    database: Option<String>,

    /// Only use the stacks whose path contains this string
    #[clap(short = 'z', long = "select-db", value_name = "DIR")]
    select_db: Option<String>,

    /// Assume this target platform flavor [default: $EUPS_FLAVOR or the host]
    #[clap(short, long)]
    flavor: Option<String>,

    /// Just unset up the product, leave its dependencies
    #[clap(short, long)]
    just: bool,

    /// Only unwind this many levels of dependencies
    #[clap(short = 'S', long)]
    max_depth: Option<usize>,

    /// Root directory of the product
    #[clap(short, long)]
    root: Option<PathBuf>,

    /// The build type table conditions test against
    #[clap(short = 'T', long = "type", value_name = "TYPE")]
    build_type: Option<String>,

    /// Don't print the commands for evaluation, show them on stderr
    #[clap(short, long)]
    noaction: bool,

    /// Shell dialect to print [default: $EUPS_SHELL or $SHELL]
    #[clap(long, value_parser = super::cmd_setup::parse_shell)]
    shell: Option<Shell>,
}

impl CmdUnsetup {
    pub fn run(&mut self) -> Result<i32> {
        let mut setup_cmd = super::cmd_setup::CmdSetup {
            product: self.product.clone(),
            database: self.database.clone(),
            select_db: self.select_db.clone(),
            flavor: self.flavor.clone(),
            just: self.just,
            max_depth: self.max_depth,
            root: self.root.clone(),
            build_type: self.build_type.clone(),
            noaction: self.noaction,
            shell: self.shell,
            unsetup: true,
            ..Default::default()
        };

        setup_cmd.run()
    }
}
