// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! eups - Product Version Resolution and Environment Setup CLI

use clap::{Parser, Subcommand};

mod cmd_deps;
mod cmd_setup;
mod cmd_unsetup;

use cmd_deps::CmdDeps;
use cmd_setup::CmdSetup;
use cmd_unsetup::CmdUnsetup;


#[derive(Parser)]
#[clap(
    name = "eups",
    about = "Product Version Resolution and Environment Setup",
    version,
    long_about = "Select installed product versions and print the shell commands that set them up"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
struct Logging {
    /// Print extra messages about progress (-v, -vv, -vvv)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress messages to the user (overrides -v)
    #[clap(short, long, global = true)]
    quiet: bool,
}

impl Logging {
    fn level(&self) -> tracing::Level {
        match (self.quiet, self.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print the commands that set up a product
    Setup(CmdSetup),

    /// Print the commands that unset up an active product
    Unsetup(CmdUnsetup),

    /// Show the dependency tree a setup would walk
    Deps(CmdDeps),
}

impl Opt {
    fn run(self) -> eups::Result<i32> {
        // stdout is reserved for the commands the caller evaluates
        tracing_subscriber::fmt()
            .with_max_level(self.logging.level())
            .with_writer(std::io::stderr)
            .without_time()
            .with_target(false)
            .init();

        match self.cmd {
            Command::Setup(mut cmd) => cmd.run(),
            Command::Unsetup(mut cmd) => cmd.run(),
            Command::Deps(mut cmd) => cmd.run(),
        }
    }
}

fn main() {
    let opt = Opt::parse();
    let code = match opt.run() {
        Ok(code) => code,
        Err(err) => {
            let code = err.exit_status();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };
    std::process::exit(code);
}
