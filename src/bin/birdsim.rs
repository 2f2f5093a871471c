#![cfg_attr(not(test), warn(clippy::unwrap_used))]
#![cfg_attr(not(test), warn(clippy::expect_used))]

use clap::Parser;
pub mod birdsim_impl;
use birdsim::utils::{error::show_snafu_error, Result};
use birdsim_impl::{args::*, utils::*, *};

pub fn main() {
    if let Err(e) = main_entry() {
        show_snafu_error(e);
        std::process::exit(-1);
    }
}

fn main_entry() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose, cli.debug);

    match &cli.command {
        Some(c) => {
            let config = load_config(&cli.config)?;
            match c {
                args @ Commands::Compare { .. } => compare::main_compare(args, &config)?,
                args @ Commands::Matrix { .. } => matrix::main_matrix(args, &config)?,
                args @ Commands::Relatedness { .. } => {
                    relatedness::main_relatedness(args, &config)?
                }
                args @ Commands::Init { .. } => init::main_init(args, &config)?,
            }
        }
        None => {
            eprintln!("\nUse '-h  or [subcommand] -h' to show help message");
            std::process::exit(-1);
        }
    }
    Ok(())
}
