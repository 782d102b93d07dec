//! Prints the `NODE_MODULE_VERSION` of the runtime installed in a directory.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use iris_crypt::logging::init_logging;
use iris_crypt::modver::probe_module_version;

#[derive(Parser)]
#[command(name = "modver", version, about = "Print NODE_MODULE_VERSION from a runtime's node_version.h")]
struct Cli {
    /// Runtime directory (install prefix or source tree)
    dir: PathBuf,
    /// Raise log verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let version = probe_module_version(&cli.dir)?;
    println!("{version}");
    Ok(())
}
