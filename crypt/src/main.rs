//! `iris-crypt` command line: generate auth tokens, build and inspect
//! encrypted packages, and run the end-to-end smoke sequence.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::info;

use iris_crypt::config::{resolve_auth, Manifest};
use iris_crypt::logging::init_logging;
use iris_crypt::package::ModulePath;
use iris_crypt::{AuthToken, Module, Package};

#[derive(Parser)]
#[command(name = "iris-crypt", version, about = "Encrypted module packages bound to serial-number auth tokens")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the auth token for a serial number
    GenAuth { serial: u16 },
    /// Build an encrypted package
    Package(PackageArgs),
    /// Show key, serial and module names of a package
    Load(LoadArgs),
    /// Resolve one module inside a package
    Require(RequireArgs),
    /// Generate, package, load and require in one go, logging each step
    Smoke(SmokeArgs),
}

#[derive(Args)]
struct AuthArg {
    /// Auth token (XXXX-XXXX-XXXX-XXXX-XXXX-XXXX); falls back to the
    /// manifest, then to $IRIS_CRYPT_AUTH
    #[arg(long)]
    auth: Option<String>,
}

#[derive(Args)]
struct PackageArgs {
    #[command(flatten)]
    auth: AuthArg,
    /// JSON manifest listing modules, output and auth source
    #[arg(long)]
    manifest: Option<PathBuf>,
    /// Package file to write
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Modules as id=path; a path may be a file or a directory
    #[arg(value_parser = parse_module)]
    modules: Vec<(String, PathBuf)>,
}

#[derive(Args)]
struct LoadArgs {
    #[command(flatten)]
    auth: AuthArg,
    file: PathBuf,
    /// Print as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct RequireArgs {
    #[command(flatten)]
    auth: AuthArg,
    file: PathBuf,
    name: String,
    /// Package directory of the requiring script, for relative names
    #[arg(long)]
    from: Option<String>,
    /// Print scripts wrapped for evaluation
    #[arg(long)]
    wrapped: bool,
}

#[derive(Args)]
struct SmokeArgs {
    #[arg(long, default_value_t = 1234)]
    serial: u16,
    #[arg(short, long, default_value = "test.pkg")]
    output: PathBuf,
    /// Modules as id=path
    #[arg(value_parser = parse_module, required = true)]
    modules: Vec<(String, PathBuf)>,
}

fn parse_module(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((id, path)) if !id.is_empty() && !path.is_empty() => Ok((id.to_string(), PathBuf::from(path))),
        _ => Err(format!("expected id=path, got {s:?}")),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(err) = run(cli.cmd) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cmd: Command) -> Result<()> {
    match cmd {
        Command::GenAuth { serial } => {
            println!("{}", AuthToken::generate(serial)?);
        }
        Command::Package(args) => package(args)?,
        Command::Load(args) => {
            let auth = resolve_auth(args.auth.auth.as_deref(), None)?;
            let pkg = Package::load(&auth, &args.file).with_context(|| format!("loading {}", args.file.display()))?;
            if args.json {
                let out = json!({ "key": pkg.key(), "serial": pkg.serial(), "names": pkg.names() });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("key: {}", pkg.key());
                println!("serial: {}", pkg.serial());
                println!("names: {}", pkg.names().join(", "));
            }
        }
        Command::Require(args) => {
            let auth = resolve_auth(args.auth.auth.as_deref(), None)?;
            let mut pkg = Package::load(&auth, &args.file).with_context(|| format!("loading {}", args.file.display()))?;
            let from = args.from.as_deref().map(ModulePath::new);
            let module = pkg.require_from(&args.name, from.as_ref())?;
            match module.as_ref() {
                Module::Script(script) if args.wrapped => println!("{}", script.wrapped_source()),
                Module::Script(script) => print!("{}", script.source),
                Module::Json(value) => println!("{}", serde_json::to_string_pretty(value)?),
                Module::External(name) => bail!("{name} is not part of the package"),
            }
        }
        Command::Smoke(args) => smoke(args)?,
    }
    Ok(())
}

fn package(args: PackageArgs) -> Result<()> {
    let (auth, output, modules) = match &args.manifest {
        Some(path) => {
            let manifest = Manifest::load(path)?;
            let auth = manifest.resolve_auth(args.auth.auth.as_deref())?;
            let mut modules = manifest.modules.clone();
            modules.extend(args.modules);
            (auth, args.output.or(manifest.output), modules)
        }
        None => {
            let auth = resolve_auth(args.auth.auth.as_deref(), None)?;
            (auth, args.output, args.modules.into_iter().collect::<BTreeMap<_, _>>())
        }
    };

    let Some(output) = output else {
        bail!("no output file given (use --output or the manifest's \"output\")");
    };
    if modules.is_empty() {
        bail!("no modules to package");
    }

    Package::create(&auth, &output, &modules).with_context(|| format!("packaging {}", output.display()))?;
    println!("{}", output.display());
    Ok(())
}

/// Linear generate/package/load/require run. Each result is printed; the
/// first failure ends the run.
fn smoke(args: SmokeArgs) -> Result<()> {
    let auth = AuthToken::generate(args.serial)?;
    println!("generated auth for serial {}: {auth}", args.serial);

    let modules: BTreeMap<String, PathBuf> = args.modules.into_iter().collect();
    Package::create(&auth, &args.output, &modules)?;
    println!("created package {}", args.output.display());

    let mut pkg = Package::load(&auth, &args.output)?;
    let name = args.output.display();
    println!("package {name} key: {}", pkg.key());
    println!("package {name} serial: {}", pkg.serial());
    println!("package {name} names: {}", pkg.names().join(", "));

    for id in modules.keys() {
        let module = pkg.require(id)?;
        match module.as_ref() {
            Module::Script(script) => {
                println!("{id}: script {} ({} bytes)", script.filename, script.source.len());
            }
            Module::Json(value) => println!("{id}: json {value}"),
            Module::External(_) => println!("{id}: outside the package"),
        }
        info!(module = %id, kind = module.kind(), "required");
    }
    Ok(())
}
