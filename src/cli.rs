// Command-line front end for modpatch.
//
// One subcommand per overlay operation plus two inspection commands. Every
// command resolves `config.json` first; flags override what it says.

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::config::{Config, ConfigError};
use crate::document::{DocumentCodec, NativeCodec};
use crate::gdl;
use crate::io::read_content;
use crate::overlay::{self, Assembler, Context, Merger, OverlayError, Packager, Report};

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Package, merge and assemble game-data mods.
#[derive(Parser, Debug)]
#[command(
    name = "modpatch",
    version,
    about = "Structural patch packager and merger for game-data mods",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Path to config.json (default: local data directory).
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Quiet mode (errors only).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output the operation report as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Reduce a mod to patches against the game tree.
    Package(PackageArgs),
    /// Merge packaged mods onto the game tree, lowest priority first.
    Merge(MergeArgs),
    /// Move loose documents of a mod back into their archives.
    Assemble(AssembleArgs),
    /// Report whether two record-table files hold the same records.
    CompareGdl(CompareArgs),
    /// Print the resolved configuration.
    Config,
}

#[derive(Args, Debug)]
struct PackageArgs {
    /// Mod folder (its romfs folder or a folder containing one).
    #[arg(long = "mod", value_hint = ValueHint::DirPath)]
    mod_path: PathBuf,

    /// Output folder; packaged files land below `<output>/romfs`.
    #[arg(long, short = 'o', value_hint = ValueHint::DirPath)]
    output: PathBuf,

    /// Game revisions to check, e.g. `100,110,121`.
    #[arg(long, value_delimiter = ',')]
    versions: Vec<u32>,

    /// Fingerprint index file.
    #[arg(long, value_hint = ValueHint::FilePath)]
    checksum: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct MergeArgs {
    /// Game tree to merge onto (default: GamePath from the configuration).
    #[arg(long, value_hint = ValueHint::DirPath)]
    base: Option<PathBuf>,

    /// Mod folders in ascending priority.
    #[arg(long, num_args = 1.., required = true, value_hint = ValueHint::DirPath)]
    mods: Vec<PathBuf>,

    /// Output folder.
    #[arg(long, short = 'o', value_hint = ValueHint::DirPath)]
    output: PathBuf,

    /// Shop list (default: ShopsPath from the configuration).
    #[arg(long, value_hint = ValueHint::FilePath)]
    shops: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct AssembleArgs {
    /// Mod folder to assemble in place.
    #[arg(long = "mod", value_hint = ValueHint::DirPath)]
    mod_path: PathBuf,
}

#[derive(Args, Debug)]
struct CompareArgs {
    #[arg(value_hint = ValueHint::FilePath)]
    first: PathBuf,
    #[arg(value_hint = ValueHint::FilePath)]
    second: PathBuf,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Overlay(#[from] OverlayError),
    #[error(transparent)]
    Io(#[from] crate::io::IoError),
    #[error(transparent)]
    Document(#[from] crate::document::DocumentError),
    #[error(transparent)]
    Changelog(#[from] gdl::ChangelogError),
    #[error("cannot serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Load the configuration, letting `game` stand in for a missing file.
fn resolve_config(path: Option<&Path>, game: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match Config::load(path) {
        Ok(config) => config,
        Err(ConfigError::NotFound(missing)) if game.is_some() => {
            log::debug!("{} not found, using defaults", missing.display());
            Config::default()
        }
        Err(err) => return Err(err),
    };
    if let Some(game) = game {
        config.game_path = game.to_path_buf();
    }
    config.validate()?;
    Ok(config)
}

fn log_filter(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn finish(report: Report, json: bool) -> Result<(), CliError> {
    if json {
        eprintln!("{}", serde_json::to_string(&report)?);
    } else {
        eprintln!("modpatch: {report}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_package(cli: &Cli, args: &PackageArgs) -> Result<(), CliError> {
    let mut config = resolve_config(cli.config.as_deref(), None)?;
    if !args.versions.is_empty() {
        config.versions = Some(args.versions.clone());
    }
    if let Some(checksum) = &args.checksum {
        config.checksum_path = Some(checksum.clone());
    }
    let ctx = Context::from_config(&config);
    let report = overlay::join(Packager::new(ctx, &args.mod_path, &args.output).spawn())?;
    finish(report, cli.json_output)
}

fn cmd_merge(cli: &Cli, args: &MergeArgs) -> Result<(), CliError> {
    let mut config = resolve_config(cli.config.as_deref(), args.base.as_deref())?;
    if let Some(shops) = &args.shops {
        config.shops_path = Some(shops.clone());
    }
    let ctx = Context::from_config(&config);
    let report = overlay::join(Merger::new(ctx, &args.mods, &args.output).spawn())?;
    finish(report, cli.json_output)
}

fn cmd_assemble(cli: &Cli, args: &AssembleArgs) -> Result<(), CliError> {
    let config = resolve_config(cli.config.as_deref(), None)?;
    let ctx = Context::from_config(&config);
    let report = Assembler::new(ctx, &args.mod_path).run()?;
    finish(report, cli.json_output)
}

fn cmd_compare(cli: &Cli, args: &CompareArgs) -> Result<(), CliError> {
    let compression = match Config::load(cli.config.as_deref()) {
        Ok(config) => config.compression.build(),
        Err(err) => {
            log::debug!("using default compression: {err}");
            Default::default()
        }
    };
    let first = NativeCodec.decode(&read_content(&args.first, &compression)?)?;
    let second = NativeCodec.decode(&read_content(&args.second, &compression)?)?;
    if gdl::compare(&first, &second)? {
        println!("identical");
    } else {
        println!("different");
    }
    Ok(())
}

fn cmd_config(cli: &Cli) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("modpatch version {version}");
    eprintln!("ZLIB={}", cfg!(feature = "zlib") as u8);
    eprintln!("LZMA={}", cfg!(feature = "lzma") as u8);

    let path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };
    println!("config: {}", path.display());
    match Config::load(Some(&path)) {
        Ok(config) => {
            println!("game path: {}", config.game_path.display());
            println!("checksums: {}", config.checksum_path().display());
            println!("archive cache: {}", config.archive_cache_path().display());
            println!("shops: {}", config.shops_path().display());
            println!("versions: {:?}", config.versions());
            println!("compression: {:?}", config.compression);
        }
        Err(ConfigError::NotFound(_)) => println!("(not found)"),
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Run the CLI.
pub fn run() -> ! {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(cli.quiet, cli.verbose)),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    let result = match &cli.command {
        Cmd::Package(args) => cmd_package(&cli, args),
        Cmd::Merge(args) => cmd_merge(&cli, args),
        Cmd::Assemble(args) => cmd_assemble(&cli, args),
        Cmd::CompareGdl(args) => cmd_compare(&cli, args),
        Cmd::Config => cmd_config(&cli),
    };

    match result {
        Ok(()) => process::exit(0),
        Err(err) => {
            eprintln!("modpatch: {err}");
            process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let argv: Vec<String> = std::iter::once("modpatch".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        Cli::try_parse_from(argv).expect("cli parse failed")
    }

    #[test]
    fn package_flags() {
        let cli = parse(&[
            "package", "--mod", "m/romfs", "-o", "out", "--versions", "110,100", "-vv",
        ]);
        let Cmd::Package(args) = &cli.command else {
            panic!("expected package");
        };
        assert_eq!(args.mod_path, PathBuf::from("m/romfs"));
        assert_eq!(args.versions, [110, 100]);
        assert_eq!(log_filter(cli.quiet, cli.verbose), "debug");
    }

    #[test]
    fn merge_takes_mods_in_order() {
        let cli = parse(&["merge", "--base", "game", "--mods", "low", "high", "--output", "out"]);
        let Cmd::Merge(args) = &cli.command else {
            panic!("expected merge");
        };
        assert_eq!(args.mods, [PathBuf::from("low"), PathBuf::from("high")]);
        assert_eq!(args.base.as_deref(), Some(Path::new("game")));
    }

    #[test]
    fn merge_requires_mods() {
        assert!(Cli::try_parse_from(["modpatch", "merge", "--output", "out"]).is_err());
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        assert!(Cli::try_parse_from(["modpatch", "-q", "-v", "config"]).is_err());
        assert_eq!(log_filter(true, 0), "error");
    }

    #[test]
    fn base_stands_in_for_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = resolve_config(Some(&dir.path().join("none.json")), Some(dir.path())).unwrap();
        assert_eq!(config.game_path, dir.path());
        assert!(resolve_config(Some(&dir.path().join("none.json")), None).is_err());
    }
}
