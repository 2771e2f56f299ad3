//! Check for and install firmware updates from the command line.

use std::path::PathBuf;
use uota::{CheckOptions, CheckOutcome, InstallOutcome, UpdateError, Updater};

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("uota failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> uota::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "check" => {
            let (root, options) = parse_check_args(&args[1..])?;
            check(root, &options)
        }
        "install" => {
            let (root, quiet) = parse_install_args(&args[1..])?;
            install(root, quiet)
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => Err(UpdateError::Config(format!(
            "unknown subcommand `{other}` (use check|install)"
        ))),
    }
}

fn check(root: PathBuf, options: &CheckOptions) -> uota::Result<()> {
    let mut updater = Updater::new(root)?;
    match updater.check(options)? {
        CheckOutcome::NoUpdate => println!("no update available"),
        CheckOutcome::Staged {
            version,
            artifact,
            bytes,
        } => println!(
            "staged version {version} ({bytes} B) at {}",
            artifact.display()
        ),
        CheckOutcome::Failed(reason) => println!("update check failed: {reason}"),
    }
    Ok(())
}

fn install(root: PathBuf, quiet: bool) -> uota::Result<()> {
    let mut updater = Updater::new(root)?;
    match updater.install(quiet)? {
        InstallOutcome::ConfigurationUnavailable => println!("configuration unavailable"),
        InstallOutcome::NothingStaged => println!("nothing staged"),
        InstallOutcome::Installed(report) => println!(
            "installed {} files ({} B), {} directories created, {} skipped",
            report.files_written,
            report.bytes_written,
            report.directories_created,
            report.skipped.len()
        ),
    }
    Ok(())
}

fn parse_check_args(args: &[String]) -> uota::Result<(PathBuf, CheckOptions)> {
    let mut root = default_root();
    let mut options = CheckOptions::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--root" => root = PathBuf::from(value_for("--root", iter.next())?),
            "--no-version-check" => options.version_check = false,
            "--quiet" | "-q" => options.quiet = true,
            "--pin" => {
                let hex_pin = value_for("--pin", iter.next())?;
                options.pinned_key_hash = hex::decode(hex_pin)
                    .map_err(|e| UpdateError::Config(format!("invalid --pin value: {e}")))?;
            }
            other => {
                return Err(UpdateError::Config(format!(
                    "unknown check option `{other}`"
                )));
            }
        }
    }
    Ok((root, options))
}

fn parse_install_args(args: &[String]) -> uota::Result<(PathBuf, bool)> {
    let mut root = default_root();
    let mut quiet = false;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--root" => root = PathBuf::from(value_for("--root", iter.next())?),
            "--quiet" | "-q" => quiet = true,
            other => {
                return Err(UpdateError::Config(format!(
                    "unknown install option `{other}`"
                )));
            }
        }
    }
    Ok((root, quiet))
}

fn value_for<'a>(flag: &str, value: Option<&'a String>) -> uota::Result<&'a str> {
    value
        .map(String::as_str)
        .ok_or_else(|| UpdateError::Config(format!("{flag} requires a value")))
}

fn default_root() -> PathBuf {
    std::env::var_os("UOTA_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn print_usage() {
    println!(
        "usage: uota check [--root DIR] [--no-version-check] [--quiet] [--pin HEX]\n       \
         uota install [--root DIR] [--quiet]"
    );
}
