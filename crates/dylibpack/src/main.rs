//! dylibpack command-line entry point
//!
//! Usage: dylibpack [OPTIONS] <FILE>

mod cli;
mod report;

use anyhow::Context;
use cli::Args;
use dylibpack_core::{BundleConfig, BundleError, Bundler, Discovery, PatchReport};
use report::JsonSummary;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "dylibpack=debug,dylibpack_core=debug"
    } else {
        "error"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<BundleConfig> {
    let mut config = match &args.config {
        Some(path) => BundleConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => BundleConfig::new(),
    };

    if let Some(destination) = &args.destination {
        config = config.with_destination(destination.clone());
    }
    if args.dry_run {
        config = config.with_dry_run(true);
    }
    if args.verbose {
        config = config.with_verbose(true);
    }

    Ok(config)
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

fn eprint_lines(lines: &[String]) {
    for line in lines {
        eprintln!("{line}");
    }
}

fn print_json(discovery: &Discovery, dry_run: bool, report: Option<&PatchReport>) -> anyhow::Result<()> {
    let summary = JsonSummary::new(discovery, dry_run, report);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn run(args: &Args) -> anyhow::Result<ExitCode> {
    let config = load_config(args)?;
    let verbose = config.verbose;
    let dry_run = config.dry_run;
    let bundler = Bundler::with_defaults(config);

    if !args.json {
        println!("{}", report::header(&args.file));
    }

    let discovery = match bundler.discover(&args.file).await {
        Ok(discovery) => discovery,
        Err(err @ BundleError::MissingInput { .. }) => {
            eprintln!("{err}");
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err.into()),
    };

    eprint_lines(&report::discovery_warnings(&discovery, verbose));
    if !args.json {
        print_lines(&report::listing(discovery.graph(), verbose));
    }

    if dry_run {
        if args.json {
            print_json(&discovery, true, None)?;
        }
        return Ok(ExitCode::SUCCESS);
    }

    match bundler.patch(&discovery).await {
        Ok(patched) => {
            if args.json {
                print_json(&discovery, false, Some(&patched))?;
            } else {
                println!(
                    "{}",
                    report::success(&args.file, discovery.graph().dependency_count())
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(BundleError::Patch(failure)) => {
            eprint_lines(&report::patch_failure(&failure, verbose));
            if args.json {
                print_json(&discovery, false, Some(&failure.report))?;
            }
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err.into()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
