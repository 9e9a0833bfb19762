// src/main.rs
//! packrun - Plan Executor CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use packrun::{
    default_library, CliAlerts, CliProgress, Executor, PlanConfig, PlanRow, ShellBuildRunner,
    ShellInstallRunner,
};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "packrun")]
#[command(author = "Packrun Project")]
#[command(version)]
#[command(about = "Execute a package build/install plan with a worker pool", long_about = None)]
struct Cli {
    /// Plan file: a JSON array of plan rows
    plan: PathBuf,

    /// Target library directory
    #[arg(short, long)]
    lib: Option<PathBuf>,

    /// Number of worker subprocesses
    #[arg(short = 'j', long, default_value_t = 2)]
    workers: usize,

    /// Shell command used to build a source package
    #[arg(long, env = "PACKRUN_BUILD_CMD")]
    build_cmd: Option<String>,

    /// Shell command used to install a binary archive
    #[arg(long, env = "PACKRUN_INSTALL_CMD")]
    install_cmd: Option<String>,

    /// Suppress progress output and alerts
    #[arg(short, long)]
    quiet: bool,

    /// Validate and print the plan without executing it
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let file = File::open(&cli.plan)
        .with_context(|| format!("Failed to open plan file {}", cli.plan.display()))?;
    let rows: Vec<PlanRow> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse plan file {}", cli.plan.display()))?;

    if cli.dry_run {
        packrun::validate_plan(&rows).context("Plan validation failed")?;
        print_plan(&rows);
        return Ok(());
    }

    let lib = cli
        .lib
        .unwrap_or_else(|| default_library().to_path_buf());
    let mut executor = Executor::new(rows, PlanConfig::new(lib, cli.workers))
        .context("Plan validation failed")?;

    if let Some(cmd) = cli.build_cmd {
        executor = executor.with_build_runner(Box::new(ShellBuildRunner::new(cmd)));
    }
    if let Some(cmd) = cli.install_cmd {
        executor = executor.with_install_runner(Box::new(ShellInstallRunner::new(cmd)));
    }
    if !cli.quiet {
        let total = executor.pending_actions();
        executor = executor
            .with_progress(Box::new(CliProgress::new(total, "Installing packages")))
            .with_alerts(Box::new(CliAlerts));
    }

    let result = executor.execute();

    if result.error.is_some() {
        // show the tail of the failing workers' stderr for post-mortem
        for row in result.failures() {
            let stream = if row.run.build_error {
                &row.run.build_stderr
            } else {
                &row.run.install_stderr
            };
            if !stream.is_empty() {
                eprintln!("--- {} {} ---", row.package, row.version);
                for line in stream.iter().rev().take(10).rev() {
                    eprintln!("  {}", line);
                }
            }
        }
        return Err(result.error.unwrap().into());
    }

    println!("{}", result.summary());
    Ok(())
}

fn print_plan(rows: &[PlanRow]) {
    for row in rows {
        // execution fields are not seeded here; derive the pending actions
        // from the row's type
        let actions = if row.kind.is_preinstalled() {
            "nothing"
        } else if row.binary {
            "install"
        } else {
            "build, install"
        };
        println!(
            "{:10} {} {} [{}]",
            row.kind.as_str(),
            row.package,
            row.version,
            actions
        );
    }
    println!("{} row(s)", rows.len());
}
