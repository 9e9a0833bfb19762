// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("packrun")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Packrun Contributors")
        .about("Execute a package build/install plan with a worker pool")
        .arg(
            Arg::new("plan")
                .required(true)
                .help("Plan file: a JSON array of plan rows"),
        )
        .arg(
            Arg::new("lib")
                .short('l')
                .long("lib")
                .value_name("DIR")
                .help("Target library directory"),
        )
        .arg(
            Arg::new("workers")
                .short('j')
                .long("workers")
                .default_value("2")
                .help("Number of worker subprocesses"),
        )
        .arg(
            Arg::new("build-cmd")
                .long("build-cmd")
                .value_name("CMD")
                .help("Shell command used to build a source package"),
        )
        .arg(
            Arg::new("install-cmd")
                .long("install-cmd")
                .value_name("CMD")
                .help("Shell command used to install a binary archive"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(clap::ArgAction::SetTrue)
                .help("Suppress progress output and alerts"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(clap::ArgAction::SetTrue)
                .help("Validate and print the plan without executing it"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("packrun.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
