// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use cool_frontend::{dump_program, parse_source, type_check_program, DumpTypes, Interner, Program};
use tracing_subscriber::EnvFilter;

/// Print the AST dump of COOL sources.
#[derive(Debug, Parser)]
#[command(name = "cool_parse_cli", version)]
struct Cli {
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Type check first and print the annotated tree.
    #[arg(long)]
    types: bool,

    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_env("COOLC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut interner = Interner::new();
    let mut program = Program { classes: Vec::new() };
    let mut failed = false;
    for path in &cli.files {
        let src = match fs::read_to_string(path) {
            Ok(src) => src,
            Err(e) => {
                eprintln!("Failed to read {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        };
        match parse_source(&mut interner, &path.to_string_lossy(), &src) {
            Ok(p) => program.classes.extend(p.classes),
            Err(errs) => {
                for e in errs {
                    eprintln!("{e}");
                }
                failed = true;
            }
        }
    }
    if failed {
        eprintln!("Compilation halted due to lex and parse errors");
        return ExitCode::FAILURE;
    }

    let types = if cli.types {
        if let Err(errs) = type_check_program(&program, &interner) {
            for e in errs {
                eprintln!("{e}");
            }
            eprintln!("Compilation halted due to static semantic errors.");
            return ExitCode::FAILURE;
        }
        DumpTypes::Show
    } else {
        DumpTypes::Suppress
    };

    print!("{}", dump_program(&program, &interner, types));
    ExitCode::SUCCESS
}
