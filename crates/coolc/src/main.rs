// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, ValueEnum};
use cool_codegen::{Codegen, CodegenOptions, GcMode};
use cool_frontend::{parse_source, type_check_program, Interner, Program};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GcArg {
    None,
    Generational,
    StopAndCopy,
}

impl From<GcArg> for GcMode {
    fn from(arg: GcArg) -> Self {
        match arg {
            GcArg::None => GcMode::None,
            GcArg::Generational => GcMode::Generational,
            GcArg::StopAndCopy => GcMode::StopAndCopy,
        }
    }
}

/// Compile COOL sources to a SPIM assembly listing.
#[derive(Debug, Parser)]
#[command(name = "coolc", version)]
struct Cli {
    /// Source files; their classes form one program.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output path, `-` for stdout. Defaults to the first input with a `.s` extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Garbage collector the runtime installs.
    #[arg(short, long, value_enum, default_value_t = GcArg::None)]
    gc: GcArg,

    /// Set the runtime's GC test flag.
    #[arg(short = 't', long)]
    gc_test: bool,

    /// Check the heap after every object copy.
    #[arg(short = 'T', long)]
    gc_debug: bool,

    /// Disable register allocation.
    #[arg(short = 'r', long)]
    no_reg_alloc: bool,

    /// Optimize.
    #[arg(short = 'O', long)]
    optimize: bool,

    /// Raise the log level; repeatable.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn codegen_options(&self) -> CodegenOptions {
        CodegenOptions {
            gc: self.gc.into(),
            gc_test: self.gc_test,
            gc_debug: self.gc_debug,
            optimize: self.optimize,
            disable_reg_alloc: self.no_reg_alloc,
        }
    }

    fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => self.files[0].with_extension("s"),
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_env("COOLC_LOG").unwrap_or_else(|_| {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::new(level)
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(()) => ExitCode::FAILURE,
    }
}

/// Diagnostics are printed as they are found; the error carries nothing.
fn run(cli: &Cli) -> Result<(), ()> {
    let mut interner = Interner::new();
    let program = parse_files(&cli.files, &mut interner)?;
    tracing::debug!(classes = program.classes.len(), "parsed");

    if let Err(errors) = type_check_program(&program, &interner) {
        for e in &errors {
            eprintln!("{e}");
        }
        eprintln!("Compilation halted due to static semantic errors.");
        return Err(());
    }
    tracing::debug!("semantic analysis passed");

    let asm = Codegen::new(cli.codegen_options())
        .compile_program(&program, &mut interner)
        .map_err(|e| eprintln!("{e}"))?;

    let out = cli.output_path();
    write_output(&out, &asm).map_err(|e| eprintln!("coolc: cannot write {}: {e}", out.display()))?;
    tracing::info!(output = %out.display(), "wrote listing");
    Ok(())
}

/// Each file is parsed on its own; the classes of all files are concatenated.
fn parse_files(files: &[PathBuf], interner: &mut Interner) -> Result<Program, ()> {
    let mut classes = Vec::new();
    let mut failed = false;

    for path in files {
        let src = match fs::read_to_string(path) {
            Ok(src) => src,
            Err(e) => {
                eprintln!("coolc: cannot read {}: {e}", path.display());
                return Err(());
            }
        };
        let name = path.to_string_lossy();
        match parse_source(interner, &name, &src) {
            Ok(program) => classes.extend(program.classes),
            Err(errors) => {
                for e in &errors {
                    eprintln!("{e}");
                }
                failed = true;
            }
        }
    }

    if failed {
        eprintln!("Compilation halted due to lex and parse errors");
        return Err(());
    }
    Ok(Program { classes })
}

fn write_output(path: &Path, asm: &str) -> io::Result<()> {
    if path == Path::new("-") {
        let mut stdout = io::stdout().lock();
        stdout.write_all(asm.as_bytes())?;
        return stdout.flush();
    }
    fs::write(path, asm)
}
