//! Gild transpiler CLI entry point.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use cli::{BuildArgs, Cli, Command, LocateArgs};
use gild::diagnostics::print_diagnostic;
use gild::{GildDatabase, Position, file_diagnostics, transpile_file};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Build(args) => build(args),
        Command::Locate(args) => locate(args),
    }
}

/// `GILD_LOG` takes precedence over `RUST_LOG`; the default is `warn`.
fn init_logging() {
    let filter = EnvFilter::try_from_env("GILD_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build(args: BuildArgs) -> ExitCode {
    let db = GildDatabase::default();
    let file = match db.input(&args.file, &args.options.config()) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Error reading {}: {e}", args.file.display());
            return ExitCode::FAILURE;
        }
    };

    let result = transpile_file(&db, file);
    let path = args.file.display().to_string();
    for diag in file_diagnostics(&db, file) {
        print_diagnostic(&diag, file.text(&db), &path);
    }
    let Some(code) = result.code else {
        return ExitCode::FAILURE;
    };

    let written = match &args.output {
        Some(output) => std::fs::write(output, &code),
        None => {
            print!("{code}");
            Ok(())
        }
    };
    if let Err(e) = written {
        eprintln!("Error writing output: {e}");
        return ExitCode::FAILURE;
    }

    if let Some(map_path) = &args.source_map {
        let json = match serde_json::to_string_pretty(&result.mappings) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("Error encoding source map: {e}");
                return ExitCode::FAILURE;
            }
        };
        if let Err(e) = std::fs::write(map_path, json) {
            eprintln!("Error writing {}: {e}", map_path.display());
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

fn locate(args: LocateArgs) -> ExitCode {
    let db = GildDatabase::default();
    let file = match db.input(&args.file, &args.options.config()) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Error reading {}: {e}", args.file.display());
            return ExitCode::FAILURE;
        }
    };

    let result = transpile_file(&db, file);
    if let Some(error) = &result.error {
        eprintln!("{error}");
        return ExitCode::FAILURE;
    }
    let position = Position::new(args.line, args.column);
    let mapped = if args.to_generated {
        result.mappings.map_to_generated(position)
    } else {
        result.mappings.map_to_original(position)
    };
    println!("{mapped}");
    ExitCode::SUCCESS
}
