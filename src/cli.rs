//! Command-line interface for the Gild transpiler.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use gild_core::{ExhaustivenessMode, TranspileConfig};

#[derive(Parser)]
#[command(name = "gild")]
#[command(about = "Transpile Gild sources to Go", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Transpile a Gild file to Go
    Build(BuildArgs),
    /// Translate a position between a Gild file and its generated Go
    Locate(LocateArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    pub file: PathBuf,
    /// Write the Go source here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Write the position mappings as JSON
    #[arg(long, value_name = "FILE")]
    pub source_map: Option<PathBuf>,
    #[command(flatten)]
    pub options: ConfigArgs,
}

#[derive(Args)]
pub struct LocateArgs {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    /// Map a Gild position to generated Go (default is the reverse)
    #[arg(long)]
    pub to_generated: bool,
    #[command(flatten)]
    pub options: ConfigArgs,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Report non-exhaustive matches as warnings instead of failing
    #[arg(long)]
    pub warn_non_exhaustive: bool,
    /// Infer types from syntax alone, without scanning declarations
    #[arg(long)]
    pub no_type_oracle: bool,
}

impl ConfigArgs {
    pub fn config(&self) -> TranspileConfig {
        TranspileConfig {
            exhaustiveness: if self.warn_non_exhaustive {
                ExhaustivenessMode::Warn
            } else {
                ExhaustivenessMode::Error
            },
            type_oracle: !self.no_type_oracle,
            ..TranspileConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_flags() {
        let cli = Cli::parse_from([
            "gild",
            "build",
            "main.gild",
            "-o",
            "main.go",
            "--warn-non-exhaustive",
        ]);
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.output, Some(PathBuf::from("main.go")));
        assert_eq!(args.source_map, None);
        let config = args.options.config();
        assert_eq!(config.exhaustiveness, ExhaustivenessMode::Warn);
        assert!(config.type_oracle);
    }

    #[test]
    fn test_locate_args() {
        let cli = Cli::parse_from(["gild", "locate", "main.gild", "12", "3", "--to-generated", "--no-type-oracle"]);
        let Command::Locate(args) = cli.command else {
            panic!("expected locate");
        };
        assert_eq!((args.line, args.column), (12, 3));
        assert!(args.to_generated);
        assert!(!args.options.config().type_oracle);
    }
}
