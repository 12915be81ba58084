use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::insights::Persona;
use crate::types::{AnalysisDepth, ChunkType};

#[derive(Parser, Debug)]
#[command(name = "repolens")]
#[command(about = "Classify repositories, extract code chunks and search them")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true, env = "REPOLENS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print per-file activity and debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable coloured output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a repository and print its metadata
    Scan(ScanArgs),
    /// Run a background analysis job with live progress
    Analyze(AnalyzeArgs),
    /// Keyword search over the extracted chunks
    Search(SearchArgs),
    /// List extracted chunks
    Chunks(ChunksArgs),
    /// Print an engineer or product manager summary
    Persona(PersonaArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Repository root
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// Print the metadata as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Repository root
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// quick, standard or deep
    #[arg(short, long)]
    pub depth: Option<AnalysisDepth>,

    /// Seed for quick-mode file sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Run a search once the analysis completes
    #[arg(short, long)]
    pub query: Option<String>,

    /// Print the activity feed after the run
    #[arg(long)]
    pub feed: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Repository root
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Whitespace separated search terms
    pub query: String,

    /// Maximum number of results
    #[arg(short, long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ChunksArgs {
    /// Repository root
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// file, function, class or method
    #[arg(short = 't', long = "type")]
    pub chunk_type: Option<ChunkType>,

    /// Maximum number of chunks
    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct PersonaArgs {
    /// Repository root
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// sde or pm
    pub persona: Persona,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from([
            "repolens", "analyze", "/tmp/repo", "--depth", "quick", "--seed", "7", "--feed",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.depth, Some(AnalysisDepth::Quick));
                assert_eq!(args.seed, Some(7));
                assert!(args.feed);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags_and_persona() {
        let cli = Cli::try_parse_from(["repolens", "persona", "/tmp/repo", "pm", "--no-color", "-v"]).unwrap();
        assert!(cli.no_color);
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Persona(PersonaArgs { persona: Persona::Pm, .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_chunk_type() {
        assert!(Cli::try_parse_from(["repolens", "chunks", ".", "--type", "module"]).is_err());
    }
}
