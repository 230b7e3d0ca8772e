mod commands;
pub mod config;
mod utils;

use crate::commands::build::{build, BuildArgs};
use crate::commands::inspect::{inspect, InspectArgs};
use crate::commands::search::{search, SearchArgs};
use crate::commands::write_chunks::{write_chunks, WriteChunksArgs};
use crate::config::RootConfig;
use clap::{Parser, Subcommand};
use dumbvec_config::Configurable;
use dumbvec_storage::Storage;
use dumbvec_tracing::init_stdout_tracing;

pub use utils::{CliContext, CliError};

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a JSON array of documents as a chunk file
    WriteChunks(WriteChunksArgs),
    /// Build an index over the chunk files under one or more paths
    Build(BuildArgs),
    /// Rank the entries of an index against a query vector
    Search(SearchArgs),
    /// Print the header of a stored index
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
#[command(name = "dumbvec")]
#[command(version)]
#[command(about = "Build and search exhaustive vector indexes over JSON documents", long_about = None)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Config file. Defaults to ./dumbvec_config.yaml when present"
    )]
    config: Option<String>,
    #[command(subcommand)]
    command: Command,
}

pub async fn dumbvec_cli(args: Vec<String>) -> Result<(), CliError> {
    let cli = Cli::parse_from(args);
    let config = match &cli.config {
        Some(path) => RootConfig::load_from_path(path)?,
        None => RootConfig::load()?,
    };
    init_stdout_tracing(&config.log_filters);

    let storage = Storage::try_from_config(&config.storage).await?;
    let context = CliContext::new(config, storage);
    match cli.command {
        Command::WriteChunks(args) => write_chunks(&context, args).await,
        Command::Build(args) => build(&context, args).await,
        Command::Search(args) => search(&context, args).await,
        Command::Inspect(args) => inspect(&context, args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use dumbvec_distance::SimilarityMetric;
    use dumbvec_index::VectorType;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build() {
        let cli = Cli::try_parse_from([
            "dumbvec",
            "build",
            "--name",
            "idx",
            "--path",
            "a",
            "--path",
            "b",
            "--vector-type",
            "int16",
            "--dimension-threshold",
            "0.1",
            "--overwrite",
        ])
        .unwrap();
        match cli.command {
            Command::Build(args) => {
                assert_eq!(args.name, "idx");
                assert_eq!(args.paths, vec!["a".to_string(), "b".to_string()]);
                assert_eq!(args.field, "embedding");
                assert_eq!(args.vector_type, Some(VectorType::Int16));
                assert_eq!(args.dimension_threshold, Some(0.1));
                assert!(!args.normalize);
                assert!(args.overwrite);
            }
            other => panic!("Unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from([
            "dumbvec",
            "--config",
            "other.yaml",
            "search",
            "--name",
            "idx",
            "--query",
            "[0.5, 0.5]",
            "-k",
            "3",
            "--metric",
            "cosine",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some("other.yaml"));
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.k, 3);
                assert_eq!(args.metric, Some(SimilarityMetric::Cosine));
                assert_eq!(args.query, "[0.5, 0.5]");
            }
            other => panic!("Unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_vector_type() {
        let result = Cli::try_parse_from([
            "dumbvec",
            "build",
            "--name",
            "idx",
            "--path",
            "a",
            "--vector-type",
            "float16",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_build_requires_a_path() {
        let result = Cli::try_parse_from(["dumbvec", "build", "--name", "idx"]);
        assert!(result.is_err());
    }
}
