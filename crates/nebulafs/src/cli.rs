//! Command line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// NebulaFS: a single-node, S3-style object store over a local filesystem.
#[derive(Parser)]
#[command(name = "nebulafs")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start the server.
    Serve(ServeArgs),
    /// Print version information.
    Version,
}

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Path to configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["nebulafs", "version"]);
        assert!(matches!(cli.command, Commands::Version));

        let cli = Cli::parse_from(["nebulafs", "serve"]);
        assert!(matches!(cli.command, Commands::Serve(_)));

        let cli = Cli::parse_from(["nebulafs", "serve", "--config", "/etc/nebulafs.toml"]);
        if let Commands::Serve(args) = cli.command {
            assert_eq!(args.config, Some(PathBuf::from("/etc/nebulafs.toml")));
        } else {
            panic!("Expected Serve command");
        }
    }
}
