//! CLI for b2dl.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::Path;

use commands::{run_checksum, run_completions, run_get, GetOptions};

/// Top-level CLI for b2dl.
#[derive(Debug, Parser)]
#[command(name = "b2dl")]
#[command(about = "b2dl: concurrent, SHA-1 verified downloads from Backblaze B2", long_about = None)]
pub struct Cli {
    /// Bucket to download from (overrides B2_BUCKET and the config file).
    #[arg(short, long, global = true, value_name = "BUCKET")]
    pub bucket: Option<String>,

    /// Do not draw progress bars.
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download files by name into the current directory.
    Get {
        /// Maximum number of concurrent downloads (default from config, 5).
        #[arg(short = 'j', long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
        threads: Option<u16>,

        /// Object names; slashes create subdirectories.
        #[arg(required = true, value_name = "NAME")]
        names: Vec<String>,
    },

    /// Print the digest of a local file.
    Checksum {
        #[arg(long, value_enum, default_value = "sha1")]
        algorithm: DigestAlgorithm,

        /// Path to the file.
        path: String,
    },

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Get { threads, names } => {
                let opts = GetOptions {
                    bucket: cli.bucket,
                    threads: threads.map(usize::from),
                    quiet: cli.quiet,
                    dest_root: std::env::current_dir()?,
                };
                run_get(opts, &names).await?;
            }
            CliCommand::Checksum { algorithm, path } => {
                run_checksum(Path::new(&path), algorithm).await?
            }
            CliCommand::Completions { shell } => run_completions(shell),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
