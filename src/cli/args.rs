use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tsaiken",
    about = "Compile TypeScript-flavoured smart contracts to Aiken validators",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Lines above a function searched for @expect markers
    #[arg(long, global = true, value_name = "LINES")]
    pub expect_lookback: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile one contract file to Aiken
    Compile {
        /// Input contract file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (defaults to <out-dir>/<stem>.ak)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the generated code instead of writing it
        #[arg(long)]
        stdout: bool,
    },

    /// Parse and transform a contract without writing anything
    Check {
        /// Input contract file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print the parsed module as JSON
        #[arg(long)]
        output_ast: bool,

        /// Print an outline of the source declarations
        #[arg(long)]
        tree: bool,
    },

    /// Compile every contract under a directory and update the manifest
    Build {
        /// Project directory to scan for .ts contracts
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        /// Output directory for generated validators
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Manifest file to update
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// Create a starter contract
    Init {
        /// Contract name
        #[arg(value_name = "NAME")]
        name: String,

        /// Output file for the contract
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Validator purpose of the starter handler
        #[arg(short, long, default_value = "spend")]
        purpose: String,
    },
}
