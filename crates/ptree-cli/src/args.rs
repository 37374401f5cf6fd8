//! Command-line argument definitions for the ptree CLI.
//!
//! The [`Args`] structure is parsed from the command line using [`clap`].
//! Global arguments select the configuration file and logging verbosity;
//! each [`Command`] carries its own inputs and outputs.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use ptree::layout::LayoutMode;

/// Command-line arguments for the product tree tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract the product trees of a subsystem and write its documents
    Generate(GenerateArgs),

    /// Draw a product tree from a CSV snapshot
    Diagram(DiagramArgs),

    /// Write the git packages section for CSV snapshots
    Git(GitArgs),
}

#[derive(clap::Args, Debug)]
pub struct GenerateArgs {
    /// Subsystem description (YAML)
    #[arg(short, long)]
    pub subsystem: PathBuf,

    /// Directory receiving every generated file
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// MagicDraw username
    #[arg(long, env = "MD_USER")]
    pub username: Option<String>,

    /// MagicDraw password
    #[arg(long, env = "MD_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Diagram geometry (portrait, landscape, full, subtrees)
    #[arg(short, long, default_value = "landscape")]
    pub mode: LayoutMode,

    /// Stack landscape subtrees in single columns
    #[arg(long)]
    pub compact: bool,

    /// Skip extraction and reuse the CSV snapshots in the output directory
    #[arg(long)]
    pub csv_only: bool,

    /// Only write the snapshot of the subtree under this product key
    #[arg(long)]
    pub partial: Option<String>,

    #[command(flatten)]
    pub github: GithubArgs,
}

#[derive(clap::Args, Debug)]
pub struct DiagramArgs {
    /// Input CSV snapshot
    #[arg(short, long)]
    pub file: PathBuf,

    /// Deepest level drawn, the root being level 0
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Diagram geometry (portrait, landscape, full, subtrees)
    #[arg(short, long, default_value = "portrait")]
    pub mode: LayoutMode,

    /// Stack landscape subtrees in single columns
    #[arg(long)]
    pub compact: bool,

    /// Directory receiving the TikZ documents
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct GitArgs {
    /// Input CSV snapshots
    #[arg(short, long, required = true, num_args = 1..)]
    pub file: Vec<PathBuf>,

    /// Directory receiving one `<snapshot>_git.tex` per input
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Also write package dependency graphs into `<output-dir>/dot`
    #[arg(long)]
    pub graphs: bool,

    #[command(flatten)]
    pub github: GithubArgs,
}

#[derive(clap::Args, Debug, Default)]
pub struct GithubArgs {
    /// GitHub token, enables team lookups
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// File holding a GitHub token
    #[arg(long)]
    pub token_path: Option<PathBuf>,
}
