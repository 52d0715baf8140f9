use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "fragments",
    about = "Store, list, and convert text and image fragments",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Owner the fragments belong to
    #[arg(long, global = true, default_value = "local")]
    pub owner: String,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a file as a new fragment
    Create(CreateArgs),
    /// Replace a fragment's type and content
    Update(UpdateArgs),
    /// List fragment ids, or full records with --expand
    List(ListArgs),
    /// Show a fragment's metadata and available formats
    Info(InfoArgs),
    /// Fetch a fragment's content, optionally converted
    Get(GetArgs),
    /// Delete a fragment
    Delete(DeleteArgs),
    /// Convert a file between content types without storing it
    Convert(ConvertArgs),
}

#[derive(Args)]
pub struct CreateArgs {
    pub file: PathBuf,
    #[arg(short = 't', long = "type")]
    pub content_type: String,
}

#[derive(Args)]
pub struct UpdateArgs {
    pub id: String,
    pub file: PathBuf,
    #[arg(short = 't', long = "type")]
    pub content_type: String,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(short, long)]
    pub expand: bool,
}

#[derive(Args)]
pub struct InfoArgs {
    pub id: String,
}

#[derive(Args)]
pub struct GetArgs {
    pub id: String,
    /// Target extension, e.g. html or png
    #[arg(long, conflicts_with = "to")]
    pub ext: Option<String>,
    /// Target content type, e.g. text/html
    #[arg(long)]
    pub to: Option<String>,
    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub id: String,
}

#[derive(Args)]
pub struct ConvertArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub from: String,
    #[arg(long)]
    pub to: String,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
