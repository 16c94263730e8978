use clap::Parser;
use std::path::PathBuf;

/// Create a numbered copy of a folder next to it (`name_1`, `name_2`, ...).
#[derive(Parser, Debug)]
#[command(name = "fb")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Show the backup name that would be created without copying anything
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Folder to back up (defaults to the current directory)
    pub folder: Option<PathBuf>,
}
