use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::data::LogLevel;
use providerfs::ordering::SortOrder;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Browse, measure and clean up files through providers")]
pub struct Cli {
    #[clap(long, short, default_value = "warn", value_enum, global = true)]
    pub log_level: LogLevel,

    /// Settings file [default: providerfs.yaml in the current directory]
    #[clap(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the direct children of a directory (an empty path lists the drives)
    List {
        path: String,
        #[clap(long, short)]
        pattern: Option<String>,
        #[clap(long, short, value_enum)]
        order: Option<SortOrder>,
    },
    /// Aggregate directory sizes and print them as a tree
    Sizes {
        path: String,
        #[clap(long, short, default_value_t = 1)]
        depth: usize,
    },
    /// Recursively find items whose name matches a glob pattern
    Find {
        path: String,
        #[clap(long, short)]
        pattern: String,
    },
    /// List the machine's volumes with their capacity
    Drives,
    /// Delete files and directories, reporting anything that stayed behind
    Delete {
        #[clap(required = true)]
        paths: Vec<String>,
        /// Also remove read-only entries
        #[clap(long, short)]
        force: bool,
    },
}
