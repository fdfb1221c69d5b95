//! Root CLI structure for particles

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "particles")]
#[command(about = "Inspect particle sprite-sheets and run effects offline", long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sprite-sheet operations
    Sheet {
        #[command(subcommand)]
        command: crate::commands::sheet::SheetCommands,
    },

    /// Run a built-in effect and report what it does frame by frame
    Simulate(crate::commands::simulate::SimulateArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
