//! Command-line interface for papyr.

use clap::{Parser, Subcommand};

/// Papyr - multi-user blog server
#[derive(Parser)]
#[command(name = "papyr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web server (default when no command is given)
    #[command(alias = "-s", alias = "--serve")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}
